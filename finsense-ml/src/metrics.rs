//! Regression and direction metrics, as pure slice functions.

/// Root mean squared error. NaN for empty input.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    assert_eq!(actual.len(), predicted.len());
    if actual.is_empty() {
        return f64::NAN;
    }
    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64;
    mse.sqrt()
}

/// Mean absolute error. NaN for empty input.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    assert_eq!(actual.len(), predicted.len());
    if actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Fraction of rows where prediction and actual share a sign.
///
/// Exact zeros count as their own sign: a zero prediction only matches a
/// zero actual. NaN for empty input.
pub fn directional_accuracy(actual: &[f64], predicted: &[f64]) -> f64 {
    assert_eq!(actual.len(), predicted.len());
    if actual.is_empty() {
        return f64::NAN;
    }
    let matches = actual
        .iter()
        .zip(predicted)
        .filter(|(a, p)| sign(**a) == sign(**p))
        .count();
    matches as f64 / actual.len() as f64
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rmse_of_exact_fit_is_zero() {
        let y = [0.1, -0.2, 0.05];
        assert_eq!(rmse(&y, &y), 0.0);
        assert_eq!(mae(&y, &y), 0.0);
    }

    #[test]
    fn rmse_known_value() {
        let actual = [1.0, 2.0, 3.0];
        let predicted = [2.0, 2.0, 2.0];
        assert!((rmse(&actual, &predicted) - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((mae(&actual, &predicted) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn direction_counts_sign_matches() {
        let actual = [0.5, -0.3, 0.2, 0.0];
        let predicted = [0.1, 0.4, 0.3, 0.0];
        // Matches at indices 0, 2 and the exact-zero pair at 3.
        assert!((directional_accuracy(&actual, &predicted) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn zero_prediction_does_not_match_nonzero_actual() {
        assert_eq!(directional_accuracy(&[0.5], &[0.0]), 0.0);
    }

    #[test]
    fn empty_input_is_nan() {
        assert!(rmse(&[], &[]).is_nan());
        assert!(mae(&[], &[]).is_nan());
        assert!(directional_accuracy(&[], &[]).is_nan());
    }
}
