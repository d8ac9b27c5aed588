//! FinSense ML — gradient-boosted baseline over the market feature set.
//!
//! - `frame`: the in-memory training frame, chronologically ordered and
//!   content-hashed so downstream artifacts can verify what they were
//!   computed from
//! - `tree` / `gbm`: regression trees and the boosted ensemble, with
//!   validation-based early stopping and JSON persistence
//! - `metrics`: regression and direction metrics
//! - `trainer`: the training stage (split, fit, evaluate, artifacts)
//! - `explain`: additive per-row feature attributions over the validation
//!   slice of the persisted split

pub mod explain;
pub mod frame;
pub mod gbm;
pub mod metrics;
pub mod trainer;
pub mod tree;

pub use explain::{explain, ExplainSummary};
pub use frame::TrainingFrame;
pub use gbm::{GbmModel, GbmParams};
pub use trainer::{train, MlError, TrainReport};
