//! Gateway binary: serves the stub API on port 8000.

use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr = "0.0.0.0:8000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    log::info!("finsense-api listening on {addr}");

    axum::serve(listener, finsense_api::router())
        .await
        .context("serving")?;
    Ok(())
}
