use std::env;

use anyhow::{Context, Result};
use execai_api::build_app_from_env;
use execai_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("execai_api");

    let bind = env::var("EXECAI_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let app = build_app_from_env()?;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(bind = %bind, "execai api started");

    axum::serve(listener, app).await?;
    Ok(())
}
