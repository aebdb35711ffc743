//! drift-server binary.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use drift_server::{router, AppState, ServerArgs};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = ServerArgs::parse();
    let state = AppState::build(&args)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(args.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind_addr))?;
    info!("Drift server listening on {}", args.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
