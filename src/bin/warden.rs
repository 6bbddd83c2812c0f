use anyhow::Result;
use warden::cli::{self, telemetry::shutdown_tracer};

#[tokio::main]
async fn main() -> Result<()> {
    let action = cli::start()?;

    let result = action.execute().await;

    shutdown_tracer();

    result
}
