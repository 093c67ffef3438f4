// microboard server binary

use clap::Parser;
use microboard::board::{execute_command, MicroboardCli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "microboard=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = MicroboardCli::parse();

    if let Err(e) = execute_command(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
