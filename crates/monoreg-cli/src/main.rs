//! monoreg CLI - private Terraform module registry backed by a git monorepo.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "monoreg=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => commands::serve::run(args).await,
        Commands::Build(args) => commands::build::run(args).await,
        Commands::Tags(args) => commands::tags::run(&args),
        Commands::Archive(args) => commands::archive::run(&args),
        Commands::Version => {
            println!("monoreg {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
