//! Indexed Merkle tree CLI application.

use clap::Parser as _;

use crate::cli::{Cli, Commands};
use crate::commands::{build, prove, verify};

mod cli;
mod commands;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_target(false)
        .init();
}

fn main() -> eyre::Result<()> {
    // Load .env file (fails silently if not found)
    #[allow(
        clippy::let_underscore_must_use,
        clippy::let_underscore_untyped,
        reason = "Ignoring dotenv result intentionally"
    )]
    let _ = dotenvy::dotenv();

    init_tracing();

    let cli = Cli::parse();

    let res = match cli.command {
        Commands::Build {
            config,
            batch_proof_output_file,
        } => build(&config, batch_proof_output_file.as_deref()),
        Commands::Prove {
            config,
            key,
            proof_output_file,
        } => prove(&config, key, &proof_output_file),
        Commands::Verify { kind, proof_file } => verify(kind, &proof_file),
    };

    if let Err(e) = res {
        tracing::error!("Error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
