mod apps;
mod cli;
mod config;
mod ingest;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build(args) => cli::build::run(args, &cli.data_dir, &cli.config).await,
        Commands::Stats(args) => cli::stats::run(args, &cli.data_dir).await,
        Commands::DeleteApp(args) => cli::delete_app::run(args, &cli.data_dir).await,
    }
}
