// medallion/src/main.rs

mod cli;
mod commands;

use clap::Parser;
use cli::{AuditView, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging (Tracing)
    // RUST_LOG=debug medallion run ... pour voir les détails
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { project_dir } => commands::run::execute(project_dir).await?,
        Commands::Audit { view } => match view {
            AuditView::Runs(args) => commands::audit::runs(args).await?,
            AuditView::Rejections(args) => commands::audit::rejections(args).await?,
            AuditView::Checks(args) => commands::audit::checks(args).await?,
        },
        Commands::Inspect {
            project_dir,
            table,
            run_id,
            limit,
        } => commands::inspect::execute(project_dir, table, run_id, limit)?,
        Commands::Plan => commands::plan::execute()?,
        Commands::Clean { project_dir } => commands::clean::execute(project_dir)?,
    }

    Ok(())
}
