// medallion/src/cli.rs
//
// Single source of truth for all CLI definitions (Clap structs).

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "medallion")]
#[command(about = "Validated Bronze -> Silver -> Gold pipeline for supply-chain records", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 🚀 Runs the pipeline (Extract -> Validate -> Aggregate -> Reconcile -> Publish)
    Run {
        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },

    /// 🧾 Queries the audit trail
    Audit {
        #[command(subcommand)]
        view: AuditView,
    },

    /// 🔍 Shows a published aggregate table, or a validated table of a run
    Inspect {
        /// Project directory
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Table name (aggregate table, or entity table with --run-id)
        #[arg(long, short)]
        table: String,

        /// Read the validated snapshot of this run instead of the published aggregates
        #[arg(long)]
        run_id: Option<u64>,

        /// Number of rows to display
        #[arg(long, default_value = "5")]
        limit: usize,
    },

    /// 🧠 Prints the entity validation plan (dependency layers)
    Plan,

    /// 🧹 Cleans build artifacts (target/ folder)
    Clean {
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum AuditView {
    /// Runs with their status and row counts
    Runs(AuditArgs),
    /// Rejected rows with reason and classification
    Rejections(AuditArgs),
    /// Data-quality check results
    Checks(AuditArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AuditArgs {
    /// Project directory
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    #[arg(long)]
    pub run_id: Option<u64>,

    /// Table name (e.g. "products", "monthly_sales_performance")
    #[arg(long)]
    pub table: Option<String>,

    /// First day included (YYYY-MM-DD, UTC)
    #[arg(long)]
    pub since: Option<NaiveDate>,

    /// Last day included (YYYY-MM-DD, UTC)
    #[arg(long)]
    pub until: Option<NaiveDate>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use clap::Parser;

    #[test]
    fn test_cli_parse_run_defaults() -> Result<()> {
        let args = Cli::parse_from(["medallion", "run"]);
        match args.command {
            Commands::Run { project_dir } => {
                assert_eq!(project_dir.to_string_lossy(), ".");
                Ok(())
            }
            _ => bail!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_audit_filters() -> Result<()> {
        let args = Cli::parse_from([
            "medallion",
            "audit",
            "rejections",
            "--run-id",
            "42",
            "--table",
            "products",
            "--since",
            "2024-07-01",
        ]);
        match args.command {
            Commands::Audit {
                view: AuditView::Rejections(filter),
            } => {
                assert_eq!(filter.run_id, Some(42));
                assert_eq!(filter.table.as_deref(), Some("products"));
                assert_eq!(filter.since, NaiveDate::from_ymd_opt(2024, 7, 1));
                assert_eq!(filter.until, None);
                Ok(())
            }
            _ => bail!("Expected Audit Rejections command"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_dates() {
        let parsed = Cli::try_parse_from(["medallion", "audit", "runs", "--since", "yesterday"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_cli_parse_inspect() -> Result<()> {
        let args = Cli::parse_from(["medallion", "inspect", "-t", "products", "--run-id", "7"]);
        match args.command {
            Commands::Inspect {
                table,
                run_id,
                limit,
                ..
            } => {
                assert_eq!(table, "products");
                assert_eq!(run_id, Some(7));
                assert_eq!(limit, 5);
                Ok(())
            }
            _ => bail!("Expected Inspect command"),
        }
    }
}
