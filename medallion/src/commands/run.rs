// medallion/src/commands/run.rs
//
// USE CASE: Run the pipeline once and publish the aggregates.

use comfy_table::Table;
use comfy_table::presets::UTF8_FULL;
use std::path::PathBuf;

use medallion_core::application::{RunReport, run_project};

pub async fn execute(project_dir: PathBuf) -> anyhow::Result<()> {
    let start = std::time::Instant::now();
    tracing::debug!(project_dir = ?project_dir, "run requested");

    match run_project(&project_dir).await {
        Ok(report) => {
            print_report(&report);
            println!("\n✨ SUCCESS! Run {} published in {:.2?}", report.run_id, start.elapsed());
        }
        Err(e) => {
            // Previous aggregates stay published; the audit trail has the details.
            eprintln!("\n💥 CRITICAL PIPELINE ERROR: {}", e);
            eprintln!("{:?}", miette::Report::new(e));
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    let mut entities = Table::new();
    entities
        .load_preset(UTF8_FULL)
        .set_header(vec!["Entity", "Read", "Validated", "Rejected"]);
    for e in report.entities.iter().chain(report.forecasts.iter()) {
        entities.add_row(vec![
            e.table.clone(),
            e.read.to_string(),
            e.validated.to_string(),
            e.rejected.to_string(),
        ]);
    }
    println!("\n📥 Validation (as of {})\n{}", report.as_of, entities);

    let mut gold = Table::new();
    gold.load_preset(UTF8_FULL)
        .set_header(vec!["Aggregate", "Rows", "Checksum"]);
    for t in &report.gold {
        gold.add_row(vec![
            t.table.clone(),
            t.rows.to_string(),
            t.checksum.chars().take(12).collect(),
        ]);
    }
    println!("\n📣 Published\n{}", gold);

    let mut checks = Table::new();
    checks
        .load_preset(UTF8_FULL)
        .set_header(vec!["Metric", "Validated", "Aggregated", "Variance"]);
    for c in &report.reconciliation.checks {
        checks.add_row(vec![
            c.metric.to_string(),
            c.validated.to_string(),
            c.aggregated.to_string(),
            c.variance.round_dp(4).to_string(),
        ]);
    }
    println!(
        "\n⚖️  Reconciliation (tolerance {})\n{}",
        report.reconciliation.tolerance, checks
    );

    if report.quality_failures > 0 {
        println!(
            "⚠️  {} of {} data-quality checks failed (see 'medallion audit checks')",
            report.quality_failures, report.quality_checks
        );
    } else {
        println!("🛡️  {} data-quality checks passed", report.quality_checks);
    }
}
