// medallion/src/commands/audit.rs
//
// USE CASE: Operator queries over the audit trail (runs, rejections, checks).

use comfy_table::Table;
use comfy_table::presets::UTF8_FULL;

use medallion_core::application::{open_audit_store, summarize_runs};
use medallion_core::domain::run::RunId;
use medallion_core::ports::{AuditFilter, AuditQuery};

use crate::cli::AuditArgs;

fn filter(args: &AuditArgs) -> AuditFilter {
    AuditFilter {
        run_id: args.run_id.map(RunId),
        table: args.table.clone(),
        since: args
            .since
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc()),
        until: args
            .until
            .and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999))
            .map(|dt| dt.and_utc()),
    }
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header);
    table
}

pub async fn runs(args: AuditArgs) -> anyhow::Result<()> {
    let store = open_audit_store(&args.project_dir)?;
    let filter = filter(&args);

    if args.json {
        let rows = store.runs(&filter).await?;
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let summaries = summarize_runs(&store, &filter).await?;
    if summaries.is_empty() {
        println!("No matching runs.");
        return Ok(());
    }

    let mut out = table(vec![
        "Run", "Status", "Started", "Duration", "Read", "Validated", "Rejected", "Rejections", "Error",
    ]);
    for s in &summaries {
        let rejections: Vec<String> = s
            .rejections
            .iter()
            .map(|((table, kind), n)| format!("{}/{}={}", table, kind, n))
            .collect();
        out.add_row(vec![
            s.run_id.to_string(),
            s.status.to_string(),
            s.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            s.duration_ms.map(|ms| format!("{} ms", ms)).unwrap_or_default(),
            s.counts.read.to_string(),
            s.counts.validated.to_string(),
            s.counts.rejected.to_string(),
            rejections.join("\n"),
            s.error.clone().unwrap_or_default(),
        ]);
    }
    println!("{}", out);
    Ok(())
}

pub async fn rejections(args: AuditArgs) -> anyhow::Result<()> {
    let store = open_audit_store(&args.project_dir)?;
    let rows = store.rejections(&filter(&args)).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No matching rejections.");
        return Ok(());
    }

    let mut out = table(vec!["Run", "Table", "Row", "Reason", "Kind", "Field", "Detail"]);
    for r in &rows {
        out.add_row(vec![
            r.item.run_id.to_string(),
            r.item.table.clone(),
            r.item.seq.to_string(),
            r.item.reason.clone(),
            r.item.kind.to_string(),
            r.item.field.clone().unwrap_or_default(),
            r.item.detail.clone(),
        ]);
    }
    println!("{}", out);
    println!("🚫 {} rejected rows", rows.len());
    Ok(())
}

pub async fn checks(args: AuditArgs) -> anyhow::Result<()> {
    let store = open_audit_store(&args.project_dir)?;
    let rows = store.quality_checks(&filter(&args)).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No matching quality checks.");
        return Ok(());
    }

    let mut out = table(vec!["Run", "Layer", "Scope", "Check", "Result", "Bad rows"]);
    for c in &rows {
        out.add_row(vec![
            c.item.run_id.to_string(),
            c.item.layer.to_string(),
            c.item.scope.clone(),
            c.item.check_name.clone(),
            if c.item.passed { "PASS" } else { "FAIL" }.to_string(),
            c.item.bad_row_count.to_string(),
        ]);
    }
    println!("{}", out);
    Ok(())
}
