// medallion/src/commands/inspect.rs
//
// USE CASE: Inspect a published aggregate table, or the validated snapshot
// of an entity for a given run. Reads the JSON mirror under the target path.

use anyhow::Context;
use std::path::PathBuf;

use medallion_core::domain::run::RunId;
use medallion_core::domain::schema::EntityKind;
use medallion_core::infrastructure::config::load_project_config;
use medallion_core::infrastructure::store::{read_published_table, read_validated_table};

pub fn execute(
    project_dir: PathBuf,
    table: String,
    run_id: Option<u64>,
    limit: usize,
) -> anyhow::Result<()> {
    let config = load_project_config(&project_dir)?;
    let target_dir = project_dir.join(&config.target_path);

    let (label, value) = match run_id {
        Some(id) => {
            let kind: EntityKind = table.parse().map_err(anyhow::Error::msg)?;
            let value = read_validated_table(&target_dir, RunId(id), kind)?.with_context(|| {
                format!(
                    "❌ No validated snapshot of '{}' for run {}\n👉 Check the run id with 'medallion audit runs'",
                    kind.table_name(),
                    id
                )
            })?;
            (format!("validated '{}' (run {})", kind.table_name(), id), value)
        }
        None => {
            let (published, value) =
                read_published_table(&target_dir, &table)?.with_context(|| {
                    format!(
                        "❌ No published table '{}'\n👉 Have you run 'medallion run'?",
                        table
                    )
                })?;
            (format!("published '{}' (run {})", table, published), value)
        }
    };

    let rows = value.as_array().cloned().unwrap_or_default();
    println!("\n🔍 Inspecting {}: {} rows", label, rows.len());
    println!("   --- Rows (Limit {}) ---", limit);
    for row in rows.iter().take(limit) {
        println!("   ➜ {}", row);
    }

    Ok(())
}
