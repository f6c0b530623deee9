// medallion/src/commands/plan.rs
//
// USE CASE: Show the order in which entities are validated.

use medallion_core::domain::graph::GraphSolver;

pub fn execute() -> anyhow::Result<()> {
    let plan = GraphSolver::plan_entities()?;

    println!("🧠 Validation plan ({} layers)", plan.len());
    for (i, layer) in plan.iter().enumerate() {
        let names: Vec<&str> = layer.iter().map(|k| k.table_name()).collect();
        println!("   Layer {}: {}", i + 1, names.join(", "));
    }
    Ok(())
}
