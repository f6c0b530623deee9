// medallion-core/src/domain/graph/dag.rs

use crate::domain::error::DomainError;
use crate::domain::schema::EntityKind;
use std::collections::{BTreeMap, VecDeque};

pub struct GraphSolver;

impl GraphSolver {
    /// Plans the declared entity schema: parents strictly before children.
    pub fn plan_entities() -> Result<Vec<Vec<EntityKind>>, DomainError> {
        let graph: BTreeMap<EntityKind, Vec<EntityKind>> = EntityKind::ALL
            .into_iter()
            .map(|kind| (kind, kind.schema().parents()))
            .collect();
        Self::plan_execution(&graph)
    }

    /// Flattened processing order of `plan_entities`.
    pub fn entity_order() -> Result<Vec<EntityKind>, DomainError> {
        Ok(Self::plan_entities()?.into_iter().flatten().collect())
    }

    /// Calculates the execution order (Topological Sort with Layers).
    /// `graph` maps each node to the nodes it depends on.
    /// Layer N depends only on layers 0..N-1; nodes inside a layer are sorted.
    pub fn plan_execution(
        graph: &BTreeMap<EntityKind, Vec<EntityKind>>,
    ) -> Result<Vec<Vec<EntityKind>>, DomainError> {
        let mut in_degree: BTreeMap<EntityKind, usize> = BTreeMap::new();
        let mut adj_list: BTreeMap<EntityKind, Vec<EntityKind>> = BTreeMap::new();

        // 1. Initialization: Prepare all known nodes
        for node in graph.keys() {
            in_degree.insert(*node, 0);
            adj_list.insert(*node, Vec::new());
        }

        // 2. Graph Construction (Dependency Inversion)
        for (node, deps) in graph {
            for dep in deps {
                if graph.contains_key(dep) {
                    adj_list.entry(*dep).or_default().push(*node);
                    *in_degree.entry(*node).or_insert(0) += 1;
                }
            }
        }

        // 3. Kahn's Algorithm (Layered)
        let mut layers: Vec<Vec<EntityKind>> = Vec::new();
        let mut queue: VecDeque<EntityKind> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(node, _)| *node)
            .collect();

        let mut total_resolved = 0;

        while !queue.is_empty() {
            let mut current_layer: Vec<EntityKind> = queue.drain(..).collect();
            current_layer.sort();
            total_resolved += current_layer.len();

            for current in &current_layer {
                if let Some(neighbors) = adj_list.get(current) {
                    for neighbor in neighbors {
                        if let Some(degree) = in_degree.get_mut(neighbor) {
                            *degree -= 1;
                            if *degree == 0 {
                                queue.push_back(*neighbor);
                            }
                        }
                    }
                }
            }
            layers.push(current_layer);
        }

        // 4. Cycle Detection
        if total_resolved != graph.len() {
            let stuck: Vec<String> = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(node, _)| node.to_string())
                .collect();
            return Err(DomainError::CircularDependency(format!(
                "Resolved {}/{} entities. Unresolved: {}",
                total_resolved,
                graph.len(),
                stuck.join(", ")
            )));
        }

        Ok(layers)
    }
}
