// medallion-core/src/lib.rs

// 1. Mandatory documentation for production code
#![allow(missing_docs)] // On autorise le manque de doc pour le moment

// 2. Memory safety
#![deny(unsafe_code)]
// 3. Robustness
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
// 4. Performance
#![warn(clippy::perf)]

// --- MODULES HEXAGONAUX ---

// 1. Ports (Interfaces / Traits)
// Contrats: sources brutes, audit, publication des snapshots
pub mod ports;

// 2. Domain (Cœur du métier)
// Schémas, validation, agrégation, réconciliation, cycle de vie des runs.
// Ne dépend de RIEN d'autre (ni infra, ni app).
pub mod domain;

// 3. Infrastructure (Adapters)
// DuckDB (audit + lecture CSV), fichiers de config, miroir JSON
// Dépend du Domain et des Ports.
pub mod infrastructure;

// 4. Application (Use Cases)
// Orchestration (Pipeline, Audit, Clean)
pub mod application;

// --- GESTION DES ERREURS GLOBALE ---
pub mod error;

#[cfg(test)]
pub(crate) mod test_support;

// --- RE-EXPORTS (FACADE) ---
pub use error::MedallionError;
