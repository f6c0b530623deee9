// medallion/src/commands/mod.rs

pub mod audit;
pub mod clean;
pub mod inspect;
pub mod plan;
pub mod run;
