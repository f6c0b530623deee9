pub mod project;

pub use crate::domain::config::ProjectConfig;
pub use project::{load_project_config, parse_project_config};
