pub mod csv_source;
pub mod duckdb;
pub mod memory;

pub use csv_source::CsvSource;
pub use duckdb::DuckDbAuditStore;
pub use memory::InMemorySource;
