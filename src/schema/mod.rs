pub mod manager;
pub mod migrate;
pub mod record;

pub use manager::normalize;
pub use record::{Individual, PedigreeRecord, Relationship, CURRENT_SCHEMA_VERSION};
