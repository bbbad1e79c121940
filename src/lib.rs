pub mod assist;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod extract;
pub mod pedigree;
pub mod pipeline;
pub mod reports;
pub mod schema;
pub mod types;

pub use config::EngineConfig;
pub use error::{PedigreeError, Result};
pub use pipeline::PedigreePipeline;
pub use types::SessionReport;
