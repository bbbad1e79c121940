pub mod conflicts;
pub mod graph;
pub mod queries;

pub use conflicts::ConflictDetector;
pub use graph::PedigreeGraph;
pub use queries::PedigreeSummary;
