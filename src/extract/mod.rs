pub mod fallback;
pub mod parser;
pub mod reconcile;
pub mod staging;

pub use fallback::FallbackParser;
pub use parser::{
    CancelHandle, CancelSignal, ExtractionInput, ExtractionOutcome, ExtractionParser,
};
pub use staging::{DocumentRecognizer, StagedDocument};
