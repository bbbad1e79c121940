use crate::schema::record::IndividualId;
use thiserror::Error;

/// Failures raised while normalizing raw payloads into the current schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unsupported schema version {found} (supported: 1..={supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("migration from v{from_version} failed on `{field}`: {reason}")]
    Migration {
        from_version: u32,
        field: String,
        reason: String,
    },

    #[error("invalid record: `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Resource-level faults around external collaborators and staging.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to stage document: {0}")]
    Staging(#[from] std::io::Error),

    #[error("document recognition timed out after {seconds}s")]
    RecognitionTimeout { seconds: u64 },

    #[error("document recognizer failed: {0}")]
    Recognizer(String),

    #[error("draft extraction timed out after {seconds}s")]
    DraftTimeout { seconds: u64 },

    #[error("draft extractor failed: {0}")]
    Drafter(String),
}

/// Failures from the extraction front door.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("extraction cancelled")]
    Cancelled,
}

/// Typed rejections from pedigree graph mutations. A rejected mutation
/// leaves the graph exactly as it was.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("individual {0} already exists")]
    DuplicateIndividual(IndividualId),

    #[error("individual {0} is not in the pedigree")]
    UnknownIndividual(IndividualId),

    #[error("individual {candidate} cannot be proband: {existing} already is")]
    DuplicateProband {
        candidate: IndividualId,
        existing: IndividualId,
    },

    #[error("relationship references missing individual {0}")]
    DanglingReference(IndividualId),

    #[error("individual {0} cannot be related to themselves")]
    SelfRelationship(IndividualId),

    #[error("relationship between {from} and {to} already recorded")]
    DuplicateRelationship { from: IndividualId, to: IndividualId },

    #[error("{child} already has two biological parents")]
    ExcessParents { child: IndividualId },

    #[error("edge {parent} -> {child} would create an ancestry cycle")]
    RelationshipCycle {
        parent: IndividualId,
        child: IndividualId,
    },

    #[error("no such relationship between {from} and {to}")]
    UnknownRelationship { from: IndividualId, to: IndividualId },
}

/// Failures from the inheritance rule engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("condition `{0}` does not appear in the pedigree")]
    UnknownCondition(String),

    #[error("no pattern evaluators registered")]
    EmptyRegistry,
}

/// Umbrella error for library consumers that do not match on subsystems.
#[derive(Debug, Error)]
pub enum PedigreeError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T> = std::result::Result<T, PedigreeError>;
