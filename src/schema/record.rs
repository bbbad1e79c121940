use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Schema version produced by normalization. Older payloads are migrated
/// up to this version; newer ones are rejected outright.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Process-local identifier for an individual. Stable across edits and
/// schema migrations within a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct IndividualId(pub u64);

impl fmt::Display for IndividualId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Normalized condition identifier: lowercase, trimmed, single-spaced.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionId(String);

impl ConditionId {
    pub fn new(raw: &str) -> Self {
        let normalized = raw
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        ConditionId(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalStatus {
    Living,
    Deceased,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffectedStatus {
    Affected,
    Unaffected,
    Unknown,
}

/// How a piece of data entered the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMethod {
    StructuredParse,
    ModelAssisted,
    FallbackRules,
    Manual,
}

/// Where the session's raw input came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Conversation,
    Document,
    Upload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Individual {
    pub id: IndividualId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sex_at_birth: Sex,
    #[serde(default)]
    pub vital_status: VitalStatus,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub conditions: BTreeMap<ConditionId, AffectedStatus>,
    #[serde(default)]
    pub proband: bool,
    #[serde(default)]
    pub twin_group: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Directed: `from` is a parent of `to`.
    ParentOf,
    /// Symmetric; stored once with the lower id as `from`.
    PartnerOf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub kind: RelationshipKind,
    pub from: IndividualId,
    pub to: IndividualId,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_biological")]
    pub biological: bool,
    #[serde(default = "default_origin")]
    pub origin: SourceMethod,
}

fn default_confidence() -> f64 {
    1.0
}

fn default_biological() -> bool {
    true
}

fn default_origin() -> SourceMethod {
    SourceMethod::Manual
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub source: SourceKind,
    pub method: SourceMethod,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// The canonical persisted form of a pedigree. Graph operations work on
/// `PedigreeGraph`; this is what crosses process boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PedigreeRecord {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub individuals: Vec<Individual>,
    pub relationships: Vec<Relationship>,
    pub provenance: Provenance,
}

impl Individual {
    pub fn new(id: IndividualId) -> Self {
        Individual {
            id,
            name: None,
            sex_at_birth: Sex::Unknown,
            vital_status: VitalStatus::Unknown,
            date_of_birth: None,
            conditions: BTreeMap::new(),
            proband: false,
            twin_group: None,
        }
    }

    pub fn affected_status(&self, condition: &ConditionId) -> AffectedStatus {
        self.conditions
            .get(condition)
            .copied()
            .unwrap_or(AffectedStatus::Unknown)
    }

    pub fn is_affected(&self, condition: &ConditionId) -> bool {
        self.affected_status(condition) == AffectedStatus::Affected
    }

    /// Label used in traces and conflict descriptions.
    pub fn display_label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", name, self.id),
            None => format!("individual {}", self.id),
        }
    }
}

impl Relationship {
    pub fn parent_of(from: IndividualId, to: IndividualId) -> Self {
        Relationship {
            kind: RelationshipKind::ParentOf,
            from,
            to,
            confidence: 1.0,
            biological: true,
            origin: SourceMethod::Manual,
        }
    }

    pub fn partner_of(a: IndividualId, b: IndividualId) -> Self {
        let (from, to) = if a <= b { (a, b) } else { (b, a) };
        Relationship {
            kind: RelationshipKind::PartnerOf,
            from,
            to,
            confidence: 1.0,
            biological: true,
            origin: SourceMethod::Manual,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_origin(mut self, origin: SourceMethod) -> Self {
        self.origin = origin;
        self
    }

    pub fn non_biological(mut self) -> Self {
        self.biological = false;
        self
    }

    pub fn involves(&self, id: IndividualId) -> bool {
        self.from == id || self.to == id
    }
}

impl PedigreeRecord {
    pub fn empty(source: SourceKind, method: SourceMethod) -> Self {
        PedigreeRecord {
            schema_version: CURRENT_SCHEMA_VERSION,
            created_at: Utc::now(),
            individuals: Vec::new(),
            relationships: Vec::new(),
            provenance: Provenance {
                source,
                method,
                notes: Vec::new(),
            },
        }
    }

    pub fn individual(&self, id: IndividualId) -> Option<&Individual> {
        self.individuals.iter().find(|i| i.id == id)
    }

    pub fn proband(&self) -> Option<&Individual> {
        self.individuals.iter().find(|i| i.proband)
    }

    /// Distinct conditions mentioned anywhere in the record, sorted.
    pub fn condition_ids(&self) -> Vec<ConditionId> {
        let mut ids: Vec<ConditionId> = self
            .individuals
            .iter()
            .flat_map(|i| i.conditions.keys().cloned())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn next_id(&self) -> IndividualId {
        let max = self.individuals.iter().map(|i| i.id.0).max().unwrap_or(0);
        IndividualId(max + 1)
    }

    /// Copy of the record with names replaced by `Person-<n>` placeholders
    /// in first-seen order. Ids, conditions and structure are untouched.
    pub fn pseudonymized(&self) -> Self {
        let mut out = self.clone();
        let mut counter = 0u32;
        for individual in &mut out.individuals {
            if individual.name.is_some() {
                counter += 1;
                individual.name = Some(format!("Person-{}", counter));
            }
        }
        out
    }
}

impl Default for Sex {
    fn default() -> Self {
        Sex::Unknown
    }
}

impl Default for VitalStatus {
    fn default() -> Self {
        VitalStatus::Unknown
    }
}

impl Default for AffectedStatus {
    fn default() -> Self {
        AffectedStatus::Unknown
    }
}
