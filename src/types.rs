use crate::schema::record::{
    ConditionId, IndividualId, PedigreeRecord, SourceKind, SourceMethod,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Core report types shared across extraction, validation and analysis.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub severity: MessageSeverity,
    pub field: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfidence {
    pub field: String,
    pub score: f64,
    pub origin: SourceMethod,
}

/// Both sides of a field where assisted and fallback extraction disagreed.
/// The kept value is already in the record; the discarded one is retained
/// here for human review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDispute {
    pub field: String,
    pub kept: String,
    pub kept_origin: SourceMethod,
    pub kept_score: f64,
    pub discarded: String,
    pub discarded_origin: SourceMethod,
    pub discarded_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub source: SourceKind,
    pub method: SourceMethod,
    pub field_confidences: Vec<FieldConfidence>,
    pub messages: Vec<ValidationMessage>,
    pub disputes: Vec<FieldDispute>,
    /// Clarifying question split off a drafter reply, surfaced to the
    /// caller. Never answered internally.
    pub follow_up: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    RelationshipCycle,
    ExcessParents,
    MultipleProbands,
    SexRoleViolation,
    ImplausibleTiming,
    DuplicateRelationship,
    DuplicateIndividual,
    DanglingReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Advisory,
    Blocking,
}

/// Detection output is fully deterministic for an unchanged graph, which
/// is why there is no timestamp here; timestamps belong to the session
/// report that carries these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Sequence number assigned in detection order.
    pub id: u32,
    pub kind: ConflictKind,
    pub severity: ConflictSeverity,
    pub individuals: Vec<IndividualId>,
    pub description: String,
    /// Candidate edits a reviewer could apply to resolve the conflict.
    /// Never applied automatically.
    #[serde(default)]
    pub suggested_actions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternHypothesis {
    AutosomalRecessive,
    AutosomalDominant,
    XLinkedRecessive,
    XLinkedDominant,
    Mitochondrial,
    Indeterminate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InheritanceFinding {
    pub condition: ConditionId,
    pub pattern: PatternHypothesis,
    pub rule_id: String,
    /// Proportion of informative individuals consistent with the pattern,
    /// in [0, 1].
    pub consistency: f64,
    pub supporting: Vec<IndividualId>,
    pub contradicting: Vec<IndividualId>,
    pub trace: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagProvenance {
    pub rule_ids: Vec<String>,
    pub individuals: Vec<IndividualId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFlag {
    pub condition: ConditionId,
    pub band: RiskBand,
    pub rationale: String,
    /// Ranked pattern hypotheses, strongest first.
    pub findings: Vec<InheritanceFinding>,
    pub provenance: FlagProvenance,
    pub advisory_conflicts: Vec<ConflictRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub record: PedigreeRecord,
    pub extraction: Option<ExtractionReport>,
    pub conflicts: Vec<ConflictRecord>,
    pub findings: Vec<InheritanceFinding>,
    pub flags: Vec<RiskFlag>,
    /// False when blocking conflicts masked part of the pedigree out of
    /// the analyzed population.
    pub analysis_complete: bool,
    pub notes: Vec<String>,
}

impl ValidationMessage {
    pub fn warning(field: Option<&str>, message: impl Into<String>) -> Self {
        ValidationMessage {
            severity: MessageSeverity::Warning,
            field: field.map(String::from),
            message: message.into(),
        }
    }

    pub fn error(field: Option<&str>, message: impl Into<String>) -> Self {
        ValidationMessage {
            severity: MessageSeverity::Error,
            field: field.map(String::from),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == MessageSeverity::Error
    }
}

impl ExtractionReport {
    pub fn new(source: SourceKind, method: SourceMethod) -> Self {
        ExtractionReport {
            source,
            method,
            field_confidences: Vec::new(),
            messages: Vec::new(),
            disputes: Vec::new(),
            follow_up: None,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.is_error())
    }

    /// Mean field confidence; 0.0 when no fields were extracted.
    pub fn aggregate_confidence(&self) -> f64 {
        if self.field_confidences.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.field_confidences.iter().map(|f| f.score).sum();
        sum / self.field_confidences.len() as f64
    }

    pub fn push_confidence(&mut self, field: impl Into<String>, score: f64, origin: SourceMethod) {
        self.field_confidences.push(FieldConfidence {
            field: field.into(),
            score: score.clamp(0.0, 1.0),
            origin,
        });
    }
}

impl ConflictRecord {
    pub fn is_blocking(&self) -> bool {
        self.severity == ConflictSeverity::Blocking
    }

    pub fn involves(&self, id: IndividualId) -> bool {
        self.individuals.contains(&id)
    }
}

impl PatternHypothesis {
    pub fn label(&self) -> &'static str {
        match self {
            PatternHypothesis::AutosomalRecessive => "autosomal recessive",
            PatternHypothesis::AutosomalDominant => "autosomal dominant",
            PatternHypothesis::XLinkedRecessive => "X-linked recessive",
            PatternHypothesis::XLinkedDominant => "X-linked dominant",
            PatternHypothesis::Mitochondrial => "mitochondrial",
            PatternHypothesis::Indeterminate => "indeterminate",
        }
    }
}

impl InheritanceFinding {
    pub fn indeterminate(condition: ConditionId, rule_id: &str) -> Self {
        InheritanceFinding {
            condition,
            pattern: PatternHypothesis::Indeterminate,
            rule_id: rule_id.to_string(),
            consistency: 0.0,
            supporting: Vec::new(),
            contradicting: Vec::new(),
            trace: Vec::new(),
        }
    }

    pub fn is_informative(&self) -> bool {
        self.pattern != PatternHypothesis::Indeterminate && !self.supporting.is_empty()
    }
}

impl FlagProvenance {
    pub fn is_empty(&self) -> bool {
        self.rule_ids.is_empty() || self.individuals.is_empty()
    }
}

impl SessionReport {
    pub fn blocking_conflicts(&self) -> Vec<&ConflictRecord> {
        self.conflicts.iter().filter(|c| c.is_blocking()).collect()
    }

    pub fn highest_band(&self) -> Option<RiskBand> {
        self.flags.iter().map(|f| f.band).max()
    }
}

impl Default for MessageSeverity {
    fn default() -> Self {
        MessageSeverity::Warning
    }
}

impl Default for ConflictSeverity {
    fn default() -> Self {
        ConflictSeverity::Advisory
    }
}

impl Default for RiskBand {
    fn default() -> Self {
        RiskBand::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::record::SourceKind;

    #[test]
    fn aggregate_confidence_is_mean_of_fields() {
        let mut report = ExtractionReport::new(SourceKind::Document, SourceMethod::ModelAssisted);
        assert_eq!(report.aggregate_confidence(), 0.0);

        report.push_confidence("individual.1.name", 0.8, SourceMethod::ModelAssisted);
        report.push_confidence("individual.1.sex_at_birth", 0.4, SourceMethod::ModelAssisted);
        assert!((report.aggregate_confidence() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn confidence_scores_are_clamped() {
        let mut report = ExtractionReport::new(SourceKind::Upload, SourceMethod::StructuredParse);
        report.push_confidence("relationship.0", 1.4, SourceMethod::StructuredParse);
        assert_eq!(report.field_confidences[0].score, 1.0);
    }

    #[test]
    fn risk_bands_order_low_to_high() {
        assert!(RiskBand::High > RiskBand::Moderate);
        assert!(RiskBand::Moderate > RiskBand::Low);
    }

    #[test]
    fn provenance_with_rules_but_no_individuals_counts_as_empty() {
        let provenance = FlagProvenance {
            rule_ids: vec!["autosomal_recessive".to_string()],
            individuals: Vec::new(),
        };
        assert!(provenance.is_empty());
    }
}
