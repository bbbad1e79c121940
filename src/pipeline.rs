//! End-to-end session orchestration: raw input through extraction,
//! normalization, graph assembly, conflict detection, pattern evaluation
//! and risk aggregation into one session report. Each stage publishes a
//! progress event; subscribers see the run unfold without touching it.

use crate::config::EngineConfig;
use crate::engine::RuleEngine;
use crate::events::{PipelineEvent, PipelineEventBus, PipelineStage};
use crate::extract::staging::DocumentRecognizer;
use crate::extract::{CancelSignal, ExtractionInput, ExtractionParser};
use crate::pedigree::conflicts::{rejection_conflict, renumber};
use crate::pedigree::{ConflictDetector, PedigreeGraph};
use crate::reports::RiskAggregator;
use crate::schema::record::{IndividualId, PedigreeRecord};
use crate::types::{ConflictRecord, ExtractionReport, SessionReport};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct PedigreePipeline {
    config: EngineConfig,
    parser: ExtractionParser,
    detector: ConflictDetector,
    engine: RuleEngine,
    aggregator: RiskAggregator,
    events: PipelineEventBus,
}

#[derive(Debug, Clone)]
pub struct ComponentHealth {
    pub name: String,
    pub healthy: bool,
}

#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub components: Vec<ComponentHealth>,
    pub timestamp: DateTime<Utc>,
}

impl PedigreePipeline {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate().context("invalid engine configuration")?;
        let parser =
            ExtractionParser::new(&config).context("failed to build the extraction parser")?;
        Ok(Self {
            parser,
            detector: ConflictDetector::new(&config.validation),
            engine: RuleEngine::with_default_evaluators(),
            aggregator: RiskAggregator::new(&config.risk_bands),
            events: PipelineEventBus::new(),
            config,
        })
    }

    pub fn with_recognizer(mut self, recognizer: Box<dyn DocumentRecognizer>) -> Self {
        self.parser = self.parser.with_recognizer(recognizer);
        self
    }

    /// The bus carrying stage events for every session this pipeline runs.
    pub fn events(&self) -> &PipelineEventBus {
        &self.events
    }

    /// Run one full session from raw input. Content-level problems come
    /// back inside the report; `Err` means the session could not produce
    /// a report at all.
    #[instrument(skip(self, input, cancel))]
    pub async fn run_session(
        &self,
        input: ExtractionInput,
        cancel: CancelSignal,
    ) -> Result<SessionReport> {
        let session_id = Uuid::new_v4();
        self.publish(session_id, PipelineStage::Extraction, "extraction started")
            .await;

        let outcome = self
            .parser
            .extract(input, cancel)
            .await
            .context("extraction failed")?;
        self.publish(
            session_id,
            PipelineStage::Normalization,
            format!(
                "extracted {} individuals via {:?}",
                outcome.record.individuals.len(),
                outcome.report.method
            ),
        )
        .await;

        self.analyze(session_id, &outcome.record, Some(outcome.report))
            .await
    }

    /// Analyze an already-normalized record, skipping extraction. Used for
    /// re-analysis after manual edits.
    pub async fn analyze_record(&self, record: &PedigreeRecord) -> Result<SessionReport> {
        let session_id = Uuid::new_v4();
        self.analyze(session_id, record, None).await
    }

    /// Structural validation only: build the graph and run the conflict
    /// sweep, without pattern evaluation.
    pub fn validate_record(&self, record: &PedigreeRecord) -> Vec<ConflictRecord> {
        let (graph, rejections) = PedigreeGraph::from_record(record);
        let mut conflicts: Vec<ConflictRecord> =
            rejections.iter().map(rejection_conflict).collect();
        conflicts.extend(self.detector.detect(&graph));
        renumber(&mut conflicts);
        conflicts
    }

    pub async fn health_check(&self) -> HealthStatus {
        let mut components = vec![ComponentHealth {
            name: "configuration".to_string(),
            healthy: self.config.validate().is_ok(),
        }];
        for (name, healthy) in self.parser.health_check().await {
            components.push(ComponentHealth { name, healthy });
        }
        HealthStatus {
            healthy: components.iter().all(|c| c.healthy),
            components,
            timestamp: Utc::now(),
        }
    }

    async fn analyze(
        &self,
        session_id: Uuid,
        record: &PedigreeRecord,
        extraction: Option<ExtractionReport>,
    ) -> Result<SessionReport> {
        self.publish(session_id, PipelineStage::GraphAssembly, "assembling pedigree graph")
            .await;
        let (graph, rejections) = PedigreeGraph::from_record(record);

        self.publish(
            session_id,
            PipelineStage::ConflictDetection,
            "running contradiction sweep",
        )
        .await;
        let mut conflicts: Vec<ConflictRecord> =
            rejections.iter().map(rejection_conflict).collect();
        conflicts.extend(self.detector.detect(&graph));
        renumber(&mut conflicts);

        // individuals named by blocking conflicts are masked out of pattern
        // evaluation; their data stays in the record for review
        let mut masked: Vec<IndividualId> = conflicts
            .iter()
            .filter(|c| c.is_blocking())
            .flat_map(|c| c.individuals.iter().copied())
            .collect();
        masked.sort();
        masked.dedup();
        let analysis_complete = masked.is_empty();

        let mut notes: Vec<String> = record.provenance.notes.clone();
        if !analysis_complete {
            notes.push(format!(
                "analysis is partial: {} masked from pattern evaluation by blocking conflicts",
                masked
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        self.publish(
            session_id,
            PipelineStage::PatternEvaluation,
            format!("evaluating inheritance patterns ({} masked)", masked.len()),
        )
        .await;
        let masked_set: HashSet<IndividualId> = masked.into_iter().collect();
        let findings_by_condition = self
            .engine
            .evaluate_all(&graph, &masked_set)
            .context("pattern evaluation failed")?;

        self.publish(session_id, PipelineStage::RiskAggregation, "aggregating risk flags")
            .await;
        let flags = self
            .aggregator
            .aggregate(&findings_by_condition, &conflicts);
        let findings = findings_by_condition.into_values().flatten().collect();

        let report = SessionReport {
            session_id,
            generated_at: Utc::now(),
            record: graph.to_record(),
            extraction,
            conflicts,
            findings,
            flags,
            analysis_complete,
            notes,
        };

        info!(
            session = %session_id,
            conflicts = report.conflicts.len(),
            flags = report.flags.len(),
            complete = report.analysis_complete,
            "session analysis finished"
        );
        self.publish(session_id, PipelineStage::Complete, "session report ready")
            .await;
        Ok(report)
    }

    async fn publish(&self, session_id: Uuid, stage: PipelineStage, detail: impl Into<String>) {
        self.events
            .publish(PipelineEvent::new(session_id, stage, detail))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::record::{
        AffectedStatus, ConditionId, Individual, Relationship, Sex, SourceKind, SourceMethod,
    };

    fn pipeline() -> PedigreePipeline {
        PedigreePipeline::new(EngineConfig::default()).unwrap()
    }

    fn affected(id: u64, sex: Sex, condition: &str) -> Individual {
        let mut person = Individual::new(IndividualId(id));
        person.sex_at_birth = sex;
        person
            .conditions
            .insert(ConditionId::new(condition), AffectedStatus::Affected);
        person
    }

    fn dominant_family() -> PedigreeRecord {
        // affected mother, affected child, unaffected father
        let mut record = PedigreeRecord::empty(SourceKind::Upload, SourceMethod::Manual);
        let mut mother = affected(1, Sex::Female, "glaucoma");
        mother.name = Some("Ann".to_string());
        let mut father = Individual::new(IndividualId(2));
        father.sex_at_birth = Sex::Male;
        father
            .conditions
            .insert(ConditionId::new("glaucoma"), AffectedStatus::Unaffected);
        let mut child = affected(3, Sex::Female, "glaucoma");
        child.proband = true;
        record.individuals = vec![mother, father, child];
        record.relationships = vec![
            Relationship::parent_of(IndividualId(1), IndividualId(3)),
            Relationship::parent_of(IndividualId(2), IndividualId(3)),
        ];
        record
    }

    #[tokio::test]
    async fn test_run_session_produces_complete_report_and_events() {
        let pipeline = pipeline();
        let mut receiver = pipeline.events().subscribe();

        let report = pipeline
            .run_session(
                ExtractionInput::RecognizedText {
                    text: "My mother has breast cancer.".to_string(),
                    source: SourceKind::Conversation,
                },
                CancelSignal::never(),
            )
            .await
            .unwrap();

        assert!(report.analysis_complete);
        assert!(report.extraction.is_some());
        assert_eq!(report.record.individuals.len(), 2);
        assert!(report
            .findings
            .iter()
            .any(|f| f.condition == ConditionId::new("breast cancer")));

        // the event stream covers the whole run in stage order
        let mut stages = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            assert_eq!(event.session_id, report.session_id);
            stages.push(event.stage);
        }
        assert_eq!(stages.first(), Some(&PipelineStage::Extraction));
        assert_eq!(stages.last(), Some(&PipelineStage::Complete));
    }

    #[tokio::test]
    async fn test_analyze_record_flags_dominant_pattern() {
        let report = pipeline().analyze_record(&dominant_family()).await.unwrap();

        assert!(report.analysis_complete);
        assert!(report.conflicts.is_empty());

        let flag = report
            .flags
            .iter()
            .find(|f| f.condition == ConditionId::new("glaucoma"))
            .expect("glaucoma should be flagged");
        assert!(!flag.provenance.rule_ids.is_empty());
        assert!(!flag.provenance.individuals.is_empty());
        assert!(flag.rationale.contains("genetic counseling"));
    }

    #[tokio::test]
    async fn test_blocking_conflict_masks_and_marks_partial() {
        let mut record = dominant_family();
        // second proband trips a blocking conflict
        record.individuals[0].proband = true;

        let report = pipeline().analyze_record(&record).await.unwrap();

        assert!(!report.analysis_complete);
        assert!(!report.blocking_conflicts().is_empty());
        assert!(report
            .notes
            .iter()
            .any(|n| n.contains("analysis is partial")));
    }

    #[tokio::test]
    async fn test_advisory_conflicts_do_not_block_analysis() {
        let mut record = dominant_family();
        // same-sex recorded parents: advisory under the default policy
        record.individuals[1].sex_at_birth = Sex::Female;

        let report = pipeline().analyze_record(&record).await.unwrap();

        assert!(report.analysis_complete);
        assert_eq!(report.conflicts.len(), 1);
        assert!(!report.conflicts[0].is_blocking());
        assert!(!report.flags.is_empty());
    }

    #[tokio::test]
    async fn test_validate_record_reports_numbered_conflicts() {
        let mut record = dominant_family();
        record
            .relationships
            .push(Relationship::parent_of(IndividualId(9), IndividualId(3)));

        let conflicts = pipeline().validate_record(&record);
        assert!(!conflicts.is_empty());
        for (index, conflict) in conflicts.iter().enumerate() {
            assert_eq!(conflict.id, index as u32 + 1);
        }
        assert!(conflicts
            .iter()
            .any(|c| c.description.contains("missing individual #9")));
    }

    #[tokio::test]
    async fn test_health_check_reports_configuration() {
        let status = pipeline().health_check().await;
        assert!(status.healthy);
        assert!(status
            .components
            .iter()
            .any(|c| c.name == "configuration" && c.healthy));
    }
}
