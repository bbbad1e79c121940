//! Extraction front door. Decides whether raw input is already structured,
//! orchestrates the assisted drafting path under a timeout and a cancel
//! signal, and reconciles drafted output with the deterministic rule parser.
//! Malformed content never raises; it comes back as a best-effort record
//! plus validation messages.

use crate::assist::{DraftExtractor, DraftProviderFactory, DraftRequest};
use crate::config::{AssistConfig, EngineConfig, ExtractionConfig};
use crate::error::{ExtractError, ResourceError};
use crate::extract::fallback::{relationship_key, FallbackParser};
use crate::extract::reconcile::{reconcile, CandidateDraft};
use crate::extract::staging::{DocumentRecognizer, StagedDocument};
use crate::schema;
use crate::schema::record::{PedigreeRecord, SourceKind, SourceMethod};
use crate::types::{ExtractionReport, ValidationMessage};
use anyhow::Result;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Confidence baselines per extraction method. Calibration facts of each
/// method, not deployment knobs, which is why they are constants here and
/// not configuration.
pub const STRUCTURED_CONFIDENCE: f64 = 0.95;
pub const DOCUMENT_CONFIDENCE: f64 = 0.6;
pub const CONVERSATION_CONFIDENCE: f64 = 0.4;

/// Raw input handed to [`ExtractionParser::extract`].
pub enum ExtractionInput {
    /// Already JSON-shaped payload (current or older schema version).
    Structured(serde_json::Value),
    /// Text that has already been through document recognition, or a
    /// conversation transcript.
    RecognizedText { text: String, source: SourceKind },
    /// Uploaded document bytes; staged to disk and sent to the recognizer.
    DocumentBytes { bytes: Vec<u8> },
}

#[derive(Debug)]
pub struct ExtractionOutcome {
    pub record: PedigreeRecord,
    pub report: ExtractionReport,
}

/// Caller side of an extraction cancel pair.
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

/// Parser side of an extraction cancel pair. Cheap to clone.
#[derive(Clone)]
pub struct CancelSignal {
    receiver: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn new() -> (CancelHandle, CancelSignal) {
        let (sender, receiver) = watch::channel(false);
        (CancelHandle { sender }, CancelSignal { receiver })
    }

    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

impl CancelSignal {
    /// A signal that never fires, for callers without a cancel pathway.
    pub fn never() -> Self {
        let (_sender, receiver) = watch::channel(false);
        // sender is dropped here; `cancelled` pends forever on a closed
        // channel that was never set
        CancelSignal { receiver }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    async fn cancelled(&mut self) {
        loop {
            if *self.receiver.borrow() {
                return;
            }
            if self.receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

pub struct ExtractionParser {
    extraction: ExtractionConfig,
    assist: AssistConfig,
    drafter: Option<Box<dyn DraftExtractor>>,
    recognizer: Option<Box<dyn DocumentRecognizer>>,
    fallback: FallbackParser,
}

impl ExtractionParser {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let drafter = DraftProviderFactory::create(&config.assist)?;
        Ok(Self {
            extraction: config.extraction.clone(),
            assist: config.assist.clone(),
            drafter,
            recognizer: None,
            fallback: FallbackParser::new()?,
        })
    }

    pub fn with_recognizer(mut self, recognizer: Box<dyn DocumentRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_drafter(mut self, drafter: Box<dyn DraftExtractor>) -> Self {
        self.drafter = Some(drafter);
        self
    }

    /// Extract a candidate record and report from raw input.
    ///
    /// `Err` is reserved for schema rejection of explicitly structured
    /// input and for a signal that was already cancelled on entry. Every
    /// content-level problem, including completely unusable text, comes
    /// back as an `Ok` outcome carrying validation messages.
    #[instrument(skip(self, input, cancel))]
    pub async fn extract(
        &self,
        input: ExtractionInput,
        cancel: CancelSignal,
    ) -> Result<ExtractionOutcome, ExtractError> {
        if cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }

        let mut cancel = cancel;
        let (text, source, mut preface) = match input {
            ExtractionInput::Structured(value) => {
                return self.extract_structured(&value);
            }
            ExtractionInput::RecognizedText { text, source } => (text, source, Vec::new()),
            ExtractionInput::DocumentBytes { bytes } => {
                let (text, messages) = self.recognize(&bytes, &mut cancel).await;
                (text, SourceKind::Document, messages)
            }
        };

        // a structured payload may arrive embedded in surrounding text
        if let Some(value) = salvage_json(&text) {
            match self.extract_structured(&value) {
                Ok(mut outcome) => {
                    outcome.report.messages.append(&mut preface);
                    return Ok(outcome);
                }
                Err(err) => {
                    preface.push(ValidationMessage::warning(
                        None,
                        format!("embedded JSON payload could not be used: {}", err),
                    ));
                }
            }
        }

        let mut outcome = self.extract_text(&text, source, &mut cancel).await;
        let mut messages = preface;
        messages.append(&mut outcome.report.messages);
        outcome.report.messages = messages;
        finish(&mut outcome);
        Ok(outcome)
    }

    /// Availability of the external collaborators this parser may invoke.
    /// Unconfigured collaborators report healthy; extraction degrades to
    /// the deterministic path without them.
    pub async fn health_check(&self) -> Vec<(String, bool)> {
        let mut components = Vec::new();
        if let Some(drafter) = &self.drafter {
            let healthy = drafter.health_check().await.unwrap_or(false);
            components.push((format!("drafter ({})", drafter.name()), healthy));
        }
        if let Some(recognizer) = &self.recognizer {
            let healthy = recognizer.health_check().await.unwrap_or(false);
            components.push(("recognizer".to_string(), healthy));
        }
        components
    }

    fn extract_structured(
        &self,
        value: &serde_json::Value,
    ) -> Result<ExtractionOutcome, ExtractError> {
        let (mut record, messages) = schema::normalize(value).map_err(ExtractError::Schema)?;
        record.provenance.source = SourceKind::Upload;
        record.provenance.method = SourceMethod::StructuredParse;

        let mut report = ExtractionReport::new(SourceKind::Upload, SourceMethod::StructuredParse);
        report.messages = messages;
        seed_confidences(&record, &mut report, STRUCTURED_CONFIDENCE);

        let mut outcome = ExtractionOutcome { record, report };
        finish(&mut outcome);
        info!(
            individuals = outcome.record.individuals.len(),
            "structured payload extracted"
        );
        Ok(outcome)
    }

    async fn extract_text(
        &self,
        text: &str,
        source: SourceKind,
        cancel: &mut CancelSignal,
    ) -> ExtractionOutcome {
        let baseline = match source {
            SourceKind::Document => DOCUMENT_CONFIDENCE,
            _ => CONVERSATION_CONFIDENCE,
        };

        // the rule parser always runs: it is the fallback output and its
        // name inventory seeds pseudonymization of the drafter prompt
        let (fallback_record, fallback_report) = self.fallback.parse(text, source);
        let fallback_draft = CandidateDraft {
            record: fallback_record,
            report: fallback_report,
            baseline: crate::extract::fallback::RULE_CONFIDENCE,
        };

        let Some(assisted) = self
            .draft(text, source, baseline, &fallback_draft.record, cancel)
            .await
        else {
            return ExtractionOutcome {
                record: fallback_draft.record,
                report: fallback_draft.report,
            };
        };

        if assisted.report.aggregate_confidence() >= self.extraction.fallback_merge_threshold {
            debug!("assisted draft confident enough to stand alone");
            return ExtractionOutcome {
                record: assisted.record,
                report: assisted.report,
            };
        }

        let merged = reconcile(assisted, fallback_draft);
        ExtractionOutcome {
            record: merged.record,
            report: merged.report,
        }
    }

    /// One drafting attempt under timeout and cancellation. Any failure
    /// logs, leaves a message for the final report via the fallback route,
    /// and returns `None`; there are no retries here.
    async fn draft(
        &self,
        text: &str,
        source: SourceKind,
        baseline: f64,
        known: &PedigreeRecord,
        cancel: &mut CancelSignal,
    ) -> Option<CandidateDraft> {
        let drafter = self.drafter.as_ref()?;

        let (prompt, aliases) = if self.extraction.pseudonymize {
            pseudonymize_text(text, known)
        } else {
            (text.to_string(), Vec::new())
        };

        let request = DraftRequest {
            transcript: prompt,
            source,
        };
        let seconds = self.assist.timeout_seconds;

        let response = tokio::select! {
            result = timeout(Duration::from_secs(seconds), drafter.draft(request)) => {
                match result {
                    Ok(Ok(response)) => response,
                    Ok(Err(err)) => {
                        warn!(error = %err, "drafter failed; using the rule-based parser");
                        return None;
                    }
                    Err(_) => {
                        warn!(
                            error = %ResourceError::DraftTimeout { seconds },
                            "drafting timed out; using the rule-based parser"
                        );
                        return None;
                    }
                }
            }
            _ = cancel.cancelled() => {
                warn!("drafting cancelled; using the rule-based parser");
                return None;
            }
        };

        let reply = response.split();
        let payload = match reply.payload {
            Some(mut payload) => {
                patch_drafted_payload(&mut payload);
                payload
            }
            None => {
                warn!("drafter reply carried no JSON payload; using the rule-based parser");
                return None;
            }
        };

        let (mut record, messages) = match schema::normalize(&payload) {
            Ok(normalized) => normalized,
            Err(err) => {
                warn!(error = %err, "drafted payload failed normalization; using the rule-based parser");
                return None;
            }
        };

        record.provenance.source = source;
        record.provenance.method = SourceMethod::ModelAssisted;
        for individual in &mut record.individuals {
            if let Some(name) = &individual.name {
                if let Some(real) = aliases
                    .iter()
                    .find(|(_, placeholder)| placeholder == name)
                    .map(|(real, _)| real.clone())
                {
                    individual.name = Some(real);
                }
            }
        }
        // the drafter's own certainty never exceeds its path baseline
        for relationship in &mut record.relationships {
            relationship.origin = SourceMethod::ModelAssisted;
            relationship.confidence = relationship.confidence.clamp(0.0, 1.0).min(baseline);
        }

        let mut report = ExtractionReport::new(source, SourceMethod::ModelAssisted);
        report.messages = messages;
        report.follow_up = reply.follow_up;
        seed_confidences(&record, &mut report, baseline);

        debug!(
            individuals = record.individuals.len(),
            model = %response.model,
            "assisted draft normalized"
        );
        Some(CandidateDraft {
            record,
            report,
            baseline,
        })
    }

    /// Stage uploaded bytes and invoke the recognizer once under timeout
    /// and cancellation. The staged file is deleted when this scope ends,
    /// on every path.
    async fn recognize(
        &self,
        bytes: &[u8],
        cancel: &mut CancelSignal,
    ) -> (String, Vec<ValidationMessage>) {
        let mut messages = Vec::new();

        let Some(recognizer) = &self.recognizer else {
            messages.push(ValidationMessage::error(
                None,
                "no document recognizer is configured; the upload could not be read",
            ));
            return (String::new(), messages);
        };

        let staged = match StagedDocument::create(bytes) {
            Ok(staged) => staged,
            Err(err) => {
                warn!(error = %err, "document staging failed");
                messages.push(ValidationMessage::error(
                    None,
                    format!("the uploaded document could not be staged: {}", err),
                ));
                return (String::new(), messages);
            }
        };

        let seconds = self.extraction.recognition_timeout_seconds;
        let text = tokio::select! {
            result = timeout(Duration::from_secs(seconds), recognizer.recognize(staged.path())) => {
                match result {
                    Ok(Ok(text)) => text,
                    Ok(Err(err)) => {
                        warn!(error = %err, "document recognition failed");
                        messages.push(ValidationMessage::error(
                            None,
                            format!("document recognition failed: {}", err),
                        ));
                        String::new()
                    }
                    Err(_) => {
                        let err = ResourceError::RecognitionTimeout { seconds };
                        warn!(error = %err, "document recognition timed out");
                        messages.push(ValidationMessage::error(None, err.to_string()));
                        String::new()
                    }
                }
            }
            _ = cancel.cancelled() => {
                messages.push(ValidationMessage::warning(
                    None,
                    "document recognition cancelled; continuing without the document text",
                ));
                String::new()
            }
        };

        (text, messages)
    }
}

/// Record extracted-field confidence entries for everything the candidate
/// record actually carries.
fn seed_confidences(record: &PedigreeRecord, report: &mut ExtractionReport, baseline: f64) {
    use crate::schema::record::{Sex, VitalStatus};
    let method = report.method;

    for individual in &record.individuals {
        let mut any = false;
        let field = |name: &str, report: &mut ExtractionReport| {
            report.push_confidence(
                format!("individual.{}.{}", individual.id.0, name),
                baseline,
                method,
            );
        };
        if individual.name.is_some() {
            field("name", report);
            any = true;
        }
        if individual.sex_at_birth != Sex::Unknown {
            field("sex_at_birth", report);
            any = true;
        }
        if individual.vital_status != VitalStatus::Unknown {
            field("vital_status", report);
            any = true;
        }
        if individual.date_of_birth.is_some() {
            field("date_of_birth", report);
            any = true;
        }
        if individual.proband {
            field("proband", report);
            any = true;
        }
        for condition in individual.conditions.keys() {
            report.push_confidence(
                format!("individual.{}.condition.{}", individual.id.0, condition),
                baseline,
                method,
            );
            any = true;
        }
        if !any {
            field("present", report);
        }
    }

    for relationship in &record.relationships {
        report.push_confidence(relationship_key(relationship), relationship.confidence, method);
    }
}

/// Replace every known name in `text` with its `Person-<n>` placeholder so
/// raw names never cross the process boundary toward the drafter. Returns
/// the masked text and the (real, placeholder) pairs for de-aliasing the
/// reply.
fn pseudonymize_text(text: &str, known: &PedigreeRecord) -> (String, Vec<(String, String)>) {
    let masked = known.pseudonymized();
    let mut aliases: Vec<(String, String)> = known
        .individuals
        .iter()
        .zip(masked.individuals.iter())
        .filter_map(|(real, placeholder)| {
            match (&real.name, &placeholder.name) {
                (Some(real), Some(placeholder)) => Some((real.clone(), placeholder.clone())),
                _ => None,
            }
        })
        .collect();
    // longer names first so "Annabel" is never half-replaced via "Anna"
    aliases.sort_by_key(|(real, _)| std::cmp::Reverse(real.len()));

    let mut prompt = text.to_string();
    for (real, placeholder) in &aliases {
        prompt = prompt.replace(real.as_str(), placeholder);
    }
    (prompt, aliases)
}

/// Drafters are prompted to answer in the current schema shape but often
/// omit the envelope fields. Fill those in; never touch the content.
fn patch_drafted_payload(payload: &mut serde_json::Value) {
    let Some(object) = payload.as_object_mut() else {
        return;
    };
    object
        .entry("schema_version")
        .or_insert(serde_json::json!(crate::schema::CURRENT_SCHEMA_VERSION));
    object
        .entry("created_at")
        .or_insert(serde_json::json!(chrono::Utc::now().to_rfc3339()));
    object.entry("provenance").or_insert(serde_json::json!({
        "source": "conversation",
        "method": "model_assisted",
        "notes": [],
    }));
}

/// The first balanced JSON object in `text`, but only when the text is
/// substantially that object; a brace inside prose is not a payload.
fn salvage_json(text: &str) -> Option<serde_json::Value> {
    let span = crate::assist::interfaces::first_json_object(text)?;
    let value: serde_json::Value = serde_json::from_str(span).ok()?;
    // shape check: a pedigree payload mentions people in some vintage
    let looks_like_record = value.get("individuals").is_some() || value.get("people").is_some();
    looks_like_record.then_some(value)
}

/// Final shared checks on any outcome: a record with nothing extractable
/// is a validation error the caller can show, never a crash.
fn finish(outcome: &mut ExtractionOutcome) {
    if outcome.record.individuals.is_empty() {
        outcome.report.messages.push(ValidationMessage::error(
            None,
            "no family members could be extracted from the input",
        ));
    }
    for entry in &outcome.report.field_confidences {
        debug_assert!((0.0..=1.0).contains(&entry.score));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assist::interfaces::{DraftResponse, MockDraftExtractor};
    use crate::error::SchemaError;
    use crate::extract::staging::MockDocumentRecognizer;
    use crate::schema::record::ConditionId;
    use serde_json::json;

    fn parser() -> ExtractionParser {
        ExtractionParser::new(&EngineConfig::default()).unwrap()
    }

    fn drafter_returning(content: &str) -> Box<MockDraftExtractor> {
        let content = content.to_string();
        let mut mock = MockDraftExtractor::new();
        mock.expect_draft().returning(move |_| {
            Ok(DraftResponse {
                content: content.clone(),
                model: "mock".to_string(),
            })
        });
        mock.expect_name().return_const("mock".to_string());
        Box::new(mock)
    }

    fn structured_payload() -> serde_json::Value {
        json!({
            "schema_version": 3,
            "created_at": "2024-05-01T00:00:00Z",
            "individuals": [
                {"id": 1, "name": "Ada", "sex_at_birth": "female", "vital_status": "living",
                 "conditions": {"breast cancer": "affected"}, "proband": true},
                {"id": 2, "sex_at_birth": "male", "vital_status": "unknown", "conditions": {}}
            ],
            "relationships": [
                {"kind": "parent_of", "from": 2, "to": 1, "confidence": 1.0, "biological": true}
            ],
            "provenance": {"source": "upload", "method": "manual", "notes": []}
        })
    }

    #[tokio::test]
    async fn test_structured_payload_parses_at_high_confidence() {
        let outcome = parser()
            .extract(
                ExtractionInput::Structured(structured_payload()),
                CancelSignal::never(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.record.individuals.len(), 2);
        assert_eq!(outcome.report.method, SourceMethod::StructuredParse);
        let name_score = outcome
            .report
            .field_confidences
            .iter()
            .find(|f| f.field == "individual.1.name")
            .map(|f| f.score)
            .unwrap();
        assert_eq!(name_score, STRUCTURED_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_future_schema_version_is_a_typed_error() {
        let payload = json!({"schema_version": 999, "individuals": [], "relationships": []});
        let err = parser()
            .extract(ExtractionInput::Structured(payload), CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Schema(SchemaError::UnsupportedVersion { found: 999, .. })
        ));
    }

    #[tokio::test]
    async fn test_garbled_text_yields_empty_record_and_error_message() {
        let outcome = parser()
            .extract(
                ExtractionInput::RecognizedText {
                    text: "%%%### unreadable scan output ###%%%".to_string(),
                    source: SourceKind::Document,
                },
                CancelSignal::never(),
            )
            .await
            .unwrap();

        assert!(outcome.record.individuals.is_empty());
        assert!(outcome.report.has_errors());
    }

    #[tokio::test]
    async fn test_transcript_without_drafter_uses_fallback_rules() {
        let outcome = parser()
            .extract(
                ExtractionInput::RecognizedText {
                    text: "My mother has breast cancer.".to_string(),
                    source: SourceKind::Conversation,
                },
                CancelSignal::never(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.report.method, SourceMethod::FallbackRules);
        assert_eq!(outcome.record.individuals.len(), 2);
    }

    #[tokio::test]
    async fn test_embedded_json_span_is_salvaged_from_text() {
        let text = format!(
            "Here is the exported record:\n{}",
            structured_payload()
        );
        let outcome = parser()
            .extract(
                ExtractionInput::RecognizedText {
                    text,
                    source: SourceKind::Document,
                },
                CancelSignal::never(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.report.method, SourceMethod::StructuredParse);
        assert_eq!(outcome.record.individuals.len(), 2);
    }

    #[tokio::test]
    async fn test_drafted_reply_is_reconciled_and_follow_up_surfaces() {
        let reply = r#"{"individuals": [
            {"id": 1, "name": "Person-1", "sex_at_birth": "female",
             "conditions": {"breast cancer": "affected"}},
            {"id": 2, "proband": true}
        ], "relationships": [
            {"kind": "parent_of", "from": 1, "to": 2, "confidence": 0.9}
        ]}
Was your mother's diagnosis before age fifty?"#;

        let outcome = parser()
            .with_drafter(drafter_returning(reply))
            .extract(
                ExtractionInput::RecognizedText {
                    text: "My mother Greta has breast cancer.".to_string(),
                    source: SourceKind::Conversation,
                },
                CancelSignal::never(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.report.method, SourceMethod::ModelAssisted);
        assert!(outcome
            .report
            .follow_up
            .as_deref()
            .unwrap()
            .contains("before age fifty"));

        // the drafter saw Person-1; the merged record carries the real name
        let mother = outcome
            .record
            .individuals
            .iter()
            .find(|i| i.is_affected(&ConditionId::new("breast cancer")))
            .unwrap();
        assert_eq!(mother.name.as_deref(), Some("Greta"));

        // drafted edge confidence is capped at the conversation baseline
        let edge = &outcome
            .record
            .relationships
            .iter()
            .find(|r| r.from == mother.id)
            .unwrap();
        assert!(edge.confidence <= 1.0);
        assert!(edge.confidence > CONVERSATION_CONFIDENCE - 1e-9);
    }

    #[tokio::test]
    async fn test_drafter_prompt_is_pseudonymized() {
        let mut mock = MockDraftExtractor::new();
        mock.expect_draft()
            .withf(|request| {
                request.transcript.contains("Person-1") && !request.transcript.contains("Greta")
            })
            .returning(|_| {
                Ok(DraftResponse {
                    content: r#"{"individuals": [], "relationships": []}"#.to_string(),
                    model: "mock".to_string(),
                })
            });
        mock.expect_name().return_const("mock".to_string());

        let outcome = parser()
            .with_drafter(Box::new(mock))
            .extract(
                ExtractionInput::RecognizedText {
                    text: "My mother Greta has breast cancer.".to_string(),
                    source: SourceKind::Conversation,
                },
                CancelSignal::never(),
            )
            .await
            .unwrap();

        // an empty draft fails the confidence gate and reconciles with the
        // fallback record, so Greta survives
        assert!(outcome
            .record
            .individuals
            .iter()
            .any(|i| i.name.as_deref() == Some("Greta")));
    }

    #[tokio::test]
    async fn test_cancelled_before_entry_is_a_typed_error() {
        let (handle, signal) = CancelHandle::new();
        handle.cancel();

        let err = parser()
            .extract(
                ExtractionInput::RecognizedText {
                    text: "My father had diabetes.".to_string(),
                    source: SourceKind::Conversation,
                },
                signal,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Cancelled));
    }

    struct SlowDrafter;

    #[async_trait::async_trait]
    impl DraftExtractor for SlowDrafter {
        async fn draft(&self, _request: DraftRequest) -> Result<DraftResponse> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            anyhow::bail!("unreachable")
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_cancellation_mid_draft_falls_back_immediately() {
        let (handle, signal) = CancelHandle::new();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let outcome = parser()
            .with_drafter(Box::new(SlowDrafter))
            .extract(
                ExtractionInput::RecognizedText {
                    text: "My father had diabetes.".to_string(),
                    source: SourceKind::Conversation,
                },
                signal,
            )
            .await
            .unwrap();

        assert_eq!(outcome.report.method, SourceMethod::FallbackRules);
        assert!(!outcome.record.individuals.is_empty());
    }

    #[tokio::test]
    async fn test_document_bytes_go_through_recognition() {
        let mut recognizer = MockDocumentRecognizer::new();
        recognizer
            .expect_recognize()
            .returning(|path| Ok(std::fs::read_to_string(path)?));

        let outcome = parser()
            .with_recognizer(Box::new(recognizer))
            .extract(
                ExtractionInput::DocumentBytes {
                    bytes: b"My mother has breast cancer.".to_vec(),
                },
                CancelSignal::never(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.report.source, SourceKind::Document);
        assert_eq!(outcome.record.individuals.len(), 2);
    }

    #[tokio::test]
    async fn test_upload_without_recognizer_degrades_to_validation_error() {
        let outcome = parser()
            .extract(
                ExtractionInput::DocumentBytes {
                    bytes: b"scan".to_vec(),
                },
                CancelSignal::never(),
            )
            .await
            .unwrap();

        assert!(outcome.record.individuals.is_empty());
        assert!(outcome
            .report
            .messages
            .iter()
            .any(|m| m.is_error() && m.message.contains("no document recognizer")));
    }

    #[test]
    fn test_salvage_requires_record_shape() {
        assert!(salvage_json("prefix {\"individuals\": []} suffix").is_some());
        assert!(salvage_json("a {\"note\": \"not a pedigree\"} b").is_none());
        assert!(salvage_json("no braces at all").is_none());
    }
}
