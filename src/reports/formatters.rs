//! Output formatting for session reports. JSON for machines, markdown for
//! review documents, plain text for the terminal.

use crate::schema::record::{Individual, Sex, VitalStatus};
use crate::types::{ConflictRecord, RiskBand, SessionReport};
use anyhow::Result;

pub trait ReportFormatter {
    fn format(&self, report: &SessionReport) -> Result<String>;
}

pub struct JsonFormatter;
pub struct MarkdownFormatter;
pub struct TextFormatter;

pub fn formatter_for(name: &str) -> Result<Box<dyn ReportFormatter>> {
    match name.to_lowercase().as_str() {
        "json" => Ok(Box::new(JsonFormatter)),
        "markdown" | "md" => Ok(Box::new(MarkdownFormatter)),
        "text" | "txt" => Ok(Box::new(TextFormatter)),
        other => anyhow::bail!(
            "unknown report format '{}' (expected json, markdown or text)",
            other
        ),
    }
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, report: &SessionReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, report: &SessionReport) -> Result<String> {
        let mut out = String::new();

        out.push_str(&format!(
            "# Family Health History Report\n\n\
             **Session:** {}  \n\
             **Generated:** {}  \n\
             **Analysis:** {}\n\n",
            report.session_id,
            report.generated_at.format("%Y-%m-%d %H:%M UTC"),
            if report.analysis_complete {
                "complete".to_string()
            } else {
                format!(
                    "partial ({} blocking conflict{})",
                    report.blocking_conflicts().len(),
                    if report.blocking_conflicts().len() == 1 { "" } else { "s" }
                )
            },
        ));

        out.push_str("## Family Members\n\n");
        if report.record.individuals.is_empty() {
            out.push_str("No family members were recorded.\n\n");
        } else {
            out.push_str("| Id | Name | Sex at birth | Vital status | Conditions |\n");
            out.push_str("|----|------|--------------|--------------|------------|\n");
            for individual in &report.record.individuals {
                out.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    individual.id,
                    individual.name.as_deref().unwrap_or("—"),
                    sex_label(individual.sex_at_birth),
                    vital_label(individual.vital_status),
                    conditions_label(individual),
                ));
            }
            out.push('\n');
        }

        if let Some(extraction) = &report.extraction {
            out.push_str(&format!(
                "## Extraction\n\n\
                 Method: {:?}. Aggregate confidence: {:.2}.\n\n",
                extraction.method,
                extraction.aggregate_confidence(),
            ));
            if let Some(question) = &extraction.follow_up {
                out.push_str(&format!(
                    "**Suggested follow-up question:** {}\n\n",
                    question
                ));
            }
            if !extraction.disputes.is_empty() {
                out.push_str("Fields needing review:\n\n");
                for dispute in &extraction.disputes {
                    out.push_str(&format!(
                        "- `{}`: kept '{}' ({:.2}), flagged '{}' ({:.2})\n",
                        dispute.field,
                        dispute.kept,
                        dispute.kept_score,
                        dispute.discarded,
                        dispute.discarded_score,
                    ));
                }
                out.push('\n');
            }
        }

        out.push_str("## Conflicts\n\n");
        if report.conflicts.is_empty() {
            out.push_str("None detected.\n\n");
        } else {
            out.push_str("| # | Severity | Kind | Description | Suggested actions |\n");
            out.push_str("|---|----------|------|-------------|-------------------|\n");
            for conflict in &report.conflicts {
                out.push_str(&format!(
                    "| {} | {} | {:?} | {} | {} |\n",
                    conflict.id,
                    severity_label(conflict),
                    conflict.kind,
                    conflict.description,
                    conflict.suggested_actions.join("; "),
                ));
            }
            out.push('\n');
        }

        out.push_str("## Risk Flags\n\n");
        if report.flags.is_empty() {
            out.push_str("No inheritance-pattern flags were raised.\n\n");
        } else {
            for flag in &report.flags {
                out.push_str(&format!(
                    "### {} — {}\n\n{}\n\n",
                    flag.condition,
                    band_label(flag.band),
                    flag.rationale,
                ));
                out.push_str(&format!(
                    "Evidence: rules [{}]; individuals [{}].\n\n",
                    flag.provenance.rule_ids.join(", "),
                    flag.provenance
                        .individuals
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                ));
                for conflict in &flag.advisory_conflicts {
                    out.push_str(&format!(
                        "> Advisory conflict #{}: {}\n",
                        conflict.id, conflict.description
                    ));
                }
                if !flag.advisory_conflicts.is_empty() {
                    out.push('\n');
                }
            }
        }

        if !report.notes.is_empty() {
            out.push_str("## Notes\n\n");
            for note in &report.notes {
                out.push_str(&format!("- {}\n", note));
            }
            out.push('\n');
        }

        out.push_str(
            "---\n*This report describes pattern hypotheses for clinician review. \
             It is not a diagnosis.*\n",
        );
        Ok(out)
    }
}

impl ReportFormatter for TextFormatter {
    fn format(&self, report: &SessionReport) -> Result<String> {
        let mut out = String::new();

        out.push_str(&format!(
            "FAMILY HEALTH HISTORY REPORT\n\
             Session:   {}\n\
             Generated: {}\n\
             Analysis:  {}\n\n",
            report.session_id,
            report.generated_at.format("%Y-%m-%d %H:%M UTC"),
            if report.analysis_complete { "complete" } else { "partial" },
        ));

        out.push_str(&format!(
            "Family members: {}\n",
            report.record.individuals.len()
        ));
        for individual in &report.record.individuals {
            out.push_str(&format!(
                "  {:<24} {:<8} {:<9} {}\n",
                individual.display_label(),
                sex_label(individual.sex_at_birth),
                vital_label(individual.vital_status),
                conditions_label(individual),
            ));
        }
        out.push('\n');

        out.push_str(&format!("Conflicts: {}\n", report.conflicts.len()));
        for conflict in &report.conflicts {
            out.push_str(&format!(
                "  [{}] {} {}\n",
                conflict.id,
                severity_label(conflict).to_uppercase(),
                conflict.description,
            ));
            for action in &conflict.suggested_actions {
                out.push_str(&format!("      suggest: {}\n", action));
            }
        }
        out.push('\n');

        out.push_str(&format!("Risk flags: {}\n", report.flags.len()));
        for flag in &report.flags {
            out.push_str(&format!(
                "  {} [{}]\n    {}\n",
                flag.condition,
                band_label(flag.band),
                flag.rationale,
            ));
        }

        if let Some(extraction) = &report.extraction {
            if let Some(question) = &extraction.follow_up {
                out.push_str(&format!("\nSuggested follow-up: {}\n", question));
            }
        }

        if !report.notes.is_empty() {
            out.push_str("\nNotes:\n");
            for note in &report.notes {
                out.push_str(&format!("  - {}\n", note));
            }
        }

        out.push_str("\nPattern hypotheses for clinician review; not a diagnosis.\n");
        Ok(out)
    }
}

fn sex_label(sex: Sex) -> &'static str {
    match sex {
        Sex::Male => "male",
        Sex::Female => "female",
        Sex::Unknown => "unknown",
    }
}

fn vital_label(status: VitalStatus) -> &'static str {
    match status {
        VitalStatus::Living => "living",
        VitalStatus::Deceased => "deceased",
        VitalStatus::Unknown => "unknown",
    }
}

fn band_label(band: RiskBand) -> &'static str {
    match band {
        RiskBand::High => "high",
        RiskBand::Moderate => "moderate",
        RiskBand::Low => "low",
    }
}

fn severity_label(conflict: &ConflictRecord) -> &'static str {
    if conflict.is_blocking() {
        "blocking"
    } else {
        "advisory"
    }
}

fn conditions_label(individual: &Individual) -> String {
    if individual.conditions.is_empty() {
        return "—".to_string();
    }
    individual
        .conditions
        .iter()
        .map(|(condition, status)| format!("{} ({:?})", condition, status).to_lowercase())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::record::{
        AffectedStatus, ConditionId, IndividualId, PedigreeRecord, SourceKind, SourceMethod,
    };
    use crate::types::{
        ConflictKind, ConflictSeverity, ExtractionReport, FlagProvenance, InheritanceFinding,
        PatternHypothesis, RiskFlag,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_report() -> SessionReport {
        let mut record =
            PedigreeRecord::empty(SourceKind::Conversation, SourceMethod::FallbackRules);
        let mut mother = Individual::new(IndividualId(1));
        mother.name = Some("Greta".to_string());
        mother.sex_at_birth = Sex::Female;
        mother
            .conditions
            .insert(ConditionId::new("breast cancer"), AffectedStatus::Affected);
        let mut proband = Individual::new(IndividualId(2));
        proband.proband = true;
        record.individuals = vec![mother, proband];

        let mut extraction =
            ExtractionReport::new(SourceKind::Conversation, SourceMethod::FallbackRules);
        extraction.follow_up = Some("At what age was the diagnosis made?".to_string());

        SessionReport {
            session_id: Uuid::nil(),
            generated_at: Utc::now(),
            record,
            extraction: Some(extraction),
            conflicts: vec![ConflictRecord {
                id: 1,
                kind: ConflictKind::ImplausibleTiming,
                severity: ConflictSeverity::Advisory,
                individuals: vec![IndividualId(1)],
                description: "parent younger than child".to_string(),
                suggested_actions: vec!["verify the dates of birth of #1 and #2".to_string()],
            }],
            findings: Vec::new(),
            flags: vec![RiskFlag {
                condition: ConditionId::new("breast cancer"),
                band: RiskBand::Moderate,
                rationale: "Pattern hypothesis; not a diagnosis.".to_string(),
                findings: vec![InheritanceFinding {
                    condition: ConditionId::new("breast cancer"),
                    pattern: PatternHypothesis::AutosomalDominant,
                    rule_id: "autosomal_dominant".to_string(),
                    consistency: 0.6,
                    supporting: vec![IndividualId(1)],
                    contradicting: Vec::new(),
                    trace: Vec::new(),
                }],
                provenance: FlagProvenance {
                    rule_ids: vec!["autosomal_dominant".to_string()],
                    individuals: vec![IndividualId(1)],
                },
                advisory_conflicts: Vec::new(),
            }],
            analysis_complete: true,
            notes: vec!["unplaced kin term: aunt".to_string()],
        }
    }

    #[test]
    fn test_json_round_trips() {
        let report = sample_report();
        let json = JsonFormatter.format(&report).unwrap();
        let parsed: SessionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.session_id, report.session_id);
        assert_eq!(parsed.flags.len(), 1);
    }

    #[test]
    fn test_markdown_carries_all_sections() {
        let markdown = MarkdownFormatter.format(&sample_report()).unwrap();
        assert!(markdown.contains("# Family Health History Report"));
        assert!(markdown.contains("| #1 | Greta |"));
        assert!(markdown.contains("breast cancer — moderate"));
        assert!(markdown.contains("follow-up question:** At what age"));
        assert!(markdown.contains("parent younger than child"));
        assert!(markdown.contains("verify the dates of birth of #1 and #2"));
        assert!(markdown.contains("not a diagnosis"));
    }

    #[test]
    fn test_text_surfaces_follow_up_and_disclaimer() {
        let text = TextFormatter.format(&sample_report()).unwrap();
        assert!(text.contains("Suggested follow-up: At what age"));
        assert!(text.contains("suggest: verify the dates of birth"));
        assert!(text.contains("not a diagnosis"));
        assert!(text.contains("Greta"));
    }

    #[test]
    fn test_unknown_format_is_an_error() {
        assert!(formatter_for("json").is_ok());
        assert!(formatter_for("MD").is_ok());
        assert!(formatter_for("pdf").is_err());
    }
}
