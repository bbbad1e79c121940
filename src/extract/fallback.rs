//! Deterministic rule-based extraction. Pattern matching over normalized
//! text, no external collaborators, same output for the same input every
//! time. Runs when drafting assistance is unavailable or unconvincing,
//! and its name inventory seeds pseudonymization for the drafter prompt.

use crate::schema::record::{
    AffectedStatus, ConditionId, Individual, IndividualId, PedigreeRecord, Relationship, Sex,
    SourceKind, SourceMethod, VitalStatus,
};
use crate::types::{ExtractionReport, ValidationMessage};
use anyhow::Result;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// Confidence assigned to everything this parser produces. Deliberately
/// below every drafting baseline so reconciliation prefers drafted values
/// on disagreement.
pub const RULE_CONFIDENCE: f64 = 0.3;

/// Kin roles the rule parser can place in the graph relative to the
/// person giving the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum KinRole {
    Mother,
    Father,
    Sister,
    Brother,
    Daughter,
    Son,
    MaternalGrandmother,
    MaternalGrandfather,
    PaternalGrandmother,
    PaternalGrandfather,
    Spouse,
}

impl KinRole {
    fn from_terms(side: Option<&str>, term: &str) -> Option<(KinRole, Sex)> {
        let role = match (side, term) {
            (_, "mother" | "mom" | "mum") => (KinRole::Mother, Sex::Female),
            (_, "father" | "dad") => (KinRole::Father, Sex::Male),
            (_, "sister") => (KinRole::Sister, Sex::Female),
            (_, "brother") => (KinRole::Brother, Sex::Male),
            (_, "daughter") => (KinRole::Daughter, Sex::Female),
            (_, "son") => (KinRole::Son, Sex::Male),
            (Some("maternal"), "grandmother") => (KinRole::MaternalGrandmother, Sex::Female),
            (Some("maternal"), "grandfather") => (KinRole::MaternalGrandfather, Sex::Male),
            (Some("paternal"), "grandmother") => (KinRole::PaternalGrandmother, Sex::Female),
            (Some("paternal"), "grandfather") => (KinRole::PaternalGrandfather, Sex::Male),
            (_, "wife") => (KinRole::Spouse, Sex::Female),
            (_, "husband") => (KinRole::Spouse, Sex::Male),
            (_, "partner") => (KinRole::Spouse, Sex::Unknown),
            _ => return None,
        };
        Some(role)
    }
}

pub struct FallbackParser {
    kin_re: Regex,
    condition_re: Regex,
    partner_re: Regex,
    deceased_re: Regex,
    first_person_re: Regex,
}

/// Mutable state while sweeping one transcript.
struct Sweep {
    record: PedigreeRecord,
    report: ExtractionReport,
    proband: Option<IndividualId>,
    by_role: HashMap<KinRole, IndividualId>,
    by_name: HashMap<String, IndividualId>,
    next: u64,
}

impl FallbackParser {
    pub fn new() -> Result<Self> {
        Ok(FallbackParser {
            kin_re: Regex::new(
                r"(?i)\bmy\s+(?:(maternal|paternal)\s+)?(mother|mom|mum|father|dad|sister|brother|daughter|son|grandmother|grandfather|aunt|uncle|cousin|wife|husband|partner)\b(?-i:\s+([A-Z][a-z]+))?",
            )?,
            condition_re: Regex::new(
                r"(?i)\b(?:has|have|had|suffers?\s+from|suffered\s+from|diagnosed\s+with|died\s+of|battled)\s+(?:a\s+|an\s+|the\s+)?([a-zA-Z][a-zA-Z' \-]{2,48})",
            )?,
            partner_re: Regex::new(
                r"\b([A-Z][a-z]+)\s+and\s+([A-Z][a-z]+)\s+(?:are|were|got)\s+(?:married|partners|together)",
            )?,
            deceased_re: Regex::new(r"(?i)\b(?:passed\s+away|died|is\s+deceased|was\s+deceased)\b")?,
            first_person_re: Regex::new(
                r"(?i)\bI(?:'ve|'m)?\s+(?:have|had|am|was|suffer|suffered|battled|got|survived)\b",
            )?,
        })
    }

    /// Parse normalized free text into a candidate record and report.
    /// Never fails on content; unrecognizable text yields an empty record.
    pub fn parse(&self, text: &str, source: SourceKind) -> (PedigreeRecord, ExtractionReport) {
        let mut sweep = Sweep {
            record: PedigreeRecord::empty(source, SourceMethod::FallbackRules),
            report: ExtractionReport::new(source, SourceMethod::FallbackRules),
            proband: None,
            by_role: HashMap::new(),
            by_name: HashMap::new(),
            next: 1,
        };

        for sentence in split_sentences(text) {
            self.sweep_sentence(&sentence, &mut sweep);
        }
        self.link_siblings(&mut sweep);

        debug!(
            individuals = sweep.record.individuals.len(),
            relationships = sweep.record.relationships.len(),
            "fallback parse complete"
        );
        (sweep.record, sweep.report)
    }

    fn sweep_sentence(&self, sentence: &str, sweep: &mut Sweep) {
        let mut subjects: Vec<IndividualId> = Vec::new();

        for capture in self.kin_re.captures_iter(sentence) {
            let side = capture.get(1).map(|m| m.as_str().to_lowercase());
            let term = capture[2].to_lowercase();
            let name = capture.get(3).map(|m| m.as_str());

            match KinRole::from_terms(side.as_deref(), &term) {
                Some((role, sex)) => {
                    let id = self.materialize(role, sex, name, sweep);
                    subjects.push(id);
                }
                None => {
                    // aunt, uncle, cousin and unsided grandparents have no
                    // typed edge to hang off; keep a person and a note
                    let id = self.unplaced(&term, name, sweep);
                    subjects.push(id);
                    sweep.record.provenance.notes.push(format!(
                        "unplaced kin term: {}",
                        term
                    ));
                    sweep.report.messages.push(ValidationMessage::warning(
                        None,
                        format!("'my {}' could not be placed in the family structure", term),
                    ));
                }
            }
        }

        if subjects.is_empty() && self.first_person_re.is_match(sentence) {
            subjects.push(self.proband(sweep));
        }

        for capture in self.condition_re.captures_iter(sentence) {
            let Some(condition) = trim_condition(&capture[1]) else {
                continue;
            };
            if subjects.is_empty() {
                sweep.report.messages.push(ValidationMessage::warning(
                    None,
                    format!(
                        "condition '{}' mentioned without an identifiable family member",
                        condition
                    ),
                ));
                continue;
            }
            for &subject in &subjects {
                self.mark_affected(subject, &condition, sweep);
            }
        }

        if self.deceased_re.is_match(sentence) {
            for &subject in &subjects {
                self.set_field(subject, sweep, "vital_status", |person| {
                    person.vital_status = VitalStatus::Deceased;
                });
            }
        }

        for capture in self.partner_re.captures_iter(sentence) {
            let a = self.named(&capture[1], sweep);
            let b = self.named(&capture[2], sweep);
            if a != b {
                self.push_relationship(
                    Relationship::partner_of(a, b)
                        .with_confidence(RULE_CONFIDENCE)
                        .with_origin(SourceMethod::FallbackRules),
                    sweep,
                );
            }
        }
    }

    /// The history giver. Created on the first first-person or kin
    /// reference; everything "my X" hangs off this individual.
    fn proband(&self, sweep: &mut Sweep) -> IndividualId {
        if let Some(id) = sweep.proband {
            return id;
        }
        let id = self.fresh(sweep);
        let mut person = Individual::new(id);
        person.proband = true;
        sweep.record.individuals.push(person);
        sweep.proband = Some(id);
        sweep
            .report
            .push_confidence(format!("individual.{}.proband", id.0), RULE_CONFIDENCE, SourceMethod::FallbackRules);
        id
    }

    fn materialize(
        &self,
        role: KinRole,
        sex: Sex,
        name: Option<&str>,
        sweep: &mut Sweep,
    ) -> IndividualId {
        if let Some(&id) = sweep.by_role.get(&role) {
            if let Some(name) = name {
                self.assign_name(id, name, sweep);
            }
            return id;
        }

        let proband = self.proband(sweep);
        let id = self.fresh(sweep);
        let mut person = Individual::new(id);
        person.sex_at_birth = sex;
        sweep.record.individuals.push(person);
        sweep.by_role.insert(role, id);
        sweep.report.push_confidence(
            format!("individual.{}.sex_at_birth", id.0),
            RULE_CONFIDENCE,
            SourceMethod::FallbackRules,
        );
        if let Some(name) = name {
            self.assign_name(id, name, sweep);
        }

        match role {
            KinRole::Mother | KinRole::Father => {
                self.push_relationship(
                    Relationship::parent_of(id, proband)
                        .with_confidence(RULE_CONFIDENCE)
                        .with_origin(SourceMethod::FallbackRules),
                    sweep,
                );
            }
            KinRole::Daughter | KinRole::Son => {
                self.push_relationship(
                    Relationship::parent_of(proband, id)
                        .with_confidence(RULE_CONFIDENCE)
                        .with_origin(SourceMethod::FallbackRules),
                    sweep,
                );
            }
            KinRole::MaternalGrandmother | KinRole::MaternalGrandfather => {
                let mother = self.materialize(KinRole::Mother, Sex::Female, None, sweep);
                self.push_relationship(
                    Relationship::parent_of(id, mother)
                        .with_confidence(RULE_CONFIDENCE)
                        .with_origin(SourceMethod::FallbackRules),
                    sweep,
                );
            }
            KinRole::PaternalGrandmother | KinRole::PaternalGrandfather => {
                let father = self.materialize(KinRole::Father, Sex::Male, None, sweep);
                self.push_relationship(
                    Relationship::parent_of(id, father)
                        .with_confidence(RULE_CONFIDENCE)
                        .with_origin(SourceMethod::FallbackRules),
                    sweep,
                );
            }
            KinRole::Spouse => {
                self.push_relationship(
                    Relationship::partner_of(proband, id)
                        .with_confidence(RULE_CONFIDENCE)
                        .with_origin(SourceMethod::FallbackRules),
                    sweep,
                );
            }
            KinRole::Sister | KinRole::Brother => {
                // parent links attached in link_siblings once the sweep
                // has seen the whole transcript
            }
        }

        id
    }

    fn unplaced(&self, term: &str, name: Option<&str>, sweep: &mut Sweep) -> IndividualId {
        // "my aunt" still implies a history giver
        self.proband(sweep);
        let sex = match term {
            "aunt" | "grandmother" => Sex::Female,
            "uncle" | "grandfather" => Sex::Male,
            _ => Sex::Unknown,
        };
        let id = self.fresh(sweep);
        let mut person = Individual::new(id);
        person.sex_at_birth = sex;
        sweep.record.individuals.push(person);
        if let Some(name) = name {
            self.assign_name(id, name, sweep);
        }
        id
    }

    fn named(&self, name: &str, sweep: &mut Sweep) -> IndividualId {
        let key = name.to_lowercase();
        if let Some(&id) = sweep.by_name.get(&key) {
            return id;
        }
        let id = self.fresh(sweep);
        sweep.record.individuals.push(Individual::new(id));
        self.assign_name(id, name, sweep);
        id
    }

    fn assign_name(&self, id: IndividualId, name: &str, sweep: &mut Sweep) {
        sweep.by_name.insert(name.to_lowercase(), id);
        self.set_field(id, sweep, "name", |person| {
            person.name = Some(name.to_string());
        });
    }

    fn mark_affected(&self, id: IndividualId, condition: &str, sweep: &mut Sweep) {
        let condition = ConditionId::new(condition);
        if condition.is_empty() {
            return;
        }
        let key = format!("individual.{}.condition.{}", id.0, condition);
        if let Some(person) = sweep.record.individuals.iter_mut().find(|i| i.id == id) {
            person
                .conditions
                .insert(condition, AffectedStatus::Affected);
            sweep
                .report
                .push_confidence(key, RULE_CONFIDENCE, SourceMethod::FallbackRules);
        }
    }

    fn set_field<F>(&self, id: IndividualId, sweep: &mut Sweep, field: &str, apply: F)
    where
        F: FnOnce(&mut Individual),
    {
        if let Some(person) = sweep.record.individuals.iter_mut().find(|i| i.id == id) {
            apply(person);
            sweep.report.push_confidence(
                format!("individual.{}.{}", id.0, field),
                RULE_CONFIDENCE,
                SourceMethod::FallbackRules,
            );
        }
    }

    fn push_relationship(&self, relationship: Relationship, sweep: &mut Sweep) {
        let duplicate = sweep.record.relationships.iter().any(|existing| {
            existing.kind == relationship.kind
                && existing.from == relationship.from
                && existing.to == relationship.to
        });
        if duplicate {
            return;
        }
        sweep.report.push_confidence(
            relationship_key(&relationship),
            RULE_CONFIDENCE,
            SourceMethod::FallbackRules,
        );
        sweep.record.relationships.push(relationship);
    }

    /// Siblings share whichever of the proband's parents the transcript
    /// mentioned. With no recorded parent they stay structurally loose.
    fn link_siblings(&self, sweep: &mut Sweep) {
        let parents: Vec<IndividualId> = [KinRole::Mother, KinRole::Father]
            .iter()
            .filter_map(|role| sweep.by_role.get(role).copied())
            .collect();
        let siblings: Vec<IndividualId> = [KinRole::Sister, KinRole::Brother]
            .iter()
            .filter_map(|role| sweep.by_role.get(role).copied())
            .collect();

        for &sibling in &siblings {
            if parents.is_empty() {
                sweep.record.provenance.notes.push(format!(
                    "sibling {} reported with no recorded shared parent",
                    sibling
                ));
                continue;
            }
            for &parent in &parents {
                self.push_relationship(
                    Relationship::parent_of(parent, sibling)
                        .with_confidence(RULE_CONFIDENCE)
                        .with_origin(SourceMethod::FallbackRules),
                    sweep,
                );
            }
        }
    }

    fn fresh(&self, sweep: &mut Sweep) -> IndividualId {
        let id = IndividualId(sweep.next);
        sweep.next += 1;
        id
    }
}

pub fn relationship_key(relationship: &Relationship) -> String {
    let kind = match relationship.kind {
        crate::schema::record::RelationshipKind::ParentOf => "parent_of",
        crate::schema::record::RelationshipKind::PartnerOf => "partner_of",
    };
    format!(
        "relationship.{}.{}.{}",
        kind, relationship.from.0, relationship.to.0
    )
}

fn split_sentences(text: &str) -> Vec<String> {
    text.split(|c| matches!(c, '.' | '!' | '?' | ';' | '\n'))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Cut a captured condition phrase down to the clinical noun phrase, or
/// reject it when the capture is really a kin or counting phrase.
fn trim_condition(raw: &str) -> Option<String> {
    let mut phrase = raw.trim();
    for stop in [
        " since", " for ", " when", " at ", " in ", " last", " which", " that", " too",
        " as well",
    ] {
        if let Some(index) = phrase.find(stop) {
            phrase = phrase[..index].trim();
        }
    }
    let lowered = phrase.to_lowercase();
    const NOT_CONDITIONS: &[&str] = &[
        "mother", "father", "sister", "brother", "son", "daughter", "children", "kids",
        "one", "two", "three", "four", "five", "no", "none",
    ];
    if phrase.len() < 3
        || NOT_CONDITIONS
            .iter()
            .any(|word| lowered.split_whitespace().any(|token| token == *word))
    {
        return None;
    }
    Some(phrase.to_string())
}
