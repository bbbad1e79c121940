//! Reconciliation of two independently produced candidate records. Kept
//! as an explicit merge step so both extraction paths stay testable on
//! their own. Agreement raises confidence, disagreement keeps the
//! higher-confidence value and preserves the loser for human review.

use crate::extract::fallback::relationship_key;
use crate::schema::record::{
    Individual, IndividualId, PedigreeRecord, Relationship, RelationshipKind, Sex, SourceMethod,
    VitalStatus,
};
use crate::types::{ExtractionReport, FieldDispute, ValidationMessage};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// One extraction path's output: the draft record, its report, and the
/// confidence assumed for fields the report does not score explicitly.
pub struct CandidateDraft {
    pub record: PedigreeRecord,
    pub report: ExtractionReport,
    pub baseline: f64,
}

/// Independence of the two paths ends here. `primary` is the richer draft
/// (assisted or structured); its ids survive into the merged record.
pub fn reconcile(primary: CandidateDraft, secondary: CandidateDraft) -> CandidateDraft {
    let CandidateDraft {
        record: mut merged,
        report: primary_report,
        baseline,
    } = primary;
    let CandidateDraft {
        record: secondary_record,
        report: secondary_report,
        baseline: secondary_baseline,
    } = secondary;

    let mut mapping = match_individuals(&merged, &secondary_record);

    let primary_scores = score_map(&primary_report);
    let secondary_scores = score_map(&secondary_report);
    let mut report = primary_report;
    report.messages.extend(secondary_report.messages);

    let mut ctx = MergeContext {
        report: &mut report,
        primary_scores: &primary_scores,
        secondary_scores: &secondary_scores,
        primary_baseline: baseline,
        secondary_baseline,
    };

    // individuals: merge matched pairs, append the rest with fresh ids
    let mut next_id = merged.next_id().0;
    for their_person in &secondary_record.individuals {
        match mapping.get(&their_person.id).copied() {
            Some(ours) => {
                if let Some(position) = merged.individuals.iter().position(|i| i.id == ours) {
                    let mut our_person = merged.individuals[position].clone();
                    ctx.merge_pair(&mut our_person, their_person);
                    merged.individuals[position] = our_person;
                }
            }
            None => {
                let fresh = IndividualId(next_id);
                next_id += 1;
                let mut appended = their_person.clone();
                appended.id = fresh;
                ctx.adopt_scores(their_person.id, fresh);
                merged.individuals.push(appended);
                mapping.insert(their_person.id, fresh);
            }
        }
    }

    merge_relationships(&mut merged, &secondary_record, &mapping, &mut ctx);
    demote_extra_probands(&mut merged, &mut report);
    merged
        .provenance
        .notes
        .extend(secondary_record.provenance.notes);

    debug!(
        individuals = merged.individuals.len(),
        disputes = report.disputes.len(),
        "reconciliation complete"
    );

    CandidateDraft {
        record: merged,
        report,
        baseline,
    }
}

struct MergeContext<'a> {
    report: &'a mut ExtractionReport,
    primary_scores: &'a HashMap<String, f64>,
    secondary_scores: &'a HashMap<String, f64>,
    primary_baseline: f64,
    secondary_baseline: f64,
}

impl MergeContext<'_> {
    fn merge_pair(&mut self, ours: &mut Individual, theirs: &Individual) {
        let our_id = ours.id;
        let their_id = theirs.id;

        // name
        match (&ours.name, &theirs.name) {
            (Some(a), Some(b)) => {
                if a.trim().eq_ignore_ascii_case(b.trim()) {
                    self.boost(our_id, their_id, "name");
                } else {
                    let keep_theirs = self.resolve(
                        our_id,
                        their_id,
                        "name",
                        a.clone(),
                        b.clone(),
                    );
                    if keep_theirs {
                        ours.name = Some(b.clone());
                    }
                }
            }
            (None, Some(b)) => {
                ours.name = Some(b.clone());
                self.adopt(our_id, their_id, "name");
            }
            _ => {}
        }

        // sex at birth
        match (ours.sex_at_birth, theirs.sex_at_birth) {
            (a, b) if a != Sex::Unknown && b != Sex::Unknown && a == b => {
                self.boost(our_id, their_id, "sex_at_birth");
            }
            (a, b) if a != Sex::Unknown && b != Sex::Unknown => {
                let keep_theirs = self.resolve(
                    our_id,
                    their_id,
                    "sex_at_birth",
                    enum_label(&a),
                    enum_label(&b),
                );
                if keep_theirs {
                    ours.sex_at_birth = b;
                }
            }
            (Sex::Unknown, b) if b != Sex::Unknown => {
                ours.sex_at_birth = b;
                self.adopt(our_id, their_id, "sex_at_birth");
            }
            _ => {}
        }

        // vital status
        match (ours.vital_status, theirs.vital_status) {
            (a, b) if a != VitalStatus::Unknown && b != VitalStatus::Unknown && a == b => {
                self.boost(our_id, their_id, "vital_status");
            }
            (a, b) if a != VitalStatus::Unknown && b != VitalStatus::Unknown => {
                let keep_theirs = self.resolve(
                    our_id,
                    their_id,
                    "vital_status",
                    enum_label(&a),
                    enum_label(&b),
                );
                if keep_theirs {
                    ours.vital_status = b;
                }
            }
            (VitalStatus::Unknown, b) if b != VitalStatus::Unknown => {
                ours.vital_status = b;
                self.adopt(our_id, their_id, "vital_status");
            }
            _ => {}
        }

        // date of birth
        match (ours.date_of_birth, theirs.date_of_birth) {
            (Some(a), Some(b)) if a == b => self.boost(our_id, their_id, "date_of_birth"),
            (Some(a), Some(b)) => {
                let keep_theirs = self.resolve(
                    our_id,
                    their_id,
                    "date_of_birth",
                    a.to_string(),
                    b.to_string(),
                );
                if keep_theirs {
                    ours.date_of_birth = Some(b);
                }
            }
            (None, Some(b)) => {
                ours.date_of_birth = Some(b);
                self.adopt(our_id, their_id, "date_of_birth");
            }
            _ => {}
        }

        if ours.twin_group.is_none() {
            ours.twin_group = theirs.twin_group;
        }
        ours.proband = ours.proband || theirs.proband;

        // conditions
        for (condition, their_status) in &theirs.conditions {
            let field = format!("condition.{}", condition);
            match ours.conditions.get(condition).copied() {
                None => {
                    ours.conditions.insert(condition.clone(), *their_status);
                    self.adopt(our_id, their_id, &field);
                }
                Some(our_status) if our_status == *their_status => {
                    self.boost(our_id, their_id, &field);
                }
                Some(our_status) => {
                    let keep_theirs = self.resolve(
                        our_id,
                        their_id,
                        &field,
                        enum_label(&our_status),
                        enum_label(their_status),
                    );
                    if keep_theirs {
                        ours.conditions.insert(condition.clone(), *their_status);
                    }
                }
            }
        }
    }

    /// Both paths agree on this field; combine their confidences so the
    /// merged score exceeds either alone.
    fn boost(&mut self, our_id: IndividualId, their_id: IndividualId, field: &str) {
        let key = individual_key(our_id, field);
        let ours = self.primary_score(&key);
        let theirs = self.secondary_score(&individual_key(their_id, field));
        let method = self.report.method;
        set_score(self.report, &key, noisy_or(ours, theirs), method);
    }

    /// The secondary path filled a gap; its score comes along.
    fn adopt(&mut self, our_id: IndividualId, their_id: IndividualId, field: &str) {
        let key = individual_key(our_id, field);
        let theirs = self.secondary_score(&individual_key(their_id, field));
        set_score(self.report, &key, theirs, SourceMethod::FallbackRules);
    }

    /// Disagreement. Keeps the higher-confidence value and files the loser
    /// as a dispute. Returns true when the secondary value wins.
    fn resolve(
        &mut self,
        our_id: IndividualId,
        their_id: IndividualId,
        field: &str,
        our_value: String,
        their_value: String,
    ) -> bool {
        let key = individual_key(our_id, field);
        let our_score = self.primary_score(&key);
        let their_score = self.secondary_score(&individual_key(their_id, field));
        let theirs_win = their_score > our_score;

        let (kept, kept_origin, kept_score, discarded, discarded_origin, discarded_score) =
            if theirs_win {
                (
                    their_value,
                    SourceMethod::FallbackRules,
                    their_score,
                    our_value,
                    self.report.method,
                    our_score,
                )
            } else {
                (
                    our_value,
                    self.report.method,
                    our_score,
                    their_value,
                    SourceMethod::FallbackRules,
                    their_score,
                )
            };

        self.report.messages.push(ValidationMessage::warning(
            Some(&key),
            format!(
                "extraction paths disagree on {}: kept '{}', flagged '{}' for review",
                key, kept, discarded
            ),
        ));
        self.report.disputes.push(FieldDispute {
            field: key.clone(),
            kept,
            kept_origin,
            kept_score,
            discarded,
            discarded_origin,
            discarded_score,
        });
        set_score(self.report, &key, kept_score, kept_origin);
        theirs_win
    }

    /// Rewrite an appended individual's score entries onto its fresh id.
    fn adopt_scores(&mut self, their_id: IndividualId, fresh: IndividualId) {
        let prefix = format!("individual.{}.", their_id.0);
        let entries: Vec<(String, f64)> = self
            .secondary_scores
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, score)| {
                (
                    format!("individual.{}.{}", fresh.0, &key[prefix.len()..]),
                    *score,
                )
            })
            .collect();
        if entries.is_empty() {
            set_score(
                self.report,
                &individual_key(fresh, "present"),
                self.secondary_baseline,
                SourceMethod::FallbackRules,
            );
        }
        for (key, score) in entries {
            set_score(self.report, &key, score, SourceMethod::FallbackRules);
        }
    }

    fn primary_score(&self, key: &str) -> f64 {
        self.primary_scores
            .get(key)
            .copied()
            .unwrap_or(self.primary_baseline)
    }

    fn secondary_score(&self, key: &str) -> f64 {
        self.secondary_scores
            .get(key)
            .copied()
            .unwrap_or(self.secondary_baseline)
    }
}

/// Pair up individuals across the two drafts: probands first, then equal
/// names, then the proband's parents by sex, then unnamed individuals with
/// an identical structural signature.
fn match_individuals(
    primary: &PedigreeRecord,
    secondary: &PedigreeRecord,
) -> HashMap<IndividualId, IndividualId> {
    let mut mapping: HashMap<IndividualId, IndividualId> = HashMap::new();
    let mut taken: HashSet<IndividualId> = HashSet::new();

    // probands pair up unless both carry different names, in which case
    // name matching decides and the merged record sorts out the flag
    if let (Some(ours), Some(theirs)) = (primary.proband(), secondary.proband()) {
        if names_compatible(&ours.name, &theirs.name) {
            mapping.insert(theirs.id, ours.id);
            taken.insert(ours.id);
        }
    }

    let by_name: HashMap<String, IndividualId> = primary
        .individuals
        .iter()
        .filter_map(|i| {
            i.name
                .as_ref()
                .map(|name| (name.trim().to_lowercase(), i.id))
        })
        .collect();
    for theirs in &secondary.individuals {
        if mapping.contains_key(&theirs.id) {
            continue;
        }
        let Some(name) = &theirs.name else { continue };
        if let Some(&ours) = by_name.get(&name.trim().to_lowercase()) {
            if taken.insert(ours) {
                mapping.insert(theirs.id, ours);
            }
        }
    }

    match_proband_parents(primary, secondary, &mut mapping, &mut taken);
    match_by_signature(primary, secondary, &mut mapping, &mut taken);

    mapping
}

fn match_proband_parents(
    primary: &PedigreeRecord,
    secondary: &PedigreeRecord,
    mapping: &mut HashMap<IndividualId, IndividualId>,
    taken: &mut HashSet<IndividualId>,
) {
    let (Some(our_proband), Some(their_proband)) = (primary.proband(), secondary.proband())
    else {
        return;
    };

    for sex in [Sex::Female, Sex::Male] {
        let ours: Vec<IndividualId> = biological_parents(primary, our_proband.id)
            .into_iter()
            .filter(|&id| {
                !taken.contains(&id)
                    && primary.individual(id).map(|i| i.sex_at_birth) == Some(sex)
            })
            .collect();
        let theirs: Vec<IndividualId> = biological_parents(secondary, their_proband.id)
            .into_iter()
            .filter(|&id| {
                !mapping.contains_key(&id)
                    && secondary.individual(id).map(|i| i.sex_at_birth) == Some(sex)
            })
            .collect();
        if let ([ours], [theirs]) = (ours.as_slice(), theirs.as_slice()) {
            mapping.insert(*theirs, *ours);
            taken.insert(*ours);
        }
    }
}

fn match_by_signature(
    primary: &PedigreeRecord,
    secondary: &PedigreeRecord,
    mapping: &mut HashMap<IndividualId, IndividualId>,
    taken: &mut HashSet<IndividualId>,
) {
    let mut available: HashMap<(Sex, Vec<IndividualId>), Vec<IndividualId>> = HashMap::new();
    for ours in &primary.individuals {
        if taken.contains(&ours.id) || ours.name.is_some() {
            continue;
        }
        let mut parents = biological_parents(primary, ours.id);
        parents.sort();
        available
            .entry((ours.sex_at_birth, parents))
            .or_default()
            .push(ours.id);
    }

    for theirs in &secondary.individuals {
        if mapping.contains_key(&theirs.id) || theirs.name.is_some() {
            continue;
        }
        let mut parents = Vec::new();
        let mut placeable = true;
        for parent in biological_parents(secondary, theirs.id) {
            match mapping.get(&parent) {
                Some(&mapped) => parents.push(mapped),
                None => {
                    placeable = false;
                    break;
                }
            }
        }
        if !placeable {
            continue;
        }
        parents.sort();
        if let Some(bucket) = available.get_mut(&(theirs.sex_at_birth, parents)) {
            if !bucket.is_empty() {
                let ours = bucket.remove(0);
                mapping.insert(theirs.id, ours);
                taken.insert(ours);
            }
        }
    }
}

fn merge_relationships(
    merged: &mut PedigreeRecord,
    secondary: &PedigreeRecord,
    mapping: &HashMap<IndividualId, IndividualId>,
    ctx: &mut MergeContext<'_>,
) {
    let mut index: HashMap<(RelationshipKind, IndividualId, IndividualId), usize> = merged
        .relationships
        .iter()
        .enumerate()
        .map(|(position, rel)| ((rel.kind, rel.from, rel.to), position))
        .collect();

    for rel in &secondary.relationships {
        let (Some(&from), Some(&to)) = (mapping.get(&rel.from), mapping.get(&rel.to)) else {
            continue;
        };
        let (from, to) = match rel.kind {
            RelationshipKind::PartnerOf if to < from => (to, from),
            _ => (from, to),
        };

        match index.get(&(rel.kind, from, to)).copied() {
            Some(position) => {
                let edge = &mut merged.relationships[position];
                edge.confidence = noisy_or(edge.confidence, rel.confidence);
                let key = relationship_key(edge);
                let combined = edge.confidence;
                let origin = edge.origin;
                set_score(ctx.report, &key, combined, origin);
            }
            None => {
                let mut mapped = rel.clone();
                mapped.from = from;
                mapped.to = to;
                let key = relationship_key(&mapped);
                set_score(
                    ctx.report,
                    &key,
                    mapped.confidence,
                    SourceMethod::FallbackRules,
                );
                index.insert((mapped.kind, from, to), merged.relationships.len());
                merged.relationships.push(mapped);
            }
        }
    }
}

/// Each record carries at most one proband; the first one in the merged
/// order wins and the rest are demoted with a warning.
fn demote_extra_probands(merged: &mut PedigreeRecord, report: &mut ExtractionReport) {
    let mut seen = false;
    let mut demoted = Vec::new();
    for individual in &mut merged.individuals {
        if individual.proband {
            if seen {
                individual.proband = false;
                demoted.push(individual.id);
            }
            seen = true;
        }
    }
    if !demoted.is_empty() {
        let names: Vec<String> = demoted.iter().map(|id| id.to_string()).collect();
        report.messages.push(ValidationMessage::warning(
            None,
            format!(
                "conflicting proband designations; demoted {}",
                names.join(", ")
            ),
        ));
    }
}

fn names_compatible(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        _ => true,
    }
}

fn biological_parents(record: &PedigreeRecord, id: IndividualId) -> Vec<IndividualId> {
    record
        .relationships
        .iter()
        .filter(|rel| rel.kind == RelationshipKind::ParentOf && rel.biological && rel.to == id)
        .map(|rel| rel.from)
        .collect()
}

fn score_map(report: &ExtractionReport) -> HashMap<String, f64> {
    report
        .field_confidences
        .iter()
        .map(|f| (f.field.clone(), f.score))
        .collect()
}

fn set_score(report: &mut ExtractionReport, key: &str, score: f64, origin: SourceMethod) {
    if let Some(entry) = report
        .field_confidences
        .iter_mut()
        .find(|f| f.field == key)
    {
        entry.score = score.clamp(0.0, 1.0);
    } else {
        report.push_confidence(key, score, origin);
    }
}

fn individual_key(id: IndividualId, field: &str) -> String {
    format!("individual.{}.{}", id.0, field)
}

fn enum_label<T: std::fmt::Debug>(value: &T) -> String {
    format!("{:?}", value).to_lowercase()
}

/// Two independent observations agreeing: combined belief is the
/// complement of both being wrong at once.
fn noisy_or(a: f64, b: f64) -> f64 {
    (1.0 - (1.0 - a) * (1.0 - b)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::record::{AffectedStatus, ConditionId, SourceKind};

    fn draft(method: SourceMethod, baseline: f64) -> CandidateDraft {
        CandidateDraft {
            record: PedigreeRecord::empty(SourceKind::Conversation, method),
            report: ExtractionReport::new(SourceKind::Conversation, method),
            baseline,
        }
    }

    fn person(id: u64, name: Option<&str>, sex: Sex) -> Individual {
        let mut individual = Individual::new(IndividualId(id));
        individual.name = name.map(String::from);
        individual.sex_at_birth = sex;
        individual
    }

    fn assisted_and_fallback() -> (CandidateDraft, CandidateDraft) {
        let mut primary = draft(SourceMethod::ModelAssisted, 0.4);
        let mut alice = person(1, Some("Alice"), Sex::Female);
        alice
            .conditions
            .insert(ConditionId::new("breast cancer"), AffectedStatus::Affected);
        primary.record.individuals.push(alice);

        let mut secondary = draft(SourceMethod::FallbackRules, 0.3);
        let mut alice_again = person(7, Some("alice"), Sex::Female);
        alice_again
            .conditions
            .insert(ConditionId::new("breast cancer"), AffectedStatus::Affected);
        secondary.record.individuals.push(alice_again);

        (primary, secondary)
    }

    #[test]
    fn test_agreement_boosts_confidence() {
        let (primary, secondary) = assisted_and_fallback();
        let merged = reconcile(primary, secondary);

        assert_eq!(merged.record.individuals.len(), 1);
        assert!(merged.report.disputes.is_empty());

        let score = merged
            .report
            .field_confidences
            .iter()
            .find(|f| f.field == "individual.1.condition.breast cancer")
            .map(|f| f.score)
            .unwrap();
        let expected = 1.0 - (1.0 - 0.4) * (1.0 - 0.3);
        assert!((score - expected).abs() < 1e-9);
        assert!(score > 0.4);
    }

    #[test]
    fn test_disagreement_keeps_higher_and_files_dispute() {
        let mut primary = draft(SourceMethod::ModelAssisted, 0.4);
        primary
            .record
            .individuals
            .push(person(1, Some("Robin"), Sex::Female));

        let mut secondary = draft(SourceMethod::FallbackRules, 0.3);
        secondary
            .record
            .individuals
            .push(person(3, Some("Robin"), Sex::Male));

        let merged = reconcile(primary, secondary);
        let robin = &merged.record.individuals[0];
        assert_eq!(robin.sex_at_birth, Sex::Female);

        assert_eq!(merged.report.disputes.len(), 1);
        let dispute = &merged.report.disputes[0];
        assert_eq!(dispute.kept, "female");
        assert_eq!(dispute.discarded, "male");
        assert!(merged
            .report
            .messages
            .iter()
            .any(|m| m.message.contains("disagree")));
    }

    #[test]
    fn test_fallback_only_individual_appended_with_fresh_id() {
        let (primary, mut secondary) = assisted_and_fallback();
        secondary
            .record
            .individuals
            .push(person(8, Some("Miriam"), Sex::Female));

        let merged = reconcile(primary, secondary);
        assert_eq!(merged.record.individuals.len(), 2);

        let miriam = merged
            .record
            .individuals
            .iter()
            .find(|i| i.name.as_deref() == Some("Miriam"))
            .unwrap();
        assert_ne!(miriam.id, IndividualId(8));
        assert!(merged
            .record
            .individuals
            .iter()
            .all(|i| i.id != IndividualId(8) || i.name.as_deref() == Some("Alice")));
    }

    #[test]
    fn test_relationships_map_and_boost() {
        let mut primary = draft(SourceMethod::ModelAssisted, 0.4);
        primary.record.individuals.push(person(1, Some("Mona"), Sex::Female));
        primary.record.individuals.push(person(2, Some("Kit"), Sex::Unknown));
        primary.record.relationships.push(
            Relationship::parent_of(IndividualId(1), IndividualId(2))
                .with_confidence(0.4)
                .with_origin(SourceMethod::ModelAssisted),
        );

        let mut secondary = draft(SourceMethod::FallbackRules, 0.3);
        secondary.record.individuals.push(person(5, Some("Kit"), Sex::Unknown));
        secondary.record.individuals.push(person(6, Some("Mona"), Sex::Female));
        secondary.record.relationships.push(
            Relationship::parent_of(IndividualId(6), IndividualId(5))
                .with_confidence(0.3)
                .with_origin(SourceMethod::FallbackRules),
        );
        secondary.record.relationships.push(
            Relationship::partner_of(IndividualId(5), IndividualId(6))
                .with_confidence(0.3)
                .with_origin(SourceMethod::FallbackRules),
        );

        let merged = reconcile(primary, secondary);
        assert_eq!(merged.record.relationships.len(), 2);

        let parent_edge = merged
            .record
            .relationships
            .iter()
            .find(|r| r.kind == RelationshipKind::ParentOf)
            .unwrap();
        let expected = 1.0 - (1.0 - 0.4) * (1.0 - 0.3);
        assert!((parent_edge.confidence - expected).abs() < 1e-9);

        // the fallback-only partner edge arrives mapped onto primary ids
        let partner_edge = merged
            .record
            .relationships
            .iter()
            .find(|r| r.kind == RelationshipKind::PartnerOf)
            .unwrap();
        assert_eq!(partner_edge.from, IndividualId(1));
        assert_eq!(partner_edge.to, IndividualId(2));
        assert!((partner_edge.confidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_unnamed_parents_match_by_sex() {
        let mut primary = draft(SourceMethod::ModelAssisted, 0.4);
        let mut proband = person(1, Some("Dana"), Sex::Unknown);
        proband.proband = true;
        primary.record.individuals.push(proband);
        primary.record.individuals.push(person(2, None, Sex::Female));
        primary
            .record
            .relationships
            .push(Relationship::parent_of(IndividualId(2), IndividualId(1)));

        let mut secondary = draft(SourceMethod::FallbackRules, 0.3);
        let mut their_proband = person(1, None, Sex::Unknown);
        their_proband.proband = true;
        secondary.record.individuals.push(their_proband);
        let mut mother = person(2, None, Sex::Female);
        mother
            .conditions
            .insert(ConditionId::new("glaucoma"), AffectedStatus::Affected);
        secondary.record.individuals.push(mother);
        secondary
            .record
            .relationships
            .push(Relationship::parent_of(IndividualId(2), IndividualId(1)));

        let merged = reconcile(primary, secondary);
        assert_eq!(merged.record.individuals.len(), 2);

        // the fallback mother's condition landed on the assisted mother
        let mother = merged
            .record
            .individuals
            .iter()
            .find(|i| i.sex_at_birth == Sex::Female)
            .unwrap();
        assert!(mother.is_affected(&ConditionId::new("glaucoma")));
    }

    #[test]
    fn test_extra_probands_are_demoted() {
        let mut primary = draft(SourceMethod::ModelAssisted, 0.4);
        let mut first = person(1, Some("Ira"), Sex::Male);
        first.proband = true;
        primary.record.individuals.push(first);
        primary.record.individuals.push(person(2, Some("Joss"), Sex::Female));

        // the fallback path thought Joss was giving the history
        let mut secondary = draft(SourceMethod::FallbackRules, 0.3);
        let mut other = person(4, Some("Joss"), Sex::Female);
        other.proband = true;
        secondary.record.individuals.push(other);

        let merged = reconcile(primary, secondary);
        let probands: Vec<_> = merged
            .record
            .individuals
            .iter()
            .filter(|i| i.proband)
            .collect();
        assert_eq!(probands.len(), 1);
        assert_eq!(probands[0].name.as_deref(), Some("Ira"));
        assert!(merged
            .report
            .messages
            .iter()
            .any(|m| m.message.contains("proband")));
    }
}
