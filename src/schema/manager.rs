//! Normalization front door: raw JSON payload in, validated current-version
//! record out. Version detection and the migration chain live in
//! [`crate::schema::migrate`]; this module gates, deserializes and
//! validates.

use crate::error::SchemaError;
use crate::schema::migrate;
use crate::schema::record::{IndividualId, PedigreeRecord, RelationshipKind};
use crate::types::ValidationMessage;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

/// Normalize a raw payload to the current schema version and validate it.
/// Unknown future versions and unmappable legacy fields are typed errors;
/// content-level problems come back as validation messages on an intact
/// record.
#[instrument(skip(raw))]
pub fn normalize(raw: &Value) -> Result<(PedigreeRecord, Vec<ValidationMessage>), SchemaError> {
    let migrated = migrate::migrate_to_current(raw.clone())?;
    let record: PedigreeRecord = serde_json::from_value(migrated)?;
    let messages = validate_record(&record);
    debug!(
        individuals = record.individuals.len(),
        relationships = record.relationships.len(),
        messages = messages.len(),
        "normalized payload"
    );
    Ok((record, messages))
}

/// Content-level validation. Never fails; every problem becomes a message
/// so callers see the complete list in one pass.
pub fn validate_record(record: &PedigreeRecord) -> Vec<ValidationMessage> {
    let mut messages = Vec::new();

    if record.individuals.is_empty() {
        messages.push(ValidationMessage::warning(
            None,
            "record contains no individuals",
        ));
    }

    let mut seen: HashSet<IndividualId> = HashSet::new();
    for individual in &record.individuals {
        if !seen.insert(individual.id) {
            messages.push(ValidationMessage::error(
                Some(&format!("individuals.{}", individual.id)),
                format!("duplicate individual id {}", individual.id),
            ));
        }
    }

    let probands: Vec<IndividualId> = record
        .individuals
        .iter()
        .filter(|i| i.proband)
        .map(|i| i.id)
        .collect();
    if probands.len() > 1 {
        messages.push(ValidationMessage::error(
            Some("individuals"),
            format!(
                "more than one proband: {}",
                probands
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ));
    }

    for (index, rel) in record.relationships.iter().enumerate() {
        let field = format!("relationships[{}]", index);
        if rel.from == rel.to {
            messages.push(ValidationMessage::error(
                Some(&field),
                format!("{} cannot be related to themselves", rel.from),
            ));
        }
        for endpoint in [rel.from, rel.to] {
            if record.individual(endpoint).is_none() {
                messages.push(ValidationMessage::error(
                    Some(&field),
                    format!("references missing individual {}", endpoint),
                ));
            }
        }
        if !(0.0..=1.0).contains(&rel.confidence) {
            messages.push(ValidationMessage::error(
                Some(&field),
                format!("confidence {} outside [0, 1]", rel.confidence),
            ));
        }
        if rel.kind == RelationshipKind::PartnerOf && rel.from > rel.to {
            messages.push(ValidationMessage::warning(
                Some(&field),
                "partner edge not in canonical order",
            ));
        }
    }

    let mut twin_groups: HashMap<u32, usize> = HashMap::new();
    for individual in &record.individuals {
        if let Some(group) = individual.twin_group {
            *twin_groups.entry(group).or_insert(0) += 1;
        }
    }
    for (group, members) in twin_groups {
        if members < 2 {
            messages.push(ValidationMessage::warning(
                Some("individuals"),
                format!("twin group {} has a single member", group),
            ));
        }
    }

    for individual in &record.individuals {
        if let Some(dob) = individual.date_of_birth {
            if dob > chrono::Utc::now().date_naive() {
                messages.push(ValidationMessage::warning(
                    Some(&format!("individuals.{}.date_of_birth", individual.id)),
                    format!("{} has a birth date in the future", individual.display_label()),
                ));
            }
        }
    }

    messages
}
