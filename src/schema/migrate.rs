//! Pure schema migration steps. Each step maps one version to the next and
//! either succeeds completely or fails with the offending field; callers
//! never see a partially-migrated payload.

use crate::error::SchemaError;
use crate::schema::record::CURRENT_SCHEMA_VERSION;
use serde_json::{json, Map, Value};

/// Determine the schema version of a raw payload. Payloads without an
/// explicit `schema_version` are accepted only in the legacy v1 shape
/// (`people` + `relationships`).
pub fn detect_version(raw: &Value) -> Result<u32, SchemaError> {
    if let Some(version) = raw.get("schema_version") {
        let version = version.as_u64().ok_or_else(|| SchemaError::Invalid {
            field: "schema_version".to_string(),
            reason: "must be an unsigned integer".to_string(),
        })?;
        return Ok(version as u32);
    }
    if raw.get("people").map(|p| p.is_array()).unwrap_or(false) {
        return Ok(1);
    }
    Err(SchemaError::Invalid {
        field: "schema_version".to_string(),
        reason: "missing, and payload is not a recognizable legacy shape".to_string(),
    })
}

/// Run the migration chain until the payload reaches the current version.
/// Future versions are rejected before any step runs.
pub fn migrate_to_current(raw: Value) -> Result<Value, SchemaError> {
    let mut version = detect_version(&raw)?;
    if version > CURRENT_SCHEMA_VERSION {
        return Err(SchemaError::UnsupportedVersion {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }
    if version == 0 {
        return Err(SchemaError::UnsupportedVersion {
            found: 0,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    let mut payload = raw;
    while version < CURRENT_SCHEMA_VERSION {
        payload = match version {
            1 => migrate_v1_to_v2(payload)?,
            2 => migrate_v2_to_v3(payload)?,
            other => {
                return Err(SchemaError::Migration {
                    from_version: other,
                    field: "schema_version".to_string(),
                    reason: "no migration step registered".to_string(),
                })
            }
        };
        version += 1;
    }
    Ok(payload)
}

/// v1 -> v2: `people` with `gender`/`dob`/condition lists become typed
/// `individuals`; free-form relationship kinds become `parent_of` /
/// `partner_of` edges. Kinship kinds with no typed representation are
/// preserved as notes rather than dropped.
fn migrate_v1_to_v2(raw: Value) -> Result<Value, SchemaError> {
    let people = expect_array(&raw, "people", 1)?;
    let mut notes: Vec<String> = Vec::new();
    let mut individuals = Vec::with_capacity(people.len());

    for (index, person) in people.iter().enumerate() {
        let path = format!("people[{}]", index);
        let id = person
            .get("id")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| migration_error(1, &format!("{}.id", path), "missing or not an integer"))?;

        let name = person.get("name").and_then(|v| v.as_str()).map(String::from);

        let sex = match person.get("gender").and_then(|v| v.as_str()) {
            Some(g) => match g.trim().to_uppercase().as_str() {
                "M" | "MALE" => "male",
                "F" | "FEMALE" => "female",
                "O" | "OTHER" | "U" | "UNKNOWN" => "unknown",
                other => {
                    notes.push(format!(
                        "{}.gender: unrecognized value \"{}\" mapped to unknown",
                        path, other
                    ));
                    "unknown"
                }
            },
            None => "unknown",
        };

        let date_of_birth = match person.get("dob").and_then(|v| v.as_str()) {
            Some(text) => match chrono::NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
                Ok(date) => Value::String(date.to_string()),
                Err(_) => {
                    notes.push(format!(
                        "{}.dob: non-ISO value \"{}\" dropped",
                        path, text
                    ));
                    Value::Null
                }
            },
            None => Value::Null,
        };

        let mut conditions = Map::new();
        if let Some(list) = person.get("conditions").and_then(|v| v.as_array()) {
            for entry in list {
                if let Some(text) = entry.as_str() {
                    let key = text.trim().to_lowercase();
                    if !key.is_empty() {
                        conditions.insert(key, Value::String("affected".to_string()));
                    }
                }
            }
        }

        individuals.push(json!({
            "id": id,
            "name": name,
            "sex_at_birth": sex,
            "vital_status": "unknown",
            "date_of_birth": date_of_birth,
            "conditions": conditions,
            "proband": false,
        }));
    }

    let no_rels = Vec::new();
    let legacy_rels = match raw.get("relationships") {
        Some(value) => value.as_array().ok_or_else(|| {
            migration_error(1, "relationships", "present but not an array")
        })?,
        None => &no_rels,
    };

    let mut relationships = Vec::new();
    for (index, rel) in legacy_rels.iter().enumerate() {
        let path = format!("relationships[{}]", index);
        let from = rel
            .get("from")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| migration_error(1, &format!("{}.from", path), "missing or not an integer"))?;
        let to = rel
            .get("to")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| migration_error(1, &format!("{}.to", path), "missing or not an integer"))?;
        let kind = rel
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| migration_error(1, &format!("{}.type", path), "missing"))?;

        match kind.trim().to_lowercase().as_str() {
            "parent" => relationships.push(typed_edge("parent_of", from, to, true)),
            "child" => relationships.push(typed_edge("parent_of", to, from, true)),
            "adopted" => relationships.push(typed_edge("parent_of", from, to, false)),
            "spouse" | "partner" => {
                let (a, b) = if from <= to { (from, to) } else { (to, from) };
                relationships.push(typed_edge("partner_of", a, b, true));
            }
            "sibling" | "uncle" | "aunt" | "cousin" => {
                notes.push(format!(
                    "unmapped legacy relationship: {} {} {}",
                    from, kind, to
                ));
            }
            other => {
                return Err(migration_error(
                    1,
                    &format!("{}.type", path),
                    &format!("cannot map relationship kind \"{}\"", other),
                ))
            }
        }
    }

    Ok(json!({
        "schema_version": 2,
        "individuals": individuals,
        "relationships": relationships,
        "notes": notes,
    }))
}

/// v2 -> v3: additive. Adds `created_at`, a provenance block (absorbing any
/// v2 notes) and the per-individual `twin_group` slot.
fn migrate_v2_to_v3(raw: Value) -> Result<Value, SchemaError> {
    let individuals = expect_array(&raw, "individuals", 2)?;
    let relationships = expect_array(&raw, "relationships", 2)?;

    let migrated_individuals: Vec<Value> = individuals
        .iter()
        .map(|person| {
            let mut person = person.clone();
            if let Some(obj) = person.as_object_mut() {
                obj.entry("twin_group").or_insert(Value::Null);
            }
            person
        })
        .collect();

    let notes = raw
        .get("notes")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    Ok(json!({
        "schema_version": 3,
        "created_at": chrono::Utc::now().to_rfc3339(),
        "individuals": migrated_individuals,
        "relationships": relationships,
        "provenance": {
            "source": "upload",
            "method": "structured_parse",
            "notes": notes,
        },
    }))
}

fn typed_edge(kind: &str, from: u64, to: u64, biological: bool) -> Value {
    json!({
        "kind": kind,
        "from": from,
        "to": to,
        "confidence": 1.0,
        "biological": biological,
        "origin": "structured_parse",
    })
}

fn expect_array<'a>(
    raw: &'a Value,
    field: &str,
    from_version: u32,
) -> Result<&'a Vec<Value>, SchemaError> {
    raw.get(field)
        .and_then(|v| v.as_array())
        .ok_or_else(|| migration_error(from_version, field, "missing or not an array"))
}

fn migration_error(from_version: u32, field: &str, reason: &str) -> SchemaError {
    SchemaError::Migration {
        from_version,
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
