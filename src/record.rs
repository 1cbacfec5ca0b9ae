//! Recompute-then-persist pipeline for section saves.
//!
//! Every save goes through [`apply_section_save`]: the incoming section is
//! merged into the full current record, the owning domain is reclassified
//! from everything the record now holds, and the global status is derived
//! from the resulting domain map. Callers never set a status themselves.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::TrackerError;
use crate::models::AssessmentRecord;
use crate::sections::{domain_for_section, REGISTRATION_SECTION};
use crate::status::{calculate_global_status, domain_status, get_domain_statuses};

pub fn apply_section_save(
    mut record: AssessmentRecord,
    section: &str,
    data: Value,
    now: DateTime<Utc>,
) -> Result<AssessmentRecord, TrackerError> {
    let domain = domain_for_section(section)
        .ok_or_else(|| TrackerError::UnknownSection(section.to_string()))?;

    if !data.is_object() {
        return Err(TrackerError::InvalidSectionData {
            section: section.to_string(),
            reason: "section data must be a JSON object".to_string(),
        });
    }

    if section == REGISTRATION_SECTION {
        merge_value(&mut record.registration_details, data);
    } else {
        let slot = record
            .sections
            .entry(section.to_string())
            .or_insert(Value::Null);
        merge_value(slot, data);
    }

    if record.domain_statuses.is_empty() {
        record.domain_statuses = get_domain_statuses(&record);
    }
    let recomputed = domain_status(domain, &record);
    record.domain_statuses.insert(domain, recomputed);
    record.status = calculate_global_status(&record.domain_statuses);
    record.updated_at = Some(now);

    Ok(record)
}

/// Brings a loaded record in line with its own data: records that predate
/// per-domain tracking get a bootstrapped domain map, and the global status
/// is always rederived.
pub fn normalize_statuses(mut record: AssessmentRecord) -> AssessmentRecord {
    if record.domain_statuses.is_empty() {
        record.domain_statuses = get_domain_statuses(&record);
    }
    record.status = calculate_global_status(&record.domain_statuses);
    record
}

/// Deep merge with document-store `merge: true` semantics: objects merge
/// key by key, anything else is replaced.
fn merge_value(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(updates)) => {
            for (key, value) in updates {
                match existing.get_mut(&key) {
                    Some(slot) => merge_value(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (target, incoming) => *target = incoming,
    }
}
