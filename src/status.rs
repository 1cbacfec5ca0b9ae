use serde_json::Value;

use crate::models::{Domain, DomainStatuses, Status};
use crate::sections::{required_sections, SectionLookup};

/// Whether a form value carries anything. Null and empty strings do not;
/// objects and arrays do when at least one member does.
pub fn field_has_data(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.is_empty(),
        Value::Object(map) => map.values().any(field_has_data),
        Value::Array(items) => items.iter().any(field_has_data),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

pub fn section_has_data(source: &impl SectionLookup, section: &str) -> bool {
    source.section(section).is_some_and(field_has_data)
}

/// Classifies one domain by name. Unknown names are pending.
pub fn calculate_domain_status(domain_name: &str, slice: &impl SectionLookup) -> Status {
    match Domain::parse(domain_name) {
        Some(domain) => domain_status(domain, slice),
        None => Status::Pending,
    }
}

pub fn domain_status(domain: Domain, slice: &impl SectionLookup) -> Status {
    let sections = required_sections(domain);
    let filled = sections
        .iter()
        .filter(|section| section_has_data(slice, section))
        .count();
    classify(filled, sections.len())
}

fn classify(filled: usize, total: usize) -> Status {
    if filled == 0 {
        Status::Pending
    } else if filled == total {
        Status::Completed
    } else {
        Status::InProgress
    }
}

/// Statuses for all five domains, computed from whatever sections exist.
pub fn get_domain_statuses(record: &impl SectionLookup) -> DomainStatuses {
    Domain::ALL
        .into_iter()
        .map(|domain| (domain, domain_status(domain, record)))
        .collect()
}

pub fn calculate_global_status(domain_statuses: &DomainStatuses) -> Status {
    let status_of = |domain: &Domain| domain_statuses.get(domain).copied().unwrap_or_default();

    if Domain::ALL.iter().all(|domain| status_of(domain) == Status::Completed) {
        Status::Completed
    } else if Domain::ALL.iter().all(|domain| status_of(domain) == Status::Pending) {
        Status::Pending
    } else {
        Status::InProgress
    }
}
