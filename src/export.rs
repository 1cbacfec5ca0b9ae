use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::TrackerError;
use crate::models::{AssessmentRecord, Domain};
use crate::registration;
use crate::sections::{all_sections, section_label, SectionLookup};

/// `{section: include?}` switches for an export. Sections missing from the
/// map are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionSelection(BTreeMap<String, bool>);

impl SectionSelection {
    pub fn all() -> Self {
        Self(all_sections().map(|section| (section.to_string(), true)).collect())
    }

    pub fn only<I, S>(sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(sections.into_iter().map(|s| (s.into(), true)).collect())
    }

    pub fn from_flags(flags: BTreeMap<String, bool>) -> Self {
        Self(flags)
    }

    pub fn includes(&self, section: &str) -> bool {
        self.0.get(section).copied().unwrap_or(false)
    }

    /// Included sections in form order.
    pub fn selected(&self) -> Vec<&'static str> {
        all_sections().filter(|section| self.includes(section)).collect()
    }
}

/// Flattens a field value into a single cell.
pub fn cell_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

fn section_fields(records: &[AssessmentRecord], section: &str) -> BTreeSet<String> {
    records
        .iter()
        .filter_map(|record| record.section(section).and_then(Value::as_object))
        .flat_map(|map| map.keys().cloned())
        .collect()
}

pub fn write_csv<W: Write>(
    writer: W,
    records: &[AssessmentRecord],
    selection: &SectionSelection,
    today: NaiveDate,
) -> Result<(), TrackerError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let columns: Vec<(&str, Vec<String>)> = selection
        .selected()
        .into_iter()
        .map(|section| (section, section_fields(records, section).into_iter().collect()))
        .collect();

    let mut header = vec![
        "ID".to_string(),
        "Full Name".to_string(),
        "Age".to_string(),
        "Status".to_string(),
    ];
    header.extend(Domain::ALL.iter().map(|domain| format!("{domain} Status")));
    header.push("Created At".to_string());
    header.push("Updated At".to_string());
    for (section, fields) in &columns {
        let label = section_label(section);
        header.extend(fields.iter().map(|field| format!("{label}: {field}")));
    }
    csv_writer.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.id.to_string(),
            registration::full_name(record),
            registration::age(record, today)
                .map(|age| age.to_string())
                .unwrap_or_default(),
            record.status.to_string(),
        ];
        row.extend(
            Domain::ALL
                .iter()
                .map(|domain| record.domain_status(*domain).to_string()),
        );
        row.push(record.created_at.to_rfc3339());
        row.push(
            record
                .updated_at
                .map(|updated| updated.to_rfc3339())
                .unwrap_or_default(),
        );
        for (section, fields) in &columns {
            let values = record.section(section);
            row.extend(fields.iter().map(|field| {
                values
                    .and_then(|map| map.get(field))
                    .map(cell_value)
                    .unwrap_or_default()
            }));
        }
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}
