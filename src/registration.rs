use chrono::{Datelike, NaiveDate};
use serde_json::Value;

use crate::models::AssessmentRecord;

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// Whole years between `date_of_birth` and `today`.
pub fn derive_age(date_of_birth: &str, today: NaiveDate) -> Option<u32> {
    let dob = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_of_birth.trim(), format).ok())?;
    if dob > today {
        return None;
    }

    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

pub fn derive_full_name(first: &str, initials: &str, last: &str) -> String {
    [first, initials, last]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn text_field<'a>(record: &'a AssessmentRecord, field: &str) -> &'a str {
    record
        .registration_details
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or("")
}

pub fn full_name(record: &AssessmentRecord) -> String {
    derive_full_name(
        text_field(record, "firstName"),
        text_field(record, "initials"),
        text_field(record, "lastName"),
    )
}

pub fn age(record: &AssessmentRecord, today: NaiveDate) -> Option<u32> {
    derive_age(text_field(record, "dateOfBirth"), today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_counts_completed_birthdays() {
        assert_eq!(derive_age("1990-06-15", date(2025, 6, 14)), Some(34));
        assert_eq!(derive_age("1990-06-15", date(2025, 6, 15)), Some(35));
        assert_eq!(derive_age("15/06/1990", date(2025, 12, 1)), Some(35));
    }

    #[test]
    fn age_rejects_garbage_and_future_dates() {
        assert_eq!(derive_age("", date(2025, 1, 1)), None);
        assert_eq!(derive_age("June 1990", date(2025, 1, 1)), None);
        assert_eq!(derive_age("2030-01-01", date(2025, 1, 1)), None);
    }

    #[test]
    fn full_name_skips_blank_parts() {
        assert_eq!(derive_full_name("Jules", "R", "Moreno"), "Jules R Moreno");
        assert_eq!(derive_full_name("Jules", "  ", "Moreno"), "Jules Moreno");
        assert_eq!(derive_full_name("", "", ""), "");
    }

    #[test]
    fn reads_registration_fields_from_record() {
        let mut record = AssessmentRecord::new(Uuid::new_v4(), Utc::now());
        record.registration_details = json!({
            "firstName": "Avery",
            "initials": "J",
            "lastName": "Lee",
            "dateOfBirth": "2000-02-29",
            "serviceNumber": 4471
        });

        assert_eq!(full_name(&record), "Avery J Lee");
        assert_eq!(age(&record, date(2025, 3, 1)), Some(25));
    }
}
