use chrono::NaiveDate;

use crate::models::{AssessmentRecord, Domain, Status};
use crate::registration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    RecentlyUpdated,
}

/// In-memory filter over loaded records. Every populated criterion must
/// match.
#[derive(Debug, Clone, Default)]
pub struct AssessmentFilter {
    pub status: Option<Status>,
    pub domain: Option<Domain>,
    pub domain_status: Option<Status>,
    pub name_contains: Option<String>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
}

impl AssessmentFilter {
    pub fn matches(&self, record: &AssessmentRecord) -> bool {
        if self.status.is_some_and(|status| record.status != status) {
            return false;
        }
        if let Some(domain) = self.domain {
            let wanted = self.domain_status.unwrap_or(Status::Completed);
            if record.domain_status(domain) != wanted {
                return false;
            }
        }
        if let Some(needle) = self.name_contains.as_deref() {
            let name = registration::full_name(record).to_lowercase();
            if !name.contains(&needle.to_lowercase()) {
                return false;
            }
        }

        let created = record.created_at.date_naive();
        if self.created_from.is_some_and(|from| created < from) {
            return false;
        }
        if self.created_to.is_some_and(|to| created > to) {
            return false;
        }
        true
    }

    pub fn apply(&self, records: Vec<AssessmentRecord>, order: SortOrder) -> Vec<AssessmentRecord> {
        let mut matched: Vec<AssessmentRecord> =
            records.into_iter().filter(|record| self.matches(record)).collect();
        sort_records(&mut matched, order);
        matched
    }
}

pub fn sort_records(records: &mut [AssessmentRecord], order: SortOrder) {
    match order {
        SortOrder::Newest => records.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOrder::Oldest => records.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortOrder::RecentlyUpdated => records.sort_by(|a, b| {
            let a_touched = a.updated_at.unwrap_or(a.created_at);
            let b_touched = b.updated_at.unwrap_or(b.created_at);
            b_touched.cmp(&a_touched)
        }),
    }
}
