use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Status::Pending),
            "in_progress" => Some(Status::InProgress),
            "completed" => Some(Status::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
pub enum Domain {
    Physiotherapy,
    Biomechanics,
    Physiology,
    Nutrition,
    Psychology,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Physiotherapy,
        Domain::Biomechanics,
        Domain::Physiology,
        Domain::Nutrition,
        Domain::Psychology,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Physiotherapy => "Physiotherapy",
            Domain::Biomechanics => "Biomechanics",
            Domain::Physiology => "Physiology",
            Domain::Nutrition => "Nutrition",
            Domain::Psychology => "Psychology",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Domain::ALL.into_iter().find(|domain| domain.as_str() == value)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type DomainStatuses = BTreeMap<Domain, Status>;

/// One assessed individual. Section maps are untyped JSON objects keyed by
/// field name; the status fields are derived from them and are never set
/// directly by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRecord {
    pub id: Uuid,
    pub status: Status,
    #[serde(default)]
    pub domain_statuses: DomainStatuses,
    #[serde(default = "empty_object")]
    pub registration_details: Value,
    #[serde(default)]
    pub sections: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl AssessmentRecord {
    pub fn new(id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: Status::Pending,
            domain_statuses: DomainStatuses::new(),
            registration_details: empty_object(),
            sections: Map::new(),
            created_at,
            updated_at: None,
        }
    }

    /// Status for `domain`, treating an absent entry as pending.
    pub fn domain_status(&self, domain: Domain) -> Status {
        self.domain_statuses
            .get(&domain)
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossDomainPatterns {
    pub all_five: usize,
    pub physio_biomech_others: usize,
    pub physio_biomech: usize,
    pub physio_only: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRatio {
    pub section: String,
    pub label: String,
    pub completed: usize,
    pub total: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionCompletion {
    pub physiotherapy: Vec<SectionRatio>,
    pub biomechanics: Vec<SectionRatio>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTrend {
    pub month: String,
    pub count: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyTrend {
    pub week: String,
    pub week_start: NaiveDate,
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    pub incomplete_assessments: usize,
    pub stale_assessments: usize,
    pub avg_completion_time: f64,
}

/// Dashboard view over the whole record set. Recomputed on demand, never
/// persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_assessments: usize,
    pub completed_assessments: usize,
    pub in_progress_assessments: usize,
    pub pending_assessments: usize,
    pub assessments_today: usize,
    pub assessments_this_week: usize,
    pub completion_rate: u32,
    pub domain_breakdown: BTreeMap<Domain, StatusCounts>,
    pub cross_domain: CrossDomainPatterns,
    pub section_completion: SectionCompletion,
    pub monthly_trends: Vec<MonthlyTrend>,
    pub weekly_trends: Vec<WeeklyTrend>,
    pub data_quality: DataQuality,
}
