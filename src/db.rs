use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{self, Actor};
use crate::error::TrackerError;
use crate::models::{AssessmentRecord, Domain, DomainStatuses, Status};
use crate::record;
use crate::sections::required_sections;

const RECORD_COLUMNS: &str =
    "id, status, domain_statuses, registration_details, sections, created_at, updated_at";

#[derive(Debug, Clone, Copy)]
enum Store {
    Primary,
    Archive,
}

impl Store {
    fn table(self) -> &'static str {
        match self {
            Store::Primary => "assessment_tracker.assessments",
            Store::Archive => "assessment_tracker.archived_assessments",
        }
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Lenient decode of the stored domain map: unknown domains and
/// non-standard values are dropped, so those domains read as pending.
fn decode_domain_statuses(value: Value) -> DomainStatuses {
    match value {
        Value::Object(map) => map
            .iter()
            .filter_map(|(domain, status)| {
                Some((Domain::parse(domain)?, Status::parse(status.as_str()?)?))
            })
            .collect(),
        _ => DomainStatuses::new(),
    }
}

fn row_to_record(row: &PgRow) -> Result<AssessmentRecord, TrackerError> {
    let status: String = row.try_get("status")?;
    let sections = match row.try_get::<Value, _>("sections")? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let registration_details = match row.try_get::<Value, _>("registration_details")? {
        value @ Value::Object(_) => value,
        _ => Value::Object(Map::new()),
    };

    let loaded = AssessmentRecord {
        id: row.try_get("id")?,
        status: Status::parse(&status).unwrap_or_default(),
        domain_statuses: decode_domain_statuses(row.try_get("domain_statuses")?),
        registration_details,
        sections,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    };
    Ok(record::normalize_statuses(loaded))
}

async fn fetch_locked(
    conn: &mut PgConnection,
    store: Store,
    id: Uuid,
) -> Result<Option<AssessmentRecord>, TrackerError> {
    let query = format!(
        "SELECT {RECORD_COLUMNS} FROM {} WHERE id = $1 FOR UPDATE",
        store.table()
    );
    let row = sqlx::query(&query).bind(id).fetch_optional(conn).await?;
    row.as_ref().map(row_to_record).transpose()
}

async fn upsert_record(
    conn: &mut PgConnection,
    record: &AssessmentRecord,
) -> Result<(), TrackerError> {
    sqlx::query(
        r#"
        INSERT INTO assessment_tracker.assessments
        (id, status, domain_statuses, registration_details, sections, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE
        SET status = EXCLUDED.status,
            domain_statuses = EXCLUDED.domain_statuses,
            registration_details = EXCLUDED.registration_details,
            sections = EXCLUDED.sections,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(record.id)
    .bind(record.status.as_str())
    .bind(Json(&record.domain_statuses))
    .bind(&record.registration_details)
    .bind(Json(&record.sections))
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_assessment(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<AssessmentRecord>, TrackerError> {
    let query = format!(
        "SELECT {RECORD_COLUMNS} FROM {} WHERE id = $1",
        Store::Primary.table()
    );
    let row = sqlx::query(&query).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(row_to_record).transpose()
}

/// Every primary record, newest first.
pub async fn list_assessments(pool: &PgPool) -> Result<Vec<AssessmentRecord>, TrackerError> {
    let query = format!(
        "SELECT {RECORD_COLUMNS} FROM {} ORDER BY created_at DESC",
        Store::Primary.table()
    );
    let rows = sqlx::query(&query).fetch_all(pool).await?;
    let records = rows
        .iter()
        .map(row_to_record)
        .collect::<Result<Vec<_>, _>>()?;
    debug!(count = records.len(), "loaded assessments");
    Ok(records)
}

/// Biomechanics sessions, loaded as their own collection. Only records that
/// hold at least one Biomechanics section are returned, stripped down to
/// those sections.
pub async fn fetch_biomechanics_records(
    pool: &PgPool,
) -> Result<Vec<AssessmentRecord>, TrackerError> {
    let section_names: Vec<String> = required_sections(Domain::Biomechanics)
        .iter()
        .map(|section| section.to_string())
        .collect();

    let rows = sqlx::query(
        r#"
        SELECT id, sections, created_at, updated_at
        FROM assessment_tracker.assessments
        WHERE sections ?| $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(&section_names)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let mut session = AssessmentRecord::new(row.try_get("id")?, row.try_get("created_at")?);
        session.updated_at = row.try_get("updated_at")?;
        if let Value::Object(sections) = row.try_get::<Value, _>("sections")? {
            session.sections = sections
                .into_iter()
                .filter(|(name, _)| section_names.contains(name))
                .collect();
        }
        records.push(session);
    }
    Ok(records)
}

/// Merges one section into a record and persists the recomputed statuses.
/// The current row is locked for the whole read-modify-write so concurrent
/// saves to other sections of the same record are applied in turn.
pub async fn save_section(
    pool: &PgPool,
    id: Option<Uuid>,
    section: &str,
    data: Value,
) -> Result<AssessmentRecord, TrackerError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let existing = match id {
        Some(id) => fetch_locked(&mut tx, Store::Primary, id).await?,
        None => None,
    };
    let current = match existing {
        Some(current) => current,
        None => {
            let id = id.unwrap_or_else(Uuid::new_v4);
            info!(%id, "creating assessment");
            AssessmentRecord::new(id, now)
        }
    };

    let saved = record::apply_section_save(current, section, data, now)?;
    upsert_record(&mut tx, &saved).await?;
    tx.commit().await?;

    info!(id = %saved.id, section, status = %saved.status, "section saved");
    Ok(saved)
}

/// Copies the record into the archive, removes it from the primary store,
/// then logs the deletion.
pub async fn delete_assessment(
    pool: &PgPool,
    id: Uuid,
    actor: &Actor,
) -> Result<AssessmentRecord, TrackerError> {
    let mut tx = pool.begin().await?;
    let snapshot = fetch_locked(&mut tx, Store::Primary, id)
        .await?
        .ok_or(TrackerError::NotFound(id))?;

    sqlx::query(
        r#"
        INSERT INTO assessment_tracker.archived_assessments
        (id, status, domain_statuses, registration_details, sections, created_at, updated_at,
         archived_at, archived_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (id) DO UPDATE
        SET status = EXCLUDED.status,
            domain_statuses = EXCLUDED.domain_statuses,
            registration_details = EXCLUDED.registration_details,
            sections = EXCLUDED.sections,
            updated_at = EXCLUDED.updated_at,
            archived_at = EXCLUDED.archived_at,
            archived_by = EXCLUDED.archived_by
        "#,
    )
    .bind(snapshot.id)
    .bind(snapshot.status.as_str())
    .bind(Json(&snapshot.domain_statuses))
    .bind(&snapshot.registration_details)
    .bind(Json(&snapshot.sections))
    .bind(snapshot.created_at)
    .bind(snapshot.updated_at)
    .bind(Utc::now())
    .bind(&actor.user_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM assessment_tracker.assessments WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let name = crate::registration::full_name(&snapshot);
    audit::log_activity(
        pool,
        actor,
        "delete_assessment",
        &format!("Deleted assessment {id} ({name})"),
    )
    .await;

    Ok(snapshot)
}

/// Moves an archived record back into the primary store.
pub async fn restore_assessment(
    pool: &PgPool,
    id: Uuid,
    actor: &Actor,
) -> Result<AssessmentRecord, TrackerError> {
    let mut tx = pool.begin().await?;
    let archived = fetch_locked(&mut tx, Store::Archive, id)
        .await?
        .ok_or(TrackerError::NotFound(id))?;

    upsert_record(&mut tx, &archived).await?;
    sqlx::query("DELETE FROM assessment_tracker.archived_assessments WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    audit::log_activity(
        pool,
        actor,
        "restore_assessment",
        &format!("Restored assessment {id}"),
    )
    .await;

    Ok(archived)
}

struct SeedAssessment {
    id: &'static str,
    created_days_ago: i64,
    sections: Vec<(&'static str, Value)>,
}

fn seed_assessments() -> Vec<SeedAssessment> {
    let physio = vec![
        (
            "registrationDetails",
            json!({
                "firstName": "Avery",
                "initials": "J",
                "lastName": "Lee",
                "dateOfBirth": "1998-03-14",
                "unit": "2 Signals Regiment"
            }),
        ),
        ("injuryHistory", json!({ "previousInjuries": "Left ankle sprain 2023", "surgeries": "" })),
        ("staticPosture", json!({ "headPosition": "forward", "pelvicTilt": "anterior" })),
        ("rom", json!({ "hipFlexionLeft": 118, "hipFlexionRight": 121 })),
        ("strengthStability", json!({ "plankSeconds": 95, "singleLegBridge": "good" })),
        ("fms", json!({ "deepSquat": 2, "hurdleStep": 2, "inlineLunge": 3 })),
    ];

    vec![
        SeedAssessment {
            id: "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2",
            created_days_ago: 12,
            sections: physio
                .into_iter()
                .chain([
                    ("metadata", json!({ "device": "IMU", "surface": "track" })),
                    ("running", json!({ "cadence": 172, "paceMinKm": 4.6 })),
                ])
                .collect(),
        },
        SeedAssessment {
            id: "0c22f1f1-9184-4fd4-9b21-28c68a6a89dc",
            created_days_ago: 41,
            sections: vec![(
                "registrationDetails",
                json!({ "firstName": "Jules", "lastName": "Moreno", "dateOfBirth": "02/04/1995" }),
            )],
        },
        SeedAssessment {
            id: "d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2",
            created_days_ago: 3,
            sections: vec![
                ("registrationDetails", json!({ "firstName": "Kiara", "lastName": "Patel" })),
                ("dietaryIntake", json!({ "kcalPerDay": 2900 })),
                ("hydration", json!({ "litresPerDay": 3.2 })),
                ("supplementation", json!({ "creatine": true })),
                ("sleepQuality", json!({ "hoursPerNight": 6.5 })),
            ],
        },
    ]
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let now = Utc::now();

    for seed in seed_assessments() {
        let created_at: DateTime<Utc> = now - Duration::days(seed.created_days_ago);
        let mut current = AssessmentRecord::new(Uuid::parse_str(seed.id)?, created_at);
        for (offset, (section, data)) in seed.sections.into_iter().enumerate() {
            let saved_at = created_at + Duration::hours(offset as i64 + 1);
            current = record::apply_section_save(current, section, data, saved_at)?;
        }

        let mut tx = pool.begin().await?;
        upsert_record(&mut tx, &current).await?;
        tx.commit().await?;
    }

    Ok(())
}
