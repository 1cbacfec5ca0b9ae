use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};

use crate::models::{
    AggregateStats, AssessmentRecord, CrossDomainPatterns, Domain, DomainStatuses,
    MonthlyTrend, SectionCompletion, SectionRatio, Status, StatusCounts, WeeklyTrend,
};
use crate::sections::{required_sections, section_label};
use crate::status::{get_domain_statuses, section_has_data};

const MONTHLY_BUCKETS: usize = 6;
const WEEKLY_BUCKETS: usize = 8;
const STALE_AFTER_DAYS: i64 = 30;
const COMPLETION_OUTLIER_DAYS: f64 = 365.0;

/// How records with both Physiotherapy and Biomechanics completed are split
/// between the `physioBiomechOthers` and `physioBiomech` buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PatternRule {
    /// Every such record lands in `physioBiomechOthers`; `physioBiomech`
    /// stays at zero. Matches the historical dashboard numbers.
    #[default]
    Observed,
    /// `physioBiomechOthers` needs at least one other completed domain;
    /// `physioBiomech` takes the rest.
    Corrected,
}

/// Aggregates the whole record set. `biomechanics` is the secondary
/// collection feeding the Biomechanics section ratios; pass an empty slice
/// when it could not be loaded. Day boundaries follow `now`'s time zone.
pub fn compute_analytics<Tz: TimeZone>(
    records: &[AssessmentRecord],
    biomechanics: &[AssessmentRecord],
    now: &DateTime<Tz>,
    rule: PatternRule,
) -> AggregateStats {
    let zone = now.timezone();
    let today = now.date_naive();
    let week_cutoff = today - Duration::days(7);
    let stale_cutoff = now.clone() - Duration::days(STALE_AFTER_DAYS);

    let mut stats = AggregateStats {
        total_assessments: records.len(),
        domain_breakdown: Domain::ALL
            .into_iter()
            .map(|domain| (domain, StatusCounts::default()))
            .collect(),
        ..AggregateStats::default()
    };

    let mut monthly: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    let mut weekly: BTreeMap<NaiveDate, (usize, usize, usize)> = BTreeMap::new();
    let mut completion_days: Vec<f64> = Vec::new();

    for record in records {
        let created_date = record.created_at.with_timezone(&zone).date_naive();

        match record.status {
            Status::Completed => stats.completed_assessments += 1,
            Status::InProgress => stats.in_progress_assessments += 1,
            Status::Pending => stats.pending_assessments += 1,
        }
        if created_date == today {
            stats.assessments_today += 1;
        }
        if created_date >= week_cutoff {
            stats.assessments_this_week += 1;
        }

        let statuses = effective_statuses(record);
        for (domain, counts) in stats.domain_breakdown.iter_mut() {
            match statuses.get(domain).copied().unwrap_or_default() {
                Status::Completed => counts.completed += 1,
                Status::InProgress => counts.in_progress += 1,
                Status::Pending => counts.pending += 1,
            }
        }
        classify_pattern(&statuses, rule, &mut stats.cross_domain);

        let month = monthly
            .entry(created_date.format("%Y-%m").to_string())
            .or_insert((0, 0));
        month.0 += 1;
        let week = weekly.entry(week_start(created_date)).or_insert((0, 0, 0));
        week.0 += 1;
        match record.status {
            Status::Completed => {
                month.1 += 1;
                week.1 += 1;
            }
            Status::InProgress => week.2 += 1,
            Status::Pending => {}
        }

        if record.status == Status::InProgress {
            stats.data_quality.incomplete_assessments += 1;
            if record.created_at.with_timezone(&zone) < stale_cutoff {
                stats.data_quality.stale_assessments += 1;
            }
        }
        if record.status == Status::Completed {
            if let Some(updated_at) = record.updated_at {
                let days = (updated_at - record.created_at).num_milliseconds() as f64
                    / 86_400_000.0;
                if days > 0.0 && days < COMPLETION_OUTLIER_DAYS {
                    completion_days.push(days);
                }
            }
        }
    }

    stats.completion_rate = percentage(stats.completed_assessments, stats.total_assessments);
    stats.section_completion = SectionCompletion {
        physiotherapy: section_ratios(records, required_sections(Domain::Physiotherapy)),
        biomechanics: section_ratios(biomechanics, required_sections(Domain::Biomechanics)),
    };
    stats.monthly_trends = last_n(monthly, MONTHLY_BUCKETS)
        .map(|(month, (count, completed))| MonthlyTrend {
            month,
            count,
            completed,
        })
        .collect();
    stats.weekly_trends = last_n(weekly, WEEKLY_BUCKETS)
        .map(|(start, (total, completed, in_progress))| WeeklyTrend {
            week: start.format("%b %-d").to_string(),
            week_start: start,
            total,
            completed,
            in_progress,
        })
        .collect();
    stats.data_quality.avg_completion_time = average_to_tenth(&completion_days);

    stats
}

/// Stored domain map, or a fresh computation for records saved before
/// domain statuses were tracked.
fn effective_statuses(record: &AssessmentRecord) -> DomainStatuses {
    if record.domain_statuses.is_empty() {
        get_domain_statuses(record)
    } else {
        record.domain_statuses.clone()
    }
}

fn classify_pattern(
    statuses: &DomainStatuses,
    rule: PatternRule,
    patterns: &mut CrossDomainPatterns,
) {
    let done = |domain: Domain| statuses.get(&domain) == Some(&Status::Completed);
    let physio = done(Domain::Physiotherapy);
    let biomech = done(Domain::Biomechanics);
    let others = [Domain::Physiology, Domain::Nutrition, Domain::Psychology];
    let all_others = others.iter().all(|domain| done(*domain));
    let any_other = others.iter().any(|domain| done(*domain));

    let (with_others, without_others) = match rule {
        PatternRule::Observed => (physio && biomech, physio && biomech),
        PatternRule::Corrected => (physio && biomech && any_other, physio && biomech && !any_other),
    };

    if physio && biomech && all_others {
        patterns.all_five += 1;
    } else if with_others {
        patterns.physio_biomech_others += 1;
    } else if without_others {
        patterns.physio_biomech += 1;
    } else if physio && !biomech {
        patterns.physio_only += 1;
    }
}

fn section_ratios(records: &[AssessmentRecord], sections: &[&str]) -> Vec<SectionRatio> {
    let total = records.len();
    sections
        .iter()
        .map(|section| {
            let completed = records
                .iter()
                .filter(|record| section_has_data(*record, section))
                .count();
            SectionRatio {
                section: section.to_string(),
                label: section_label(section),
                completed,
                total,
                percentage: percentage(completed, total),
            }
        })
        .collect()
}

/// Sunday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

pub fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        (part as f64 / total as f64 * 100.0).round() as u32
    }
}

fn average_to_tenth(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    (mean * 10.0).round() / 10.0
}

fn last_n<K: Ord, V>(buckets: BTreeMap<K, V>, n: usize) -> impl Iterator<Item = (K, V)> {
    let skip = buckets.len().saturating_sub(n);
    buckets.into_iter().skip(skip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Utc, TimeZone};
    use serde_json::json;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 20, 15, 0, 0).unwrap()
    }

    fn record(created_days_ago: i64, status: Status) -> AssessmentRecord {
        let mut record = AssessmentRecord::new(Uuid::new_v4(), now() - Duration::days(created_days_ago));
        record.status = status;
        record
    }

    fn with_statuses(mut record: AssessmentRecord, entries: &[(Domain, Status)]) -> AssessmentRecord {
        record.domain_statuses = entries.iter().copied().collect();
        record
    }

    fn run(records: &[AssessmentRecord]) -> AggregateStats {
        compute_analytics(records, &[], &now(), PatternRule::Observed)
    }

    #[test]
    fn empty_input_produces_zeroes() {
        let stats = run(&[]);
        assert_eq!(stats.total_assessments, 0);
        assert_eq!(stats.completion_rate, 0);
        assert!(stats.monthly_trends.is_empty());
        assert!(stats.weekly_trends.is_empty());
        assert_eq!(stats.data_quality.avg_completion_time, 0.0);
        assert!(stats
            .section_completion
            .physiotherapy
            .iter()
            .all(|ratio| ratio.total == 0 && ratio.percentage == 0));
        assert_eq!(stats.domain_breakdown.len(), 5);
    }

    #[test]
    fn global_counts_and_completion_rate() {
        let records = vec![
            record(0, Status::Completed),
            record(3, Status::InProgress),
            record(7, Status::Pending),
            record(8, Status::Completed),
            record(40, Status::Completed),
            record(90, Status::Pending),
        ];
        let stats = run(&records);

        assert_eq!(stats.total_assessments, 6);
        assert_eq!(stats.completed_assessments, 3);
        assert_eq!(stats.in_progress_assessments, 1);
        assert_eq!(stats.pending_assessments, 2);
        assert_eq!(stats.assessments_today, 1);
        assert_eq!(stats.assessments_this_week, 3);
        assert_eq!(stats.completion_rate, 50);
    }

    #[test]
    fn domain_breakdown_falls_back_to_section_data() {
        let stored = with_statuses(
            record(1, Status::InProgress),
            &[(Domain::Physiotherapy, Status::Completed), (Domain::Nutrition, Status::InProgress)],
        );
        let mut legacy = record(2, Status::InProgress);
        legacy.sections.insert("metadata".to_string(), json!({ "device": "IMU" }));

        let stats = run(&[stored, legacy]);
        let physio = stats.domain_breakdown[&Domain::Physiotherapy];
        let biomech = stats.domain_breakdown[&Domain::Biomechanics];
        let psych = stats.domain_breakdown[&Domain::Psychology];

        assert_eq!((physio.completed, physio.pending), (1, 1));
        assert_eq!((biomech.in_progress, biomech.pending), (1, 1));
        assert_eq!(psych.pending, 2);
    }

    #[test]
    fn cross_domain_patterns_first_match_wins() {
        let all = Domain::ALL.map(|domain| (domain, Status::Completed));
        let records = vec![
            with_statuses(record(1, Status::Completed), &all),
            with_statuses(
                record(1, Status::InProgress),
                &[
                    (Domain::Physiotherapy, Status::Completed),
                    (Domain::Biomechanics, Status::Completed),
                    (Domain::Nutrition, Status::Completed),
                ],
            ),
            with_statuses(
                record(1, Status::InProgress),
                &[
                    (Domain::Physiotherapy, Status::Completed),
                    (Domain::Biomechanics, Status::Completed),
                ],
            ),
            with_statuses(
                record(1, Status::InProgress),
                &[
                    (Domain::Physiotherapy, Status::Completed),
                    (Domain::Biomechanics, Status::InProgress),
                ],
            ),
            with_statuses(
                record(1, Status::InProgress),
                &[(Domain::Biomechanics, Status::Completed)],
            ),
        ];

        let observed = compute_analytics(&records, &[], &now(), PatternRule::Observed).cross_domain;
        assert_eq!(
            observed,
            CrossDomainPatterns {
                all_five: 1,
                physio_biomech_others: 2,
                physio_biomech: 0,
                physio_only: 1,
            }
        );

        let corrected =
            compute_analytics(&records, &[], &now(), PatternRule::Corrected).cross_domain;
        assert_eq!(
            corrected,
            CrossDomainPatterns {
                all_five: 1,
                physio_biomech_others: 1,
                physio_biomech: 1,
                physio_only: 1,
            }
        );
    }

    #[test]
    fn section_percentage_counts_filled_maps() {
        let records: Vec<AssessmentRecord> = (0..10)
            .map(|index| {
                let mut record = record(index, Status::InProgress);
                if index < 3 {
                    record.sections.insert("rom".to_string(), json!({ "hipFlexion": 110 }));
                } else if index < 5 {
                    record.sections.insert("rom".to_string(), json!({ "hipFlexion": "" }));
                }
                record
            })
            .collect();

        let stats = run(&records);
        let rom = stats
            .section_completion
            .physiotherapy
            .iter()
            .find(|ratio| ratio.section == "rom")
            .unwrap();
        assert_eq!((rom.completed, rom.total, rom.percentage), (3, 10, 30));
        assert_eq!(rom.label, "Rom");
    }

    #[test]
    fn biomechanics_ratios_use_the_secondary_collection() {
        let mut secondary = record(1, Status::InProgress);
        secondary
            .sections
            .insert("loadCarriage".to_string(), json!({ "massKg": 25 }));
        let primary = vec![record(1, Status::Pending), record(2, Status::Pending)];

        let stats = compute_analytics(&primary, &[secondary], &now(), PatternRule::Observed);
        let load = stats
            .section_completion
            .biomechanics
            .iter()
            .find(|ratio| ratio.section == "loadCarriage")
            .unwrap();
        assert_eq!((load.completed, load.total, load.percentage), (1, 1, 100));
        assert_eq!(load.label, "Load Carriage");

        let without = run(&primary);
        assert!(without
            .section_completion
            .biomechanics
            .iter()
            .all(|ratio| ratio.total == 0 && ratio.percentage == 0));
    }

    #[test]
    fn weeks_start_on_the_preceding_sunday() {
        let tuesday = NaiveDate::from_ymd_opt(2025, 11, 18).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2025, 11, 16).unwrap();
        assert_eq!(week_start(tuesday), sunday);
        assert_eq!(week_start(sunday), sunday);
    }

    #[test]
    fn weekly_trend_buckets_and_labels() {
        let mut created = record(0, Status::Completed);
        created.created_at = Utc.with_ymd_and_hms(2025, 11, 18, 10, 0, 0).unwrap();
        let mut same_week = record(0, Status::InProgress);
        same_week.created_at = Utc.with_ymd_and_hms(2025, 11, 20, 10, 0, 0).unwrap();

        let stats = run(&[created, same_week]);
        assert_eq!(stats.weekly_trends.len(), 1);
        let week = &stats.weekly_trends[0];
        assert_eq!(week.week, "Nov 16");
        assert_eq!(week.week_start, NaiveDate::from_ymd_opt(2025, 11, 16).unwrap());
        assert_eq!((week.total, week.completed, week.in_progress), (2, 1, 1));
    }

    #[test]
    fn trends_keep_only_the_most_recent_buckets() {
        let records: Vec<AssessmentRecord> = (0..12)
            .map(|months_ago| record(months_ago * 31, Status::Completed))
            .collect();
        let stats = run(&records);

        assert_eq!(stats.monthly_trends.len(), 6);
        assert_eq!(stats.weekly_trends.len(), 8);
        let months: Vec<&str> = stats.monthly_trends.iter().map(|m| m.month.as_str()).collect();
        let mut sorted = months.clone();
        sorted.sort();
        assert_eq!(months, sorted);
        assert_eq!(months.last(), Some(&"2025-11"));
        assert!(stats.weekly_trends.windows(2).all(|w| w[0].week_start < w[1].week_start));
    }

    #[test]
    fn stale_and_incomplete_assessments() {
        let records = vec![
            record(40, Status::InProgress),
            record(10, Status::InProgress),
            record(45, Status::Pending),
            record(50, Status::Completed),
        ];
        let stats = run(&records);
        assert_eq!(stats.data_quality.incomplete_assessments, 2);
        assert_eq!(stats.data_quality.stale_assessments, 1);
    }

    #[test]
    fn completion_time_ignores_outliers() {
        let mut quick = record(10, Status::Completed);
        quick.updated_at = Some(quick.created_at + Duration::days(2));
        let mut slow = record(20, Status::Completed);
        slow.updated_at = Some(slow.created_at + Duration::hours(84));
        let mut ancient = record(800, Status::Completed);
        ancient.updated_at = Some(ancient.created_at + Duration::days(400));
        let mut same_instant = record(5, Status::Completed);
        same_instant.updated_at = Some(same_instant.created_at);
        let never_updated = record(3, Status::Completed);

        let stats = run(&[quick, slow, ancient, same_instant, never_updated]);
        assert_eq!(stats.data_quality.avg_completion_time, 2.8);
    }

    #[test]
    fn percentages_round_half_up() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(5, 0), 0);
    }
}
