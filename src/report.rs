use std::fmt::Write;

use chrono::NaiveDate;
use serde_json::Value;

use crate::export::{cell_value, SectionSelection};
use crate::models::{AggregateStats, AssessmentRecord, Domain, SectionRatio, StatusCounts};
use crate::registration;
use crate::sections::{section_label, SectionLookup};

pub fn build_assessment_report(
    record: &AssessmentRecord,
    selection: &SectionSelection,
    today: NaiveDate,
) -> String {
    let mut output = String::new();
    let name = registration::full_name(record);
    let name_label = if name.is_empty() { "Unnamed individual" } else { name.as_str() };

    let _ = writeln!(output, "# Assessment Report: {}", name_label);
    let _ = writeln!(output, "Record {} (created {})", record.id, record.created_at.date_naive());
    if let Some(age) = registration::age(record, today) {
        let _ = writeln!(output, "Age: {}", age);
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Status");
    let _ = writeln!(output, "- Overall: {}", record.status);
    for domain in Domain::ALL {
        let _ = writeln!(output, "- {}: {}", domain, record.domain_status(domain));
    }

    for section in selection.selected() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", section_label(section));

        match record.section(section).and_then(Value::as_object) {
            Some(fields) if !fields.is_empty() => {
                for (field, value) in fields {
                    let _ = writeln!(output, "- {}: {}", section_label(field), cell_value(value));
                }
            }
            _ => {
                let _ = writeln!(output, "No data recorded.");
            }
        }
    }

    output
}

fn write_counts(output: &mut String, label: &str, counts: &StatusCounts) {
    let _ = writeln!(
        output,
        "- {}: {} completed, {} in progress, {} pending",
        label, counts.completed, counts.in_progress, counts.pending
    );
}

fn write_ratios(output: &mut String, heading: &str, ratios: &[SectionRatio]) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {} Sections", heading);
    if ratios.iter().all(|ratio| ratio.total == 0) {
        let _ = writeln!(output, "No records available.");
        return;
    }
    for ratio in ratios {
        let _ = writeln!(
            output,
            "- {}: {}/{} ({}%)",
            ratio.label, ratio.completed, ratio.total, ratio.percentage
        );
    }
}

pub fn build_analytics_report(stats: &AggregateStats, generated_on: NaiveDate) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Assessment Analytics");
    let _ = writeln!(output, "Generated {}", generated_on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Total assessments: {}", stats.total_assessments);
    let _ = writeln!(
        output,
        "- Completed: {} ({}%)",
        stats.completed_assessments, stats.completion_rate
    );
    let _ = writeln!(output, "- In progress: {}", stats.in_progress_assessments);
    let _ = writeln!(output, "- Pending: {}", stats.pending_assessments);
    let _ = writeln!(output, "- Created today: {}", stats.assessments_today);
    let _ = writeln!(output, "- Created this week: {}", stats.assessments_this_week);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Domains");
    for (domain, counts) in &stats.domain_breakdown {
        write_counts(&mut output, domain.as_str(), counts);
    }

    let patterns = &stats.cross_domain;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Cross-Domain Completion");
    let _ = writeln!(output, "- All five domains: {}", patterns.all_five);
    let _ = writeln!(
        output,
        "- Physiotherapy + Biomechanics + others: {}",
        patterns.physio_biomech_others
    );
    let _ = writeln!(
        output,
        "- Physiotherapy + Biomechanics only: {}",
        patterns.physio_biomech
    );
    let _ = writeln!(output, "- Physiotherapy only: {}", patterns.physio_only);

    write_ratios(
        &mut output,
        "Physiotherapy",
        &stats.section_completion.physiotherapy,
    );
    write_ratios(
        &mut output,
        "Biomechanics",
        &stats.section_completion.biomechanics,
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Trend");
    if stats.monthly_trends.is_empty() {
        let _ = writeln!(output, "No assessments recorded.");
    } else {
        for month in &stats.monthly_trends {
            let _ = writeln!(
                output,
                "- {}: {} created, {} completed",
                month.month, month.count, month.completed
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Trend");
    if stats.weekly_trends.is_empty() {
        let _ = writeln!(output, "No assessments recorded.");
    } else {
        for week in &stats.weekly_trends {
            let _ = writeln!(
                output,
                "- Week of {}: {} total, {} completed, {} in progress",
                week.week, week.total, week.completed, week.in_progress
            );
        }
    }

    let quality = &stats.data_quality;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Data Quality");
    let _ = writeln!(output, "- Incomplete: {}", quality.incomplete_assessments);
    let _ = writeln!(
        output,
        "- Stale (in progress over 30 days): {}",
        quality.stale_assessments
    );
    let _ = writeln!(
        output,
        "- Average completion time: {:.1} days",
        quality.avg_completion_time
    );

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{compute_analytics, PatternRule};
    use crate::models::Status;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn assessment_report_lists_selected_sections() {
        let mut record = AssessmentRecord::new(Uuid::new_v4(), Utc::now());
        record.registration_details = json!({ "firstName": "Kiara", "lastName": "Patel" });
        record
            .sections
            .insert("fms".to_string(), json!({ "deepSquat": 2, "hurdleStep": 3 }));
        record.domain_statuses.insert(Domain::Physiotherapy, Status::InProgress);
        record.status = Status::InProgress;

        let selection = SectionSelection::only(["fms", "rom"]);
        let report = build_assessment_report(&record, &selection, Utc::now().date_naive());

        assert!(report.starts_with("# Assessment Report: Kiara Patel"));
        assert!(report.contains("- Physiotherapy: in_progress"));
        assert!(report.contains("## Fms\n- Deep Squat: 2\n- Hurdle Step: 3"));
        assert!(report.contains("## Rom\nNo data recorded."));
        assert!(!report.contains("Injury History"));
    }

    #[test]
    fn analytics_report_handles_empty_data() {
        let now = Utc.with_ymd_and_hms(2025, 11, 20, 12, 0, 0).unwrap();
        let stats = compute_analytics(&[], &[], &now, PatternRule::Observed);
        let report = build_analytics_report(&stats, now.date_naive());

        assert!(report.contains("- Total assessments: 0"));
        assert!(report.contains("- Completed: 0 (0%)"));
        assert!(report.contains("## Biomechanics Sections\nNo records available."));
        assert!(report.contains("## Weekly Trend\nNo assessments recorded."));
        assert!(report.contains("- Average completion time: 0.0 days"));
    }
}
