use serde_json::{Map, Value};

use crate::models::{AssessmentRecord, Domain};

pub const REGISTRATION_SECTION: &str = "registrationDetails";

/// Required sections per domain, in form order. This table is the only
/// domain-specific input to status classification, and it also decides which
/// domain owns a section when it is saved.
pub const DOMAIN_SECTIONS: [(Domain, &[&str]); 5] = [
    (
        Domain::Physiotherapy,
        &[
            REGISTRATION_SECTION,
            "injuryHistory",
            "staticPosture",
            "rom",
            "strengthStability",
            "fms",
        ],
    ),
    (
        Domain::Biomechanics,
        &[
            "metadata",
            "running",
            "spatiotemporal",
            "kinematic",
            "impact",
            "variability",
            "loadCarriage",
            "strength",
            "powerTests",
        ],
    ),
    (
        Domain::Physiology,
        &[
            "bodyComposition",
            "aerobicCapacity",
            "anaerobicCapacity",
            "bloodMarkers",
        ],
    ),
    (
        Domain::Nutrition,
        &["dietaryIntake", "hydration", "supplementation"],
    ),
    (
        Domain::Psychology,
        &["mentalWellbeing", "sleepQuality", "stressResilience"],
    ),
];

pub fn required_sections(domain: Domain) -> &'static [&'static str] {
    DOMAIN_SECTIONS
        .iter()
        .find(|(candidate, _)| *candidate == domain)
        .map(|(_, sections)| *sections)
        .unwrap_or(&[])
}

pub fn domain_for_section(section: &str) -> Option<Domain> {
    DOMAIN_SECTIONS
        .iter()
        .find(|(_, sections)| sections.contains(&section))
        .map(|(domain, _)| *domain)
}

/// Every known section name, in table order.
pub fn all_sections() -> impl Iterator<Item = &'static str> {
    DOMAIN_SECTIONS
        .iter()
        .flat_map(|(_, sections)| sections.iter().copied())
}

/// `staticPosture` -> `Static Posture`.
pub fn section_label(key: &str) -> String {
    let mut label = String::with_capacity(key.len() + 4);
    for (index, ch) in key.chars().enumerate() {
        if index == 0 {
            label.extend(ch.to_uppercase());
        } else {
            if ch.is_uppercase() {
                label.push(' ');
            }
            label.push(ch);
        }
    }
    label
}

/// Anything that can hand out section maps by name: a full record, or a
/// bare slice of one.
pub trait SectionLookup {
    fn section(&self, name: &str) -> Option<&Value>;
}

impl SectionLookup for Map<String, Value> {
    fn section(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl SectionLookup for AssessmentRecord {
    fn section(&self, name: &str) -> Option<&Value> {
        if name == REGISTRATION_SECTION {
            Some(&self.registration_details)
        } else {
            self.sections.get(name)
        }
    }
}
