//! Built-in issue dictionary for residential and commercial facility
//! maintenance. Keywords are lowercase on purpose; matching lowercases the
//! ticket text and tests plain substring containment. Location words (block,
//! lobby, unit numbers) are deliberately absent so they can never steer
//! classification.

use once_cell::sync::Lazy;

use crate::dictionary::{
    Confidence, FallbackPolicy, IssueDictionary, IssueEntry, SkillGroup, SkillSection,
};

static BUILTIN: Lazy<IssueDictionary> = Lazy::new(build);

/// The dictionary compiled into the binary. Precedence runs vendor over
/// technical over plumbing over soft service, so specialist work is never
/// swallowed by a generic match.
pub fn builtin() -> &'static IssueDictionary {
    &BUILTIN
}

fn build() -> IssueDictionary {
    IssueDictionary {
        sections: vec![
            technical_section(),
            plumbing_section(),
            vendor_section(),
            soft_service_section(),
        ],
        precedence: vec![
            SkillGroup::Vendor,
            SkillGroup::Technical,
            SkillGroup::Plumbing,
            SkillGroup::SoftService,
        ],
        fallback: FallbackPolicy {
            skill_group: SkillGroup::SoftService,
            confidence: Confidence::Low,
        },
    }
}

fn technical_section() -> SkillSection {
    SkillSection {
        group: SkillGroup::Technical,
        issues: vec![
            issue(
                "ac_breakdown",
                &[
                    "ac",
                    "a/c",
                    "aircon",
                    "air con",
                    "air conditioner",
                    "air conditioning",
                    "hvac",
                    "not cooling",
                    "no cooling",
                    "compressor",
                    "thermostat",
                ],
            ),
            issue(
                "electrical_fault",
                &[
                    "power",
                    "electricity",
                    "electrical",
                    "socket",
                    "power point",
                    "breaker",
                    "tripped",
                    "short circuit",
                    "sparking",
                    "wiring",
                    "no power",
                ],
            ),
            issue(
                "lighting_fault",
                &["light", "lights", "bulb", "tube light", "lamp", "flickering"],
            ),
            issue(
                "lift_breakdown",
                &["lift", "elevator", "lift stuck", "elevator stuck", "lift door"],
            ),
            issue(
                "appliance_fault",
                &[
                    "fridge",
                    "refrigerator",
                    "washing machine",
                    "dryer",
                    "microwave",
                    "oven",
                    "dishwasher",
                    "water dispenser",
                ],
            ),
            issue(
                "door_access_fault",
                &[
                    "door lock",
                    "latch",
                    "door closer",
                    "keycard",
                    "access card",
                    "door stuck",
                    "hinge",
                ],
            ),
        ],
    }
}

fn plumbing_section() -> SkillSection {
    SkillSection {
        group: SkillGroup::Plumbing,
        issues: vec![
            issue(
                "water_leak",
                &[
                    "leak",
                    "leaking",
                    "leakage",
                    "dripping",
                    "seepage",
                    "burst pipe",
                    "pipe burst",
                    "water stain",
                ],
            ),
            issue(
                "blocked_drain",
                &[
                    "blocked",
                    "blockage",
                    "clog",
                    "clogged",
                    "choked",
                    "drain",
                    "drainage",
                    "overflowing",
                ],
            ),
            issue(
                "toilet_fault",
                &["toilet", "flush", "cistern", "urinal", "toilet bowl", "toilet seat", "wc"],
            ),
            issue(
                "water_supply_fault",
                &["no water", "water supply", "low pressure", "water pressure"],
            ),
            issue(
                "water_heater_fault",
                &["water heater", "geyser", "no hot water", "heater"],
            ),
            issue(
                "fixture_fault",
                &["tap", "faucet", "mixer", "shower", "shower head", "sink", "basin"],
            ),
        ],
    }
}

fn vendor_section() -> SkillSection {
    SkillSection {
        group: SkillGroup::Vendor,
        issues: vec![
            issue(
                "pest_control",
                &[
                    "pest",
                    "cockroach",
                    "rodent",
                    "rats",
                    "termite",
                    "bed bug",
                    "bedbug",
                    "mosquito",
                    "fumigation",
                    "infestation",
                ],
            ),
            issue(
                "landscaping",
                &[
                    "garden",
                    "lawn",
                    "landscaping",
                    "tree trimming",
                    "hedge",
                    "irrigation",
                    "pruning",
                ],
            ),
            issue(
                "waste_removal",
                &["garbage", "trash", "rubbish", "bulk waste", "refuse", "bin full"],
            ),
            issue(
                "facade_works",
                &["facade", "window cleaning", "gondola", "awning", "roofing"],
            ),
            issue(
                "security_systems",
                &["cctv", "camera", "intercom", "barrier gate", "boom gate", "alarm"],
            ),
        ],
    }
}

fn soft_service_section() -> SkillSection {
    SkillSection {
        group: SkillGroup::SoftService,
        issues: vec![
            issue(
                "general_cleaning",
                &[
                    "cleaning",
                    "clean up",
                    "spill",
                    "stain",
                    "dirty",
                    "mop",
                    "dusty",
                    "housekeeping",
                    "sweep",
                ],
            ),
            issue(
                "odour_complaint",
                &["smell", "odour", "odor", "stink", "foul smell", "smelly"],
            ),
            issue(
                "pantry_supplies",
                &["pantry", "paper towel", "hand soap", "tissue", "refill"],
            ),
            issue("signage_request", &["notice", "signage", "poster", "banner"]),
            issue(
                "porter_request",
                &["porter", "move furniture", "furniture removal"],
            ),
        ],
    }
}

fn issue(code: &str, keywords: &[&str]) -> IssueEntry {
    IssueEntry {
        code: code.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::dictionary::Dictionary;

    #[test]
    fn covers_every_skill_group_exactly_once() {
        let dictionary = builtin();
        let groups: Vec<SkillGroup> = dictionary
            .sections()
            .iter()
            .map(|section| section.group)
            .collect();
        for group in SkillGroup::ALL {
            assert_eq!(groups.iter().filter(|g| **g == group).count(), 1);
        }
        let precedence: HashSet<SkillGroup> = dictionary.precedence().iter().copied().collect();
        assert_eq!(precedence.len(), SkillGroup::ALL.len());
    }

    #[test]
    fn issue_codes_are_unique_across_sections() {
        let mut seen = HashSet::new();
        for section in builtin().sections() {
            for issue in &section.issues {
                assert!(seen.insert(issue.code.clone()), "duplicate code {}", issue.code);
            }
        }
    }

    #[test]
    fn keywords_are_lowercase_and_non_empty() {
        for section in builtin().sections() {
            for issue in &section.issues {
                assert!(!issue.keywords.is_empty(), "{} has no keywords", issue.code);
                for keyword in &issue.keywords {
                    assert!(!keyword.trim().is_empty());
                    assert_eq!(keyword, &keyword.to_lowercase());
                }
            }
        }
    }

    #[test]
    fn fallback_routes_to_soft_service_low() {
        let fallback = &builtin().fallback;
        assert_eq!(fallback.skill_group, SkillGroup::SoftService);
        assert_eq!(fallback.confidence, Confidence::Low);
    }
}
