pub mod builtin;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Skill partition a maintenance ticket can be routed to. Order of the
/// variants is not meaningful; precedence between groups is carried by the
/// dictionary itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SkillGroup {
    Technical,
    Plumbing,
    Vendor,
    SoftService,
}

impl SkillGroup {
    pub const ALL: [SkillGroup; 4] = [
        SkillGroup::Technical,
        SkillGroup::Plumbing,
        SkillGroup::Vendor,
        SkillGroup::SoftService,
    ];

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Plumbing => "plumbing",
            Self::Vendor => "vendor",
            Self::SoftService => "soft_service",
        }
    }
}

impl Display for SkillGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Technical => "Technical",
            Self::Plumbing => "Plumbing",
            Self::Vendor => "Vendor",
            Self::SoftService => "Soft Service",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown skill group: {0}")]
pub struct SkillGroupParseError(pub String);

impl FromStr for SkillGroup {
    type Err = SkillGroupParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "technical" | "tech" => Ok(Self::Technical),
            "plumbing" | "plumber" => Ok(Self::Plumbing),
            "vendor" | "specialist" => Ok(Self::Vendor),
            "soft_service" | "softservice" | "soft" => Ok(Self::SoftService),
            _ => Err(SkillGroupParseError(s.to_string())),
        }
    }
}

/// Confidence attached to a classification. Deliberately coarse: anything
/// the rule engine is unsure about goes through the confidence analyzer
/// rather than a finer-grained score here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Low,
}

impl Display for Confidence {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown confidence: {0}")]
pub struct ConfidenceParseError(pub String);

impl FromStr for Confidence {
    type Err = ConfidenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            _ => Err(ConfidenceParseError(s.to_string())),
        }
    }
}

/// One issue type: a stable code plus the keywords that indicate it.
/// Keywords are stored lowercase; multi-word phrases are matched as whole
/// substrings of the ticket text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueEntry {
    pub code: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillSection {
    pub group: SkillGroup,
    pub issues: Vec<IssueEntry>,
}

/// Where a ticket goes when nothing in the dictionary matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FallbackPolicy {
    pub skill_group: SkillGroup,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueDictionary {
    pub sections: Vec<SkillSection>,
    pub precedence: Vec<SkillGroup>,
    pub fallback: FallbackPolicy,
}

impl IssueDictionary {
    pub fn section(&self, group: SkillGroup) -> Option<&SkillSection> {
        self.sections.iter().find(|section| section.group == group)
    }

    pub fn issue_codes(&self, group: SkillGroup) -> Vec<&str> {
        self.section(group)
            .map(|section| {
                section
                    .issues
                    .iter()
                    .map(|issue| issue.code.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn summarize(&self) -> DictionarySummary {
        let sections = self
            .sections
            .iter()
            .map(|section| SectionSummary {
                group: section.group,
                issue_count: section.issues.len(),
                keyword_count: section
                    .issues
                    .iter()
                    .map(|issue| issue.keywords.len())
                    .sum(),
            })
            .collect();
        DictionarySummary {
            sections,
            precedence: self.precedence.clone(),
            fallback: self.fallback.clone(),
        }
    }
}

/// Read access the classifier needs. Production uses the builtin table;
/// tests substitute small fixture dictionaries through this trait.
pub trait Dictionary: Send + Sync {
    fn sections(&self) -> &[SkillSection];
    fn precedence(&self) -> &[SkillGroup];
    fn fallback(&self) -> &FallbackPolicy;
}

impl Dictionary for IssueDictionary {
    fn sections(&self) -> &[SkillSection] {
        &self.sections
    }

    fn precedence(&self) -> &[SkillGroup] {
        &self.precedence
    }

    fn fallback(&self) -> &FallbackPolicy {
        &self.fallback
    }
}

/// Per-group counts for the dictionary endpoint and CLI table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionarySummary {
    pub sections: Vec<SectionSummary>,
    pub precedence: Vec<SkillGroup>,
    pub fallback: FallbackPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSummary {
    pub group: SkillGroup,
    pub issue_count: usize,
    pub keyword_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_skill_group_aliases() {
        assert_eq!("technical".parse::<SkillGroup>().ok(), Some(SkillGroup::Technical));
        assert_eq!("Soft-Service".parse::<SkillGroup>().ok(), Some(SkillGroup::SoftService));
        assert_eq!("plumber".parse::<SkillGroup>().ok(), Some(SkillGroup::Plumbing));
        assert!("gardening".parse::<SkillGroup>().is_err());
    }

    #[test]
    fn slug_round_trips_for_all_groups() {
        for group in SkillGroup::ALL {
            let parsed: SkillGroup = group.as_slug().parse().unwrap();
            assert_eq!(parsed, group);
        }
    }

    #[test]
    fn summarize_counts_issues_and_keywords() {
        let dictionary = IssueDictionary {
            sections: vec![SkillSection {
                group: SkillGroup::Plumbing,
                issues: vec![
                    IssueEntry {
                        code: "water_leak".to_string(),
                        keywords: vec!["leak".to_string(), "burst pipe".to_string()],
                    },
                    IssueEntry {
                        code: "blocked_drain".to_string(),
                        keywords: vec!["clogged".to_string()],
                    },
                ],
            }],
            precedence: vec![SkillGroup::Plumbing],
            fallback: FallbackPolicy {
                skill_group: SkillGroup::SoftService,
                confidence: Confidence::Low,
            },
        };

        let summary = dictionary.summarize();
        assert_eq!(summary.sections.len(), 1);
        assert_eq!(summary.sections[0].issue_count, 2);
        assert_eq!(summary.sections[0].keyword_count, 3);
    }
}
