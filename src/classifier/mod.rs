pub mod confidence;
pub mod engine;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::dictionary::{Confidence, SkillGroup};

/// Accumulated keyword points for one ticket, keyed both by skill group and
/// by issue code. Group totals drive the margin and entropy calculations;
/// per-issue rows carry the tie-break data for winner selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreTable {
    pub groups: BTreeMap<SkillGroup, u32>,
    pub issues: BTreeMap<String, IssueScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueScore {
    pub group: SkillGroup,
    pub points: u32,
    /// Character length of the longest single keyword that hit this issue.
    pub longest_keyword: usize,
}

impl ScoreTable {
    pub fn record(&mut self, group: SkillGroup, code: &str, points: u32, keyword_chars: usize) {
        *self.groups.entry(group).or_insert(0) += points;
        let entry = self.issues.entry(code.to_string()).or_insert(IssueScore {
            group,
            points: 0,
            longest_keyword: 0,
        });
        entry.points += points;
        entry.longest_keyword = entry.longest_keyword.max(keyword_chars);
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group_score(&self, group: SkillGroup) -> u32 {
        self.groups.get(&group).copied().unwrap_or(0)
    }

    /// Gap between the best and the second-best skill group total. With a
    /// single matched group the second-best counts as zero.
    pub fn margin(&self) -> f64 {
        let mut totals: Vec<u32> = self.groups.values().copied().collect();
        totals.sort_unstable_by(|a, b| b.cmp(a));
        match totals.as_slice() {
            [] => 0.0,
            [top] => *top as f64,
            [top, second, ..] => (*top - *second) as f64,
        }
    }

    /// Groups ranked by score, ties broken by slug so the order is stable.
    pub fn top_groups(&self, n: usize) -> Vec<SkillGroup> {
        let mut ranked: Vec<(SkillGroup, u32)> =
            self.groups.iter().map(|(group, score)| (*group, *score)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.as_slug().cmp(b.0.as_slug())));
        ranked.into_iter().take(n).map(|(group, _)| group).collect()
    }

    /// Best issue inside one group: highest points, then longest matched
    /// keyword, then lexicographically smallest code.
    pub fn top_issue_for(&self, group: SkillGroup) -> Option<(&str, &IssueScore)> {
        self.issues
            .iter()
            .filter(|(_, score)| score.group == group)
            .max_by(|(a_code, a), (b_code, b)| {
                a.points
                    .cmp(&b.points)
                    .then(a.longest_keyword.cmp(&b.longest_keyword))
                    .then(b_code.cmp(a_code))
            })
            .map(|(code, score)| (code.as_str(), score))
    }

    /// Single flat map of slugs and issue codes to points, the shape the
    /// reasoning service expects as context.
    pub fn flatten(&self) -> BTreeMap<String, u32> {
        let mut flat = BTreeMap::new();
        for (group, score) in &self.groups {
            flat.insert(group.as_slug().to_string(), *score);
        }
        for (code, score) in &self.issues {
            flat.insert(code.clone(), score.points);
        }
        flat
    }
}

/// What the deterministic rule pass concluded for one ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleClassification {
    pub skill_group: SkillGroup,
    pub issue_code: Option<String>,
    pub confidence: Confidence,
    pub margin: f64,
    pub scores: ScoreTable,
}

impl RuleClassification {
    pub fn matched(&self) -> bool {
        !self.scores.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DecisionZone {
    #[serde(rename = "a_confident")]
    Confident,
    #[serde(rename = "b_ambiguous")]
    Ambiguous,
    #[serde(rename = "c_anomalous")]
    Anomalous,
}

impl DecisionZone {
    pub fn letter(&self) -> char {
        match self {
            Self::Confident => 'A',
            Self::Ambiguous => 'B',
            Self::Anomalous => 'C',
        }
    }

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Confident => "a_confident",
            Self::Ambiguous => "b_ambiguous",
            Self::Anomalous => "c_anomalous",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown decision zone: {0}")]
pub struct DecisionZoneParseError(pub String);

impl std::str::FromStr for DecisionZone {
    type Err = DecisionZoneParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a_confident" | "a" | "confident" => Ok(Self::Confident),
            "b_ambiguous" | "b" | "ambiguous" => Ok(Self::Ambiguous),
            "c_anomalous" | "c" | "anomalous" => Ok(Self::Anomalous),
            _ => Err(DecisionZoneParseError(s.to_string())),
        }
    }
}

impl Display for DecisionZone {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            Self::Confident => "confident",
            Self::Ambiguous => "ambiguous",
            Self::Anomalous => "anomalous",
        };
        write!(f, "{} ({word})", self.letter())
    }
}

/// Second-stage read of a rule result: which decision zone the ticket sits
/// in and whether the resolver should ask the reasoning service for help.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceAnalysis {
    pub zone: DecisionZone,
    pub entropy: f64,
    pub needs_escalation: bool,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn margin_counts_missing_second_group_as_zero() {
        let mut scores = ScoreTable::default();
        scores.record(SkillGroup::Technical, "ac_breakdown", 5, 6);
        assert_eq!(scores.margin(), 5.0);

        scores.record(SkillGroup::Plumbing, "water_leak", 2, 4);
        assert_eq!(scores.margin(), 3.0);
    }

    #[test]
    fn top_groups_orders_by_score_then_slug() {
        let mut scores = ScoreTable::default();
        scores.record(SkillGroup::Vendor, "pest_control", 2, 4);
        scores.record(SkillGroup::Plumbing, "water_leak", 2, 4);
        scores.record(SkillGroup::Technical, "lighting_fault", 4, 4);

        let ranked = scores.top_groups(3);
        assert_eq!(
            ranked,
            vec![SkillGroup::Technical, SkillGroup::Plumbing, SkillGroup::Vendor]
        );
        assert_eq!(scores.top_groups(1), vec![SkillGroup::Technical]);
    }

    #[test]
    fn flatten_merges_group_and_issue_points() {
        let mut scores = ScoreTable::default();
        scores.record(SkillGroup::Technical, "ac_breakdown", 1, 2);
        scores.record(SkillGroup::Technical, "ac_breakdown", 4, 11);

        let flat = scores.flatten();
        assert_eq!(flat.get("technical"), Some(&5));
        assert_eq!(flat.get("ac_breakdown"), Some(&5));
    }
}
