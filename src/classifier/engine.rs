use tracing::debug;

use crate::classifier::{RuleClassification, ScoreTable};
use crate::dictionary::{Confidence, Dictionary};

/// Deterministic keyword pass. Lowercases the ticket text once, scores every
/// dictionary keyword by substring containment, then picks the winner by
/// dictionary precedence rather than raw score.
pub fn classify(dictionary: &dyn Dictionary, text: &str) -> RuleClassification {
    let haystack = text.to_lowercase();
    let mut scores = ScoreTable::default();

    for section in dictionary.sections() {
        for issue in &section.issues {
            for keyword in &issue.keywords {
                if haystack.contains(keyword.as_str()) {
                    scores.record(
                        section.group,
                        &issue.code,
                        keyword_points(keyword),
                        keyword.chars().count(),
                    );
                }
            }
        }
    }

    let winner = dictionary.precedence().iter().find_map(|group| {
        scores
            .top_issue_for(*group)
            .map(|(code, _)| (*group, code.to_string()))
    });

    match winner {
        Some((skill_group, issue_code)) => {
            let margin = scores.margin();
            debug!("rules picked {skill_group} / {issue_code} with margin {margin}");
            RuleClassification {
                skill_group,
                issue_code: Some(issue_code),
                confidence: Confidence::High,
                margin,
                scores,
            }
        }
        None => {
            let fallback = dictionary.fallback();
            debug!("no keyword matched, falling back to {}", fallback.skill_group);
            RuleClassification {
                skill_group: fallback.skill_group,
                issue_code: None,
                confidence: fallback.confidence,
                margin: 0.0,
                scores,
            }
        }
    }
}

/// Single words are worth one point; multi-word phrases earn two points per
/// word so specific phrasing beats incidental single-word hits.
fn keyword_points(keyword: &str) -> u32 {
    let words = keyword.split_whitespace().count() as u32;
    if words > 1 {
        words * 2
    } else {
        1
    }
}
