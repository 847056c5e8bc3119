use serde::{Deserialize, Serialize};

use crate::classifier::{ConfidenceAnalysis, DecisionZone, RuleClassification};

/// Knobs for the zone decision. Defaults match the shipped config template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    /// A margin strictly above this value is considered decisive.
    pub margin_confident: f64,
    /// Normalized entropy (0..=1 across matched groups) above this value
    /// marks the score spread as too even to trust.
    pub entropy_relative_max: f64,
    /// Tickets shorter than this many characters are anomalous outright.
    pub min_text_chars: usize,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            margin_confident: 2.0,
            entropy_relative_max: 0.7,
            min_text_chars: 12,
        }
    }
}

/// Places a rule result into decision zone A, B or C and decides whether the
/// resolver should escalate. Zone C covers the two cases where the rules say
/// nothing useful: no match at all, or text too sparse to trust.
pub fn analyze(
    rule: &RuleClassification,
    text: &str,
    thresholds: &ConfidenceThresholds,
) -> ConfidenceAnalysis {
    let (entropy, relative) = entropy_parts(rule);

    if !rule.matched() {
        return ConfidenceAnalysis {
            zone: DecisionZone::Anomalous,
            entropy,
            needs_escalation: true,
            reason: "no dictionary keyword matched".to_string(),
        };
    }

    let text_chars = text.trim().chars().count();
    if text_chars < thresholds.min_text_chars {
        return ConfidenceAnalysis {
            zone: DecisionZone::Anomalous,
            entropy,
            needs_escalation: true,
            reason: format!(
                "ticket text is {text_chars} chars, below the {} char floor",
                thresholds.min_text_chars
            ),
        };
    }

    if rule.margin > thresholds.margin_confident && relative <= thresholds.entropy_relative_max {
        return ConfidenceAnalysis {
            zone: DecisionZone::Confident,
            entropy,
            needs_escalation: false,
            reason: format!(
                "margin {:.0} clears {:.0} with entropy {relative:.2}",
                rule.margin, thresholds.margin_confident
            ),
        };
    }

    let reason = if rule.margin <= thresholds.margin_confident {
        format!(
            "margin {:.0} at or below {:.0}",
            rule.margin, thresholds.margin_confident
        )
    } else {
        format!(
            "entropy {relative:.2} above {:.2} across {} matched groups",
            thresholds.entropy_relative_max,
            rule.scores.groups.len()
        )
    };
    ConfidenceAnalysis {
        zone: DecisionZone::Ambiguous,
        entropy,
        needs_escalation: true,
        reason,
    }
}

/// Shannon entropy over the normalized group totals, plus the same value
/// normalized by ln(k) so thresholds do not depend on how many groups
/// happened to match. One matched group carries zero entropy.
fn entropy_parts(rule: &RuleClassification) -> (f64, f64) {
    let totals: Vec<f64> = rule.scores.groups.values().map(|v| *v as f64).collect();
    let total: f64 = totals.iter().sum();
    if totals.len() < 2 || total <= 0.0 {
        return (0.0, 0.0);
    }
    let mut entropy = 0.0;
    for value in &totals {
        if *value > 0.0 {
            let p = value / total;
            entropy -= p * p.ln();
        }
    }
    let relative = entropy / (totals.len() as f64).ln();
    (entropy, relative)
}
