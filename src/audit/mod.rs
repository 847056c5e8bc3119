pub mod sink;
pub mod writer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classifier::DecisionZone;
use crate::dictionary::{Confidence, SkillGroup};
use crate::resolver::{DecisionSource, ResolvedClassification};

const PREVIEW_CHARS: usize = 120;

/// One classification decision flattened for the audit trail. The complete
/// resolver output rides along so the flat columns never have to be enough.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub recorded_at: DateTime<Utc>,
    pub text_digest: String,
    pub text_preview: String,
    pub skill_group: SkillGroup,
    pub issue_code: Option<String>,
    pub confidence: Confidence,
    pub zone: DecisionZone,
    pub decision_source: DecisionSource,
    pub escalation_used: bool,
    pub escalation_accepted: bool,
    pub detail: ResolvedClassification,
}

pub fn record_from_decision(text: &str, decision: &ResolvedClassification) -> DecisionRecord {
    DecisionRecord {
        recorded_at: Utc::now(),
        text_digest: sha256_hex(text),
        text_preview: text.chars().take(PREVIEW_CHARS).collect(),
        skill_group: decision.skill_group,
        issue_code: decision.issue_code.clone(),
        confidence: decision.confidence,
        zone: decision.zone,
        decision_source: decision.decision_source,
        escalation_used: decision.escalation_used,
        escalation_accepted: decision.escalation_accepted,
        detail: decision.clone(),
    }
}

pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Row shape when the trail is listed back out of storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub recorded_at: DateTime<Utc>,
    pub skill_group: SkillGroup,
    pub issue_code: Option<String>,
    pub confidence: Confidence,
    pub zone: DecisionZone,
    pub decision_source: DecisionSource,
    pub escalation_used: bool,
    pub text_preview: String,
}
