pub mod http;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dictionary::SkillGroup;

/// Context shipped to the reasoning service alongside the raw ticket text.
/// Candidate buckets are the rule engine's best guesses; the service may
/// still answer outside of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayRequest {
    pub ticket_text: String,
    pub candidate_buckets: Vec<SkillGroup>,
    pub rule_scores: BTreeMap<String, u32>,
}

/// Validated judgment from the reasoning service. Only the primary group is
/// mandatory; everything else is advisory enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmJudgment {
    pub primary_skill_group: SkillGroup,
    pub secondary_skill_group: Option<SkillGroup>,
    pub priority: Option<TicketPriority>,
    pub risk_flag: Option<String>,
    pub rationale: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Display for TicketPriority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown ticket priority: {0}")]
pub struct PriorityParseError(pub String);

impl FromStr for TicketPriority {
    type Err = PriorityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "normal" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" | "critical" => Ok(Self::Urgent),
            _ => Err(PriorityParseError(s.to_string())),
        }
    }
}

/// Everything that can go wrong between the resolver and the reasoning
/// service. An unknown primary group is an error here rather than a value:
/// the service is never allowed to invent skill groups.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("reasoning service request failed: {0}")]
    Transport(String),
    #[error("reasoning service timed out after {0:?}")]
    Timeout(Duration),
    #[error("reasoning service returned {status}: {preview}")]
    Status { status: u16, preview: String },
    #[error("malformed reasoning response: {0}")]
    Malformed(String),
    #[error("reasoning service proposed unknown skill group: {0}")]
    UnknownCategory(String),
}

#[async_trait]
pub trait ReasoningGateway: Send + Sync {
    async fn assess(&self, request: &GatewayRequest) -> Result<LlmJudgment, GatewayError>;
}
