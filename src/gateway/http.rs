use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::dictionary::SkillGroup;
use crate::gateway::{GatewayError, GatewayRequest, LlmJudgment, ReasoningGateway, TicketPriority};

/// Exact shape the reasoning service must answer with. Unknown fields are a
/// contract violation, not something to skip over.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireResponse {
    primary_category: String,
    #[serde(default)]
    secondary_category: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    risk_flag: Option<String>,
    reasoning: String,
}

pub struct HttpReasoningGateway {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpReasoningGateway {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent("ticket-triage/0.1")
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .context("failed to build reasoning gateway HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            timeout,
        })
    }

    fn transport_error(&self, error: reqwest::Error) -> GatewayError {
        if error.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl ReasoningGateway for HttpReasoningGateway {
    async fn assess(&self, request: &GatewayRequest) -> Result<LlmJudgment, GatewayError> {
        let started = Instant::now();
        let mut pending = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            pending = pending.bearer_auth(key);
        }
        let response = pending
            .send()
            .await
            .map_err(|error| self.transport_error(error))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| self.transport_error(error))?;
        if !status.is_success() {
            let preview: String = body.chars().take(180).collect();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                preview,
            });
        }
        let judgment = decode_judgment(&body, started.elapsed())?;
        debug!(
            "reasoning service answered {} in {}ms",
            judgment.primary_skill_group, judgment.latency_ms
        );
        Ok(judgment)
    }
}

fn decode_judgment(body: &str, latency: Duration) -> Result<LlmJudgment, GatewayError> {
    let wire: WireResponse =
        serde_json::from_str(body).map_err(|error| GatewayError::Malformed(error.to_string()))?;
    let primary = wire
        .primary_category
        .parse::<SkillGroup>()
        .map_err(|_| GatewayError::UnknownCategory(wire.primary_category.clone()))?;
    // Secondary group and priority are advisory, so unparseable values fall
    // away instead of failing the whole judgment.
    let secondary = wire
        .secondary_category
        .as_deref()
        .and_then(|raw| raw.parse::<SkillGroup>().ok());
    let priority = wire
        .priority
        .as_deref()
        .and_then(|raw| raw.parse::<TicketPriority>().ok());
    let risk_flag = wire.risk_flag.filter(|flag| !flag.trim().is_empty());
    Ok(LlmJudgment {
        primary_skill_group: primary,
        secondary_skill_group: secondary,
        priority,
        risk_flag,
        rationale: wire.reasoning,
        latency_ms: latency.as_millis() as u64,
    })
}
