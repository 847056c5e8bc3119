use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use crate::audit::DecisionRecord;
use crate::store::TriageStore;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &DecisionRecord) -> Result<()>;
}

/// Writes one structured line per decision to the normal log stream.
pub struct LogSink;

#[async_trait]
impl AuditSink for LogSink {
    async fn record(&self, record: &DecisionRecord) -> Result<()> {
        let code = record.issue_code.as_deref().unwrap_or("-");
        info!(
            "decision {}: {} / {code} ({}, zone {}, source {}, escalated: {})",
            &record.text_digest[..12],
            record.skill_group,
            record.confidence,
            record.zone.letter(),
            record.decision_source,
            record.escalation_used
        );
        Ok(())
    }
}

/// Persists each record into the decision_audit table.
pub struct StoreSink {
    store: Mutex<TriageStore>,
}

impl StoreSink {
    pub fn new(store: TriageStore) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }
}

#[async_trait]
impl AuditSink for StoreSink {
    async fn record(&self, record: &DecisionRecord) -> Result<()> {
        let store = self
            .store
            .lock()
            .map_err(|_| anyhow!("audit store lock poisoned"))?;
        store.insert_decision(record)
    }
}

pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("ticket-triage/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build webhook HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AuditSink for WebhookSink {
    async fn record(&self, record: &DecisionRecord) -> Result<()> {
        let req = if self.url.contains("discord.com/api/webhooks")
            || self.url.contains("discordapp.com/api/webhooks")
        {
            let code = record.issue_code.as_deref().unwrap_or("unclassified");
            let content = format!(
                "Ticket routed to {} / {code} (zone {}, source {})",
                record.skill_group,
                record.zone.letter(),
                record.decision_source
            );
            self.client
                .post(&self.url)
                .json(&serde_json::json!({ "content": content }))
        } else {
            self.client.post(&self.url).json(record)
        };

        req.send().await?.error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::audit::record_from_decision;
    use crate::classifier::{ConfidenceAnalysis, DecisionZone, RuleClassification, ScoreTable};
    use crate::dictionary::{Confidence, SkillGroup};
    use crate::resolver::{DecisionSource, ResolvedClassification};

    fn decision_fixture() -> ResolvedClassification {
        let mut scores = ScoreTable::default();
        scores.record(SkillGroup::Vendor, "pest_control", 1, 7);
        ResolvedClassification {
            skill_group: SkillGroup::Vendor,
            issue_code: Some("pest_control".to_string()),
            confidence: Confidence::High,
            zone: DecisionZone::Ambiguous,
            decision_source: DecisionSource::Llm,
            escalation_used: true,
            escalation_accepted: true,
            secondary_skill_group: None,
            priority: None,
            risk_flag: None,
            rationale: Some("pest wording dominates".to_string()),
            rule_result: RuleClassification {
                skill_group: SkillGroup::Vendor,
                issue_code: Some("pest_control".to_string()),
                confidence: Confidence::High,
                margin: 1.0,
                scores,
            },
            confidence_analysis: ConfidenceAnalysis {
                zone: DecisionZone::Ambiguous,
                entropy: 0.0,
                needs_escalation: true,
                reason: "margin 1 at or below 2".to_string(),
            },
            escalation_result: None,
        }
    }

    #[tokio::test]
    async fn store_sink_round_trips_through_the_audit_table() {
        let dir = TempDir::new().unwrap();
        let store = TriageStore::open(&dir.path().join("triage.db")).unwrap();
        let sink = StoreSink::new(store);

        let record = record_from_decision("termite mound by the gate", &decision_fixture());
        sink.record(&record).await.unwrap();

        let reader = TriageStore::open(&dir.path().join("triage.db")).unwrap();
        let entries = reader.recent_decisions(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].skill_group, SkillGroup::Vendor);
        assert_eq!(entries[0].issue_code.as_deref(), Some("pest_control"));
        assert_eq!(entries[0].zone, DecisionZone::Ambiguous);
        assert_eq!(entries[0].decision_source, DecisionSource::Llm);
        assert!(entries[0].escalation_used);
        assert_eq!(entries[0].text_preview, "termite mound by the gate");
    }

    #[tokio::test]
    async fn recent_decisions_returns_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = TriageStore::open(&dir.path().join("triage.db")).unwrap();
        let sink = StoreSink::new(store);

        sink.record(&record_from_decision("first", &decision_fixture()))
            .await
            .unwrap();
        sink.record(&record_from_decision("second", &decision_fixture()))
            .await
            .unwrap();

        let reader = TriageStore::open(&dir.path().join("triage.db")).unwrap();
        let entries = reader.recent_decisions(1).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text_preview, "second");
    }
}
