use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::audit::sink::AuditSink;
use crate::audit::DecisionRecord;

/// Handle the resolver emits records through. Sending never blocks and never
/// fails the classification path; a dead writer is logged and the record is
/// dropped.
#[derive(Clone)]
pub struct AuditHandle {
    tx: Option<mpsc::UnboundedSender<DecisionRecord>>,
}

impl AuditHandle {
    /// Handle that swallows every record, for setups with auditing switched
    /// off and for tests that do not care about the trail.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, record: DecisionRecord) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(record).is_err() {
            warn!("audit writer is gone, dropping decision record");
        }
    }
}

/// Spawns the background task that fans records out to the sinks. One sink
/// failing is logged and must not starve the others. The join handle lets
/// shutdown paths drain the queue by dropping the emit handle first.
pub fn spawn_writer(sinks: Vec<Box<dyn AuditSink>>) -> (AuditHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<DecisionRecord>();
    let task = tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            for sink in &sinks {
                if let Err(error) = sink.record(&record).await {
                    warn!("audit sink failed: {error:#}");
                }
            }
        }
    });
    (AuditHandle { tx: Some(tx) }, task)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::*;
    use crate::audit::record_from_decision;
    use crate::classifier::{ConfidenceAnalysis, DecisionZone, RuleClassification, ScoreTable};
    use crate::dictionary::{Confidence, SkillGroup};
    use crate::resolver::{DecisionSource, ResolvedClassification};

    struct CapturingSink {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl AuditSink for CapturingSink {
        async fn record(&self, record: &DecisionRecord) -> Result<()> {
            self.seen.lock().unwrap().push(record.text_digest.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn record(&self, _record: &DecisionRecord) -> Result<()> {
            Err(anyhow!("sink offline"))
        }
    }

    fn decision_fixture() -> ResolvedClassification {
        let mut scores = ScoreTable::default();
        scores.record(SkillGroup::Technical, "ac_breakdown", 5, 11);
        ResolvedClassification {
            skill_group: SkillGroup::Technical,
            issue_code: Some("ac_breakdown".to_string()),
            confidence: Confidence::High,
            zone: DecisionZone::Confident,
            decision_source: DecisionSource::Rule,
            escalation_used: false,
            escalation_accepted: false,
            secondary_skill_group: None,
            priority: None,
            risk_flag: None,
            rationale: None,
            rule_result: RuleClassification {
                skill_group: SkillGroup::Technical,
                issue_code: Some("ac_breakdown".to_string()),
                confidence: Confidence::High,
                margin: 5.0,
                scores,
            },
            confidence_analysis: ConfidenceAnalysis {
                zone: DecisionZone::Confident,
                entropy: 0.0,
                needs_escalation: false,
                reason: "margin 5 clears 2 with entropy 0.00".to_string(),
            },
            escalation_result: None,
        }
    }

    #[tokio::test]
    async fn writer_drains_emitted_records() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (handle, task) = spawn_writer(vec![Box::new(CapturingSink { seen: seen.clone() })]);

        handle.emit(record_from_decision("ac not cooling at all", &decision_fixture()));
        handle.emit(record_from_decision("still not cooling", &decision_fixture()));
        drop(handle);
        task.await.unwrap();

        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failing_sink_does_not_starve_the_rest() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (handle, task) = spawn_writer(vec![
            Box::new(FailingSink),
            Box::new(CapturingSink { seen: seen.clone() }),
        ]);

        handle.emit(record_from_decision("ac not cooling at all", &decision_fixture()));
        drop(handle);
        task.await.unwrap();

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disabled_handle_is_a_no_op() {
        let handle = AuditHandle::disabled();
        handle.emit(record_from_decision("whatever", &decision_fixture()));
    }
}
