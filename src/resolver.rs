use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::audit::record_from_decision;
use crate::audit::writer::AuditHandle;
use crate::classifier::confidence::{self, ConfidenceThresholds};
use crate::classifier::engine;
use crate::classifier::{ConfidenceAnalysis, DecisionZone, RuleClassification};
use crate::dictionary::{Confidence, Dictionary, SkillGroup};
use crate::gateway::{GatewayRequest, LlmJudgment, ReasoningGateway, TicketPriority};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Rule,
    Llm,
    Human,
}

impl Display for DecisionSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Rule => "rule",
            Self::Llm => "llm",
            Self::Human => "human",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown decision source: {0}")]
pub struct DecisionSourceParseError(pub String);

impl std::str::FromStr for DecisionSource {
    type Err = DecisionSourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rule" | "rules" => Ok(Self::Rule),
            "llm" => Ok(Self::Llm),
            "human" => Ok(Self::Human),
            _ => Err(DecisionSourceParseError(s.to_string())),
        }
    }
}

/// Final answer for one ticket. The rule result and the confidence analysis
/// are always attached, whatever the decision source ended up being.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedClassification {
    pub skill_group: SkillGroup,
    pub issue_code: Option<String>,
    pub confidence: Confidence,
    pub zone: DecisionZone,
    pub decision_source: DecisionSource,
    pub escalation_used: bool,
    pub escalation_accepted: bool,
    pub secondary_skill_group: Option<SkillGroup>,
    pub priority: Option<TicketPriority>,
    pub risk_flag: Option<String>,
    pub rationale: Option<String>,
    pub rule_result: RuleClassification,
    pub confidence_analysis: ConfidenceAnalysis,
    pub escalation_result: Option<LlmJudgment>,
}

/// Per-call knobs. Forcing escalation skips the zone check but still runs
/// the rule pass for context and fallback.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResolvePolicy {
    pub force_escalation: bool,
}

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub thresholds: ConfidenceThresholds,
    /// How many top-scored groups to offer the reasoning service as
    /// candidates.
    pub escalation_candidates: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            thresholds: ConfidenceThresholds::default(),
            escalation_candidates: 3,
        }
    }
}

/// Runs the full pipeline for one ticket: rule pass, confidence analysis,
/// optional escalation, final merge, audit emission.
pub struct Resolver {
    dictionary: Arc<dyn Dictionary>,
    gateway: Option<Arc<dyn ReasoningGateway>>,
    options: ResolverOptions,
    audit: AuditHandle,
}

impl Resolver {
    pub fn new(
        dictionary: Arc<dyn Dictionary>,
        gateway: Option<Arc<dyn ReasoningGateway>>,
        options: ResolverOptions,
        audit: AuditHandle,
    ) -> Self {
        Self {
            dictionary,
            gateway,
            options,
            audit,
        }
    }

    pub async fn resolve(&self, text: &str, policy: &ResolvePolicy) -> ResolvedClassification {
        let rule = engine::classify(self.dictionary.as_ref(), text);
        let analysis = confidence::analyze(&rule, text, &self.options.thresholds);

        let wants_escalation = policy.force_escalation || analysis.needs_escalation;
        let mut escalation_used = false;
        let mut judgment = None;

        if wants_escalation {
            if let Some(gateway) = &self.gateway {
                escalation_used = true;
                let request = self.build_request(text, &rule);
                match gateway.assess(&request).await {
                    Ok(answer) => judgment = Some(answer),
                    Err(error) => {
                        warn!("reasoning escalation failed, keeping rule result: {error}");
                    }
                }
            } else if policy.force_escalation {
                debug!("escalation requested but no reasoning gateway is configured");
            }
        }

        let decision = match judgment {
            Some(answer) => merge_judgment(rule, analysis, answer),
            None => ResolvedClassification {
                skill_group: rule.skill_group,
                issue_code: rule.issue_code.clone(),
                confidence: rule.confidence,
                zone: analysis.zone,
                decision_source: DecisionSource::Rule,
                escalation_used,
                escalation_accepted: false,
                secondary_skill_group: None,
                priority: None,
                risk_flag: None,
                rationale: None,
                rule_result: rule,
                confidence_analysis: analysis,
                escalation_result: None,
            },
        };

        self.audit.emit(record_from_decision(text, &decision));
        decision
    }

    fn build_request(&self, text: &str, rule: &RuleClassification) -> GatewayRequest {
        let mut candidates = rule.scores.top_groups(self.options.escalation_candidates);
        if candidates.is_empty() {
            // Nothing matched, so every group the dictionary knows is on
            // the table.
            candidates = self.dictionary.precedence().to_vec();
        }
        GatewayRequest {
            ticket_text: text.to_string(),
            candidate_buckets: candidates,
            rule_scores: rule.scores.flatten(),
        }
    }
}

/// An accepted judgment overrides group and confidence. The issue code is
/// re-derived for the judged group from the rule scores where possible; a
/// group the rules never scored keeps a null code.
fn merge_judgment(
    rule: RuleClassification,
    analysis: ConfidenceAnalysis,
    answer: LlmJudgment,
) -> ResolvedClassification {
    let issue_code = if rule.skill_group == answer.primary_skill_group {
        rule.issue_code.clone()
    } else {
        rule.scores
            .top_issue_for(answer.primary_skill_group)
            .map(|(code, _)| code.to_string())
    };
    ResolvedClassification {
        skill_group: answer.primary_skill_group,
        issue_code,
        confidence: Confidence::High,
        zone: analysis.zone,
        decision_source: DecisionSource::Llm,
        escalation_used: true,
        escalation_accepted: true,
        secondary_skill_group: answer.secondary_skill_group,
        priority: answer.priority,
        risk_flag: answer.risk_flag.clone(),
        rationale: Some(answer.rationale.clone()),
        rule_result: rule,
        confidence_analysis: analysis,
        escalation_result: Some(answer),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::audit::sink::AuditSink;
    use crate::audit::writer::spawn_writer;
    use crate::audit::DecisionRecord;
    use crate::dictionary::{FallbackPolicy, IssueDictionary, IssueEntry, SkillSection};
    use crate::gateway::GatewayError;

    fn fixture() -> Arc<IssueDictionary> {
        let issue = |code: &str, keywords: &[&str]| IssueEntry {
            code: code.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        };
        Arc::new(IssueDictionary {
            sections: vec![
                SkillSection {
                    group: SkillGroup::Technical,
                    issues: vec![
                        issue("ac_breakdown", &["aircon", "not cooling"]),
                        issue("lighting_fault", &["bulb"]),
                    ],
                },
                SkillSection {
                    group: SkillGroup::Plumbing,
                    issues: vec![issue("water_leak", &["leak"])],
                },
                SkillSection {
                    group: SkillGroup::Vendor,
                    issues: vec![issue("pest_control", &["termite"])],
                },
                SkillSection {
                    group: SkillGroup::SoftService,
                    issues: vec![issue("general_cleaning", &["cleaning"])],
                },
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
        })
    }

    struct StubGateway {
        judgment: Option<LlmJudgment>,
        calls: AtomicUsize,
        last_request: Mutex<Option<GatewayRequest>>,
    }

    impl StubGateway {
        fn answering(judgment: LlmJudgment) -> Arc<Self> {
            Arc::new(Self {
                judgment: Some(judgment),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                judgment: None,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl ReasoningGateway for StubGateway {
        async fn assess(&self, request: &GatewayRequest) -> Result<LlmJudgment, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            match &self.judgment {
                Some(judgment) => Ok(judgment.clone()),
                None => Err(GatewayError::Transport("stub offline".to_string())),
            }
        }
    }

    fn judgment(primary: SkillGroup) -> LlmJudgment {
        LlmJudgment {
            primary_skill_group: primary,
            secondary_skill_group: None,
            priority: Some(TicketPriority::High),
            risk_flag: None,
            rationale: "service judgment".to_string(),
            latency_ms: 42,
        }
    }

    fn resolver(gateway: Option<Arc<StubGateway>>) -> Resolver {
        let gateway = gateway.map(|g| g as Arc<dyn ReasoningGateway>);
        Resolver::new(
            fixture(),
            gateway,
            ResolverOptions::default(),
            AuditHandle::disabled(),
        )
    }

    #[tokio::test]
    async fn confident_ticket_never_touches_the_gateway() {
        let stub = StubGateway::answering(judgment(SkillGroup::Plumbing));
        let resolver = resolver(Some(stub.clone()));

        let decision = resolver
            .resolve("aircon not cooling today", &ResolvePolicy::default())
            .await;

        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
        assert_eq!(decision.decision_source, DecisionSource::Rule);
        assert_eq!(decision.skill_group, SkillGroup::Technical);
        assert_eq!(decision.zone, DecisionZone::Confident);
        assert!(!decision.escalation_used);
        assert!(decision.escalation_result.is_none());
    }

    #[tokio::test]
    async fn ambiguous_ticket_adopts_the_judgment() {
        let stub = StubGateway::answering(judgment(SkillGroup::Plumbing));
        let resolver = resolver(Some(stub.clone()));

        // One technical point and one plumbing point, margin zero.
        let decision = resolver
            .resolve("bulb leaking water", &ResolvePolicy::default())
            .await;

        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert_eq!(decision.decision_source, DecisionSource::Llm);
        assert_eq!(decision.skill_group, SkillGroup::Plumbing);
        assert_eq!(decision.issue_code.as_deref(), Some("water_leak"));
        assert_eq!(decision.confidence, Confidence::High);
        assert_eq!(decision.priority, Some(TicketPriority::High));
        assert!(decision.escalation_used);
        assert!(decision.escalation_accepted);
        // Rule context survives the override.
        assert_eq!(decision.rule_result.skill_group, SkillGroup::Technical);
    }

    #[tokio::test]
    async fn gateway_failure_keeps_the_rule_result() {
        let stub = StubGateway::failing();
        let resolver = resolver(Some(stub.clone()));

        let decision = resolver
            .resolve("bulb leaking water", &ResolvePolicy::default())
            .await;

        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert_eq!(decision.decision_source, DecisionSource::Rule);
        assert_eq!(decision.skill_group, SkillGroup::Technical);
        assert_eq!(decision.issue_code.as_deref(), Some("lighting_fault"));
        assert!(decision.escalation_used);
        assert!(!decision.escalation_accepted);
        assert_eq!(decision.zone, DecisionZone::Ambiguous);
    }

    #[tokio::test]
    async fn force_escalation_overrides_a_confident_zone() {
        let stub = StubGateway::answering(judgment(SkillGroup::Technical));
        let resolver = resolver(Some(stub.clone()));

        let policy = ResolvePolicy {
            force_escalation: true,
        };
        let decision = resolver.resolve("aircon not cooling today", &policy).await;

        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert_eq!(decision.decision_source, DecisionSource::Llm);
        assert_eq!(decision.zone, DecisionZone::Confident);
        // Same group as the rules, so the rule issue code is kept.
        assert_eq!(decision.issue_code.as_deref(), Some("ac_breakdown"));
    }

    #[tokio::test]
    async fn missing_gateway_stays_on_rules() {
        let resolver = resolver(None);

        let decision = resolver
            .resolve("bulb leaking water", &ResolvePolicy::default())
            .await;

        assert_eq!(decision.decision_source, DecisionSource::Rule);
        assert!(!decision.escalation_used);
        assert_eq!(decision.zone, DecisionZone::Ambiguous);
    }

    #[tokio::test]
    async fn unmatched_ticket_offers_every_group_as_candidate() {
        let stub = StubGateway::answering(judgment(SkillGroup::Vendor));
        let resolver = resolver(Some(stub.clone()));

        let decision = resolver
            .resolve("nothing matches this text", &ResolvePolicy::default())
            .await;

        let request = stub.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.candidate_buckets.len(), 4);
        assert_eq!(decision.skill_group, SkillGroup::Vendor);
        // The rules never scored vendor, so no issue code can be derived.
        assert_eq!(decision.issue_code, None);
        assert_eq!(decision.zone, DecisionZone::Anomalous);
    }

    struct CapturingSink {
        seen: std::sync::Arc<Mutex<Vec<DecisionRecord>>>,
    }

    #[async_trait]
    impl AuditSink for CapturingSink {
        async fn record(&self, record: &DecisionRecord) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn every_resolution_emits_one_audit_record() {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let (handle, task) = spawn_writer(vec![Box::new(CapturingSink { seen: seen.clone() })]);
        let resolver = Resolver::new(fixture(), None, ResolverOptions::default(), handle);

        resolver
            .resolve("aircon not cooling today", &ResolvePolicy::default())
            .await;
        drop(resolver);
        task.await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].skill_group, SkillGroup::Technical);
        assert_eq!(seen[0].decision_source, DecisionSource::Rule);
    }
}
