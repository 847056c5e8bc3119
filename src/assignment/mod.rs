pub mod engine;

use std::fmt::{Display, Formatter};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dictionary::SkillGroup;
use crate::roster::WorkerSkillEntry;
use crate::store::TriageStore;

/// Ticket as the assignment engine sees it: an id plus the skill group the
/// classifier resolved for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketRef {
    pub ticket_id: String,
    pub skill_group: SkillGroup,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    Waitlisted,
    Error,
}

impl Display for AssignmentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Assigned => "assigned",
            Self::Waitlisted => "waitlisted",
            Self::Error => "error",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentDecision {
    pub ticket_id: String,
    pub status: AssignmentStatus,
    pub assigned_worker_id: Option<String>,
    pub error: Option<String>,
}

impl AssignmentDecision {
    pub fn assigned(ticket: &TicketRef, worker_id: String) -> Self {
        Self {
            ticket_id: ticket.ticket_id.clone(),
            status: AssignmentStatus::Assigned,
            assigned_worker_id: Some(worker_id),
            error: None,
        }
    }

    pub fn waitlisted(ticket: &TicketRef) -> Self {
        Self {
            ticket_id: ticket.ticket_id.clone(),
            status: AssignmentStatus::Waitlisted,
            assigned_worker_id: None,
            error: None,
        }
    }

    pub fn error(ticket: &TicketRef, message: String) -> Self {
        Self {
            ticket_id: ticket.ticket_id.clone(),
            status: AssignmentStatus::Error,
            assigned_worker_id: None,
            error: Some(message),
        }
    }
}

/// Batch outcome, one decision per ticket in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentSummary {
    pub total: usize,
    pub assigned: usize,
    pub waitlisted: usize,
    pub errors: usize,
    pub decisions: Vec<AssignmentDecision>,
}

impl AssignmentSummary {
    pub fn from_decisions(decisions: Vec<AssignmentDecision>) -> Self {
        let count = |status: AssignmentStatus| {
            decisions
                .iter()
                .filter(|decision| decision.status == status)
                .count()
        };
        Self {
            total: decisions.len(),
            assigned: count(AssignmentStatus::Assigned),
            waitlisted: count(AssignmentStatus::Waitlisted),
            errors: count(AssignmentStatus::Error),
            decisions,
        }
    }
}

/// Persistence seam the engine claims workers through. The claim must be
/// atomic against the timestamp the batch read; everything else is plain
/// bookkeeping.
pub trait AssignmentBackend {
    fn claim_worker(&self, entry: &WorkerSkillEntry, assigned_at: DateTime<Utc>) -> Result<bool>;
    fn record_assignment(
        &self,
        ticket: &TicketRef,
        entry: &WorkerSkillEntry,
        assigned_at: DateTime<Utc>,
    ) -> Result<()>;
}

impl AssignmentBackend for TriageStore {
    fn claim_worker(&self, entry: &WorkerSkillEntry, assigned_at: DateTime<Utc>) -> Result<bool> {
        TriageStore::claim_worker(self, entry, assigned_at)
    }

    fn record_assignment(
        &self,
        ticket: &TicketRef,
        entry: &WorkerSkillEntry,
        assigned_at: DateTime<Utc>,
    ) -> Result<()> {
        TriageStore::record_assignment(self, &ticket.ticket_id, entry, assigned_at)
    }
}
