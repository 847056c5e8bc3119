use anyhow::Result;
use chrono::Utc;
use tracing::{debug, warn};

use crate::assignment::{
    AssignmentBackend, AssignmentDecision, AssignmentSummary, TicketRef,
};
use crate::roster::SkillIndex;
use crate::store::TriageStore;

/// Assigns a batch in ticket order against one property's roster. Every
/// ticket sees the timestamps advanced by the tickets before it, which is
/// what spreads a burst across the pool instead of stacking one worker.
pub fn assign_batch(
    tickets: &[TicketRef],
    index: &mut SkillIndex,
    backend: &dyn AssignmentBackend,
) -> AssignmentSummary {
    let mut decisions = Vec::with_capacity(tickets.len());
    for ticket in tickets {
        decisions.push(assign_one(ticket, index, backend));
    }
    AssignmentSummary::from_decisions(decisions)
}

/// Loads the roster for one property and runs the batch against the store.
pub fn assign_property_batch(
    store: &TriageStore,
    property_id: &str,
    tickets: &[TicketRef],
) -> Result<AssignmentSummary> {
    let mut index = store.load_skill_index(property_id)?;
    Ok(assign_batch(tickets, &mut index, store))
}

fn assign_one(
    ticket: &TicketRef,
    index: &mut SkillIndex,
    backend: &dyn AssignmentBackend,
) -> AssignmentDecision {
    let mut rows = index.skill_pool(ticket.skill_group);
    if rows.is_empty() {
        debug!(
            "no available {} workers for ticket {}, widening to the general pool",
            ticket.skill_group, ticket.ticket_id
        );
        rows = index.general_pool();
    }
    if rows.is_empty() {
        return AssignmentDecision::waitlisted(ticket);
    }

    index.narrow_checked_in(&mut rows);
    index.order_fair(&mut rows);

    let assigned_at = Utc::now();
    for row in rows {
        let Some(entry) = index.entry(row).cloned() else {
            continue;
        };
        match backend.claim_worker(&entry, assigned_at) {
            Ok(true) => {
                index.mark_assigned(row, assigned_at);
                if let Err(error) = backend.record_assignment(ticket, &entry, assigned_at) {
                    warn!(
                        "claim for ticket {} landed but the history write failed: {error}",
                        ticket.ticket_id
                    );
                    return AssignmentDecision::error(
                        ticket,
                        format!("failed recording assignment to {}: {error}", entry.worker_id),
                    );
                }
                debug!("ticket {} assigned to {}", ticket.ticket_id, entry.worker_id);
                return AssignmentDecision::assigned(ticket, entry.worker_id);
            }
            Ok(false) => {
                debug!(
                    "lost the claim on {} for ticket {}, trying the next candidate",
                    entry.worker_id, ticket.ticket_id
                );
            }
            Err(error) => {
                warn!("claim failed for ticket {}: {error}", ticket.ticket_id);
                return AssignmentDecision::error(ticket, error.to_string());
            }
        }
    }

    AssignmentDecision::error(
        ticket,
        "every candidate was claimed by a concurrent batch".to_string(),
    )
}
