use anyhow::Result;

use crate::assignment::AssignmentSummary;
use crate::audit::AuditLogEntry;
use crate::roster::WorkerSkillEntry;

pub fn assignments_to_csv(summary: &AssignmentSummary) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["ticket_id", "status", "worker_id", "error"])?;
    for decision in &summary.decisions {
        writer.write_record([
            decision.ticket_id.clone(),
            decision.status.to_string(),
            decision.assigned_worker_id.clone().unwrap_or_default(),
            decision.error.clone().unwrap_or_default(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn roster_to_csv(entries: &[WorkerSkillEntry]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "worker_id",
        "property_id",
        "skill_group",
        "is_available",
        "is_checked_in",
        "last_assigned_at",
    ])?;
    for entry in entries {
        writer.write_record([
            entry.worker_id.clone(),
            entry.property_id.clone(),
            entry.skill_group.as_slug().to_string(),
            entry.is_available.to_string(),
            entry.is_checked_in.to_string(),
            entry
                .last_assigned_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn audit_to_csv(entries: &[AuditLogEntry]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "recorded_at",
        "skill_group",
        "issue_code",
        "confidence",
        "zone",
        "decision_source",
        "escalation_used",
        "text_preview",
    ])?;
    for entry in entries {
        writer.write_record([
            entry.recorded_at.to_rfc3339(),
            entry.skill_group.as_slug().to_string(),
            entry.issue_code.clone().unwrap_or_default(),
            entry.confidence.to_string(),
            entry.zone.as_slug().to_string(),
            entry.decision_source.to_string(),
            entry.escalation_used.to_string(),
            entry.text_preview.clone(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
