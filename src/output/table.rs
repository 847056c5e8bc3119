use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::assignment::{AssignmentStatus, AssignmentSummary};
use crate::audit::AuditLogEntry;
use crate::classifier::DecisionZone;
use crate::dictionary::{Confidence, DictionarySummary};
use crate::resolver::ResolvedClassification;
use crate::roster::WorkerSkillEntry;

pub fn render_classification_table(decision: &ResolvedClassification) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Skill Group",
        "Issue Code",
        "Confidence",
        "Zone",
        "Source",
        "Escalated",
    ]);

    let confidence_cell = match decision.confidence {
        Confidence::High => Cell::new(decision.confidence.to_string()).fg(Color::Green),
        Confidence::Low => Cell::new(decision.confidence.to_string()).fg(Color::Yellow),
    };
    let zone_cell = match decision.zone {
        DecisionZone::Confident => Cell::new(decision.zone.to_string()).fg(Color::Green),
        DecisionZone::Ambiguous => Cell::new(decision.zone.to_string()).fg(Color::Yellow),
        DecisionZone::Anomalous => Cell::new(decision.zone.to_string()).fg(Color::Red),
    };
    table.add_row(Row::from(vec![
        Cell::new(decision.skill_group.to_string()),
        Cell::new(decision.issue_code.clone().unwrap_or_else(|| "-".to_string())),
        confidence_cell,
        zone_cell,
        Cell::new(decision.decision_source.to_string().to_uppercase()),
        Cell::new(if decision.escalation_used { "YES" } else { "NO" }),
    ]));

    let scores = &decision.rule_result.scores.groups;
    let score_line = if scores.is_empty() {
        "none".to_string()
    } else {
        scores
            .iter()
            .map(|(group, points)| format!("{}={points}", group.as_slug()))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut out = String::new();
    out.push_str(&table.to_string());
    out.push_str(&format!(
        "\nRule scores: {score_line}\nZone reason: {}",
        decision.confidence_analysis.reason
    ));
    if let Some(secondary) = decision.secondary_skill_group {
        out.push_str(&format!("\nSecondary skill group: {secondary}"));
    }
    if let Some(priority) = &decision.priority {
        out.push_str(&format!("\nSuggested priority: {priority}"));
    }
    if let Some(flag) = &decision.risk_flag {
        out.push_str(&format!("\nRisk flag: {flag}"));
    }
    if let Some(rationale) = &decision.rationale {
        out.push_str(&format!("\nGateway rationale: {rationale}"));
    }
    out
}

pub fn render_assignment_table(summary: &AssignmentSummary) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Ticket", "Status", "Worker", "Detail"]);

    for decision in &summary.decisions {
        let status = decision.status.to_string().to_uppercase();
        let status_cell = match decision.status {
            AssignmentStatus::Assigned => Cell::new(status).fg(Color::Green),
            AssignmentStatus::Waitlisted => Cell::new(status).fg(Color::Yellow),
            AssignmentStatus::Error => Cell::new(status).fg(Color::Red),
        };
        table.add_row(Row::from(vec![
            Cell::new(decision.ticket_id.clone()),
            status_cell,
            Cell::new(
                decision
                    .assigned_worker_id
                    .clone()
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(decision.error.clone().unwrap_or_else(|| "-".to_string())),
        ]));
    }

    let mut out = String::new();
    out.push_str(&table.to_string());
    out.push_str(&format!(
        "\nAssigned {}/{} tickets, {} waitlisted, {} errors",
        summary.assigned, summary.total, summary.waitlisted, summary.errors
    ));
    out
}

pub fn render_roster_table(entries: &[WorkerSkillEntry]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Worker",
        "Property",
        "Skill Group",
        "Available",
        "Checked In",
        "Last Assigned",
    ]);

    for entry in entries {
        let available = if entry.is_available { "YES" } else { "NO" };
        let available_cell = if entry.is_available {
            Cell::new(available).fg(Color::Green)
        } else {
            Cell::new(available).fg(Color::Red)
        };
        table.add_row(Row::from(vec![
            Cell::new(entry.worker_id.clone()),
            Cell::new(entry.property_id.clone()),
            Cell::new(entry.skill_group.to_string()),
            available_cell,
            Cell::new(if entry.is_checked_in { "YES" } else { "NO" }),
            Cell::new(
                entry
                    .last_assigned_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]));
    }
    table.to_string()
}

pub fn render_dictionary_table(summary: &DictionarySummary) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Rank", "Skill Group", "Issues", "Keywords"]);

    for (idx, group) in summary.precedence.iter().enumerate() {
        let Some(section) = summary.sections.iter().find(|s| s.group == *group) else {
            continue;
        };
        table.add_row(vec![
            (idx + 1).to_string(),
            group.to_string(),
            section.issue_count.to_string(),
            section.keyword_count.to_string(),
        ]);
    }

    let mut out = String::new();
    out.push_str(&table.to_string());
    out.push_str(&format!(
        "\nFallback: {} at {} confidence",
        summary.fallback.skill_group, summary.fallback.confidence
    ));
    out
}

pub fn render_audit_table(entries: &[AuditLogEntry]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Recorded At",
        "Skill Group",
        "Issue",
        "Confidence",
        "Zone",
        "Source",
        "Escalated",
        "Preview",
    ]);

    for entry in entries {
        table.add_row(vec![
            entry.recorded_at.to_rfc3339(),
            entry.skill_group.to_string(),
            entry
                .issue_code
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            entry.confidence.to_string(),
            entry.zone.letter().to_string(),
            entry.decision_source.to_string(),
            if entry.escalation_used { "YES" } else { "NO" }.to_string(),
            entry.text_preview.clone(),
        ]);
    }
    table.to_string()
}
