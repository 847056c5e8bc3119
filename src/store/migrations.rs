pub const BASE_MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS worker_skills (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    worker_id TEXT NOT NULL,
    property_id TEXT NOT NULL,
    skill_group TEXT NOT NULL,
    is_available INTEGER NOT NULL DEFAULT 1,
    is_checked_in INTEGER NOT NULL DEFAULT 0,
    last_assigned_at TEXT,
    UNIQUE(worker_id, property_id, skill_group)
);
CREATE INDEX IF NOT EXISTS idx_worker_skills_property_group
    ON worker_skills(property_id, skill_group);

CREATE TABLE IF NOT EXISTS assignment_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_id TEXT NOT NULL,
    property_id TEXT NOT NULL,
    worker_id TEXT NOT NULL,
    skill_group TEXT NOT NULL,
    assigned_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_assignment_history_ticket
    ON assignment_history(ticket_id);
CREATE INDEX IF NOT EXISTS idx_assignment_history_property_at
    ON assignment_history(property_id, assigned_at DESC);

CREATE TABLE IF NOT EXISTS decision_audit (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recorded_at TEXT NOT NULL,
    text_digest TEXT NOT NULL,
    text_preview TEXT NOT NULL,
    skill_group TEXT NOT NULL,
    issue_code TEXT,
    confidence TEXT NOT NULL,
    zone TEXT NOT NULL,
    decision_source TEXT NOT NULL,
    escalation_used INTEGER NOT NULL,
    escalation_accepted INTEGER NOT NULL,
    detail_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_decision_audit_recorded
    ON decision_audit(recorded_at DESC);
"#;
