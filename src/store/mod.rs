pub mod migrations;

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::audit::{AuditLogEntry, DecisionRecord};
use crate::dictionary::SkillGroup;
use crate::resolver::DecisionSource;
use crate::roster::{SkillIndex, WorkerSkillEntry};
use crate::store::migrations::BASE_MIGRATION;

/// SQLite persistence for the roster, the assignment history and the
/// decision audit trail. One connection per caller; the claim update is the
/// only place where two connections race on purpose.
pub struct TriageStore {
    conn: Connection,
}

impl TriageStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    /// Registers or updates one (worker, property, skill) row. Re-upserting
    /// never resets the fairness timestamp.
    pub fn upsert_worker(&self, entry: &WorkerSkillEntry) -> Result<()> {
        self.conn.execute(
            r#"
INSERT INTO worker_skills(
    worker_id, property_id, skill_group, is_available, is_checked_in, last_assigned_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(worker_id, property_id, skill_group)
DO UPDATE SET is_available = excluded.is_available,
              is_checked_in = excluded.is_checked_in
"#,
            params![
                entry.worker_id,
                entry.property_id,
                entry.skill_group.as_slug(),
                entry.is_available,
                entry.is_checked_in,
                entry.last_assigned_at.map(|at| at.to_rfc3339())
            ],
        )?;
        Ok(())
    }

    /// Flips presence or availability across every skill row of one worker.
    /// Returns how many rows were touched so callers can spot unknown ids.
    pub fn set_presence(
        &self,
        worker_id: &str,
        property_id: &str,
        checked_in: Option<bool>,
        available: Option<bool>,
    ) -> Result<usize> {
        let changed = self.conn.execute(
            r#"
UPDATE worker_skills
SET is_checked_in = COALESCE(?3, is_checked_in),
    is_available = COALESCE(?4, is_available)
WHERE worker_id = ?1 AND property_id = ?2
"#,
            params![worker_id, property_id, checked_in, available],
        )?;
        Ok(changed)
    }

    pub fn list_workers(&self, property_id: &str) -> Result<Vec<WorkerSkillEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT worker_id, property_id, skill_group, is_available, is_checked_in, last_assigned_at
FROM worker_skills
WHERE property_id = ?1
ORDER BY worker_id, skill_group
"#,
        )?;
        let rows = stmt
            .query_map(params![property_id], row_to_worker_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn load_skill_index(&self, property_id: &str) -> Result<SkillIndex> {
        Ok(SkillIndex::new(self.list_workers(property_id)?))
    }

    /// Compare-and-set on the fairness timestamp. The update only lands when
    /// the row still carries the timestamp the batch read, so two engines
    /// can never hand the same idle slot to different tickets.
    pub fn claim_worker(
        &self,
        entry: &WorkerSkillEntry,
        assigned_at: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self.conn.execute(
            r#"
UPDATE worker_skills
SET last_assigned_at = ?4
WHERE worker_id = ?1 AND property_id = ?2 AND skill_group = ?3
  AND last_assigned_at IS ?5
"#,
            params![
                entry.worker_id,
                entry.property_id,
                entry.skill_group.as_slug(),
                assigned_at.to_rfc3339(),
                entry.last_assigned_at.map(|at| at.to_rfc3339())
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn record_assignment(
        &self,
        ticket_id: &str,
        entry: &WorkerSkillEntry,
        assigned_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            r#"
INSERT INTO assignment_history(ticket_id, property_id, worker_id, skill_group, assigned_at)
VALUES (?1, ?2, ?3, ?4, ?5)
"#,
            params![
                ticket_id,
                entry.property_id,
                entry.worker_id,
                entry.skill_group.as_slug(),
                assigned_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn assignments_for_ticket(&self, ticket_id: &str) -> Result<Vec<AssignmentRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT ticket_id, property_id, worker_id, skill_group, assigned_at
FROM assignment_history
WHERE ticket_id = ?1
ORDER BY id
"#,
        )?;
        let rows = stmt
            .query_map(params![ticket_id], row_to_assignment_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn insert_decision(&self, record: &DecisionRecord) -> Result<()> {
        self.conn.execute(
            r#"
INSERT INTO decision_audit(
    recorded_at, text_digest, text_preview, skill_group, issue_code,
    confidence, zone, decision_source, escalation_used, escalation_accepted, detail_json
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#,
            params![
                record.recorded_at.to_rfc3339(),
                record.text_digest,
                record.text_preview,
                record.skill_group.as_slug(),
                record.issue_code,
                record.confidence.to_string(),
                record.zone.as_slug(),
                record.decision_source.to_string(),
                record.escalation_used,
                record.escalation_accepted,
                serde_json::to_string(&record.detail)?
            ],
        )?;
        Ok(())
    }

    pub fn recent_decisions(&self, limit: usize) -> Result<Vec<AuditLogEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT recorded_at, skill_group, issue_code, confidence, zone, decision_source,
       escalation_used, text_preview
FROM decision_audit
ORDER BY id DESC
LIMIT ?1
"#,
        )?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_audit_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Row from the assignment history.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct AssignmentRecord {
    pub ticket_id: String,
    pub property_id: String,
    pub worker_id: String,
    pub skill_group: SkillGroup,
    pub assigned_at: DateTime<Utc>,
}

fn row_to_worker_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkerSkillEntry> {
    let group_raw: String = row.get(2)?;
    let last_raw: Option<String> = row.get(5)?;
    Ok(WorkerSkillEntry {
        worker_id: row.get(0)?,
        property_id: row.get(1)?,
        skill_group: group_raw.parse().unwrap_or(SkillGroup::SoftService),
        is_available: row.get::<_, i64>(3)? != 0,
        is_checked_in: row.get::<_, i64>(4)? != 0,
        last_assigned_at: parse_timestamp(last_raw.as_deref()),
    })
}

fn row_to_assignment_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssignmentRecord> {
    let group_raw: String = row.get(3)?;
    let assigned_raw: String = row.get(4)?;
    Ok(AssignmentRecord {
        ticket_id: row.get(0)?,
        property_id: row.get(1)?,
        worker_id: row.get(2)?,
        skill_group: group_raw.parse().unwrap_or(SkillGroup::SoftService),
        assigned_at: parse_timestamp(Some(&assigned_raw)).unwrap_or_else(Utc::now),
    })
}

fn row_to_audit_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditLogEntry> {
    use crate::classifier::DecisionZone;
    use crate::dictionary::Confidence;

    let group_raw: String = row.get(1)?;
    let confidence_raw: String = row.get(3)?;
    let zone_raw: String = row.get(4)?;
    let source_raw: String = row.get(5)?;
    let recorded_raw: String = row.get(0)?;
    Ok(AuditLogEntry {
        recorded_at: parse_timestamp(Some(&recorded_raw)).unwrap_or_else(Utc::now),
        skill_group: group_raw.parse().unwrap_or(SkillGroup::SoftService),
        issue_code: row.get(2)?,
        confidence: confidence_raw.parse().unwrap_or(Confidence::Low),
        zone: zone_raw.parse().unwrap_or(DecisionZone::Anomalous),
        decision_source: source_raw.parse().unwrap_or(DecisionSource::Rule),
        escalation_used: row.get::<_, i64>(6)? != 0,
        text_preview: row.get(7)?,
    })
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;

    fn open_store(dir: &TempDir) -> TriageStore {
        TriageStore::open(&dir.path().join("triage.db")).unwrap()
    }

    fn entry(worker: &str, group: SkillGroup) -> WorkerSkillEntry {
        WorkerSkillEntry {
            worker_id: worker.to_string(),
            property_id: "p1".to_string(),
            skill_group: group,
            is_available: true,
            is_checked_in: false,
            last_assigned_at: None,
        }
    }

    #[test]
    fn upsert_and_list_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.upsert_worker(&entry("w1", SkillGroup::Plumbing)).unwrap();
        store.upsert_worker(&entry("w1", SkillGroup::Technical)).unwrap();
        store.upsert_worker(&entry("w2", SkillGroup::Vendor)).unwrap();

        let workers = store.list_workers("p1").unwrap();
        assert_eq!(workers.len(), 3);
        assert_eq!(workers[0].worker_id, "w1");
        assert_eq!(workers[0].skill_group, SkillGroup::Plumbing);
        assert!(store.list_workers("p2").unwrap().is_empty());
    }

    #[test]
    fn upsert_keeps_the_fairness_timestamp() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let worker = entry("w1", SkillGroup::Plumbing);

        store.upsert_worker(&worker).unwrap();
        let assigned_at = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        assert!(store.claim_worker(&worker, assigned_at).unwrap());

        // Re-registering with fresh flags must not reset the timestamp.
        let mut again = entry("w1", SkillGroup::Plumbing);
        again.is_checked_in = true;
        store.upsert_worker(&again).unwrap();

        let workers = store.list_workers("p1").unwrap();
        assert_eq!(workers[0].last_assigned_at, Some(assigned_at));
        assert!(workers[0].is_checked_in);
    }

    #[test]
    fn claim_is_compare_and_set() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let worker = entry("w1", SkillGroup::Plumbing);
        store.upsert_worker(&worker).unwrap();

        let first = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        assert!(store.claim_worker(&worker, first).unwrap());

        // Second claim still carries the stale None timestamp and must lose.
        let second = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 1).unwrap();
        assert!(!store.claim_worker(&worker, second).unwrap());

        // Claiming from the fresh timestamp wins again.
        let mut fresh = worker.clone();
        fresh.last_assigned_at = Some(first);
        assert!(store.claim_worker(&fresh, second).unwrap());
    }

    #[test]
    fn presence_touches_every_skill_row_of_the_worker() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.upsert_worker(&entry("w1", SkillGroup::Plumbing)).unwrap();
        store.upsert_worker(&entry("w1", SkillGroup::Technical)).unwrap();

        let touched = store.set_presence("w1", "p1", Some(true), None).unwrap();
        assert_eq!(touched, 2);
        assert!(store.list_workers("p1").unwrap().iter().all(|w| w.is_checked_in));

        assert_eq!(store.set_presence("ghost", "p1", Some(true), None).unwrap(), 0);
    }

    #[test]
    fn assignment_history_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let worker = entry("w1", SkillGroup::Plumbing);
        let assigned_at = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();

        store.record_assignment("t-17", &worker, assigned_at).unwrap();
        let records = store.assignments_for_ticket("t-17").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].worker_id, "w1");
        assert_eq!(records[0].assigned_at, assigned_at);
        assert!(store.assignments_for_ticket("t-404").unwrap().is_empty());
    }
}
