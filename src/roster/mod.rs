use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dictionary::SkillGroup;

/// One (worker, property, skill) row of the roster. A worker certified for
/// several skills appears once per skill; availability and presence live on
/// the row, the fairness timestamp is read per worker across all rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerSkillEntry {
    pub worker_id: String,
    pub property_id: String,
    pub skill_group: SkillGroup,
    pub is_available: bool,
    pub is_checked_in: bool,
    pub last_assigned_at: Option<DateTime<Utc>>,
}

/// In-memory view of one property's roster for the duration of a batch.
/// Rows are referenced by index so ordering and narrowing stay cheap.
#[derive(Debug, Clone, Default)]
pub struct SkillIndex {
    entries: Vec<WorkerSkillEntry>,
}

impl SkillIndex {
    pub fn new(entries: Vec<WorkerSkillEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[WorkerSkillEntry] {
        &self.entries
    }

    pub fn entry(&self, row: usize) -> Option<&WorkerSkillEntry> {
        self.entries.get(row)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Available rows certified for the requested skill.
    pub fn skill_pool(&self, group: SkillGroup) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.skill_group == group && entry.is_available)
            .map(|(row, _)| row)
            .collect()
    }

    /// Every available worker exactly once, regardless of skill. The first
    /// row per worker stands in for the whole worker.
    pub fn general_pool(&self) -> Vec<usize> {
        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        for (row, entry) in self.entries.iter().enumerate() {
            if entry.is_available && seen.insert(entry.worker_id.as_str()) {
                rows.push(row);
            }
        }
        rows
    }

    /// If anyone in the pool is on site, the pool shrinks to those who are.
    /// A pool with nobody checked in stays as it is.
    pub fn narrow_checked_in(&self, rows: &mut Vec<usize>) {
        if rows.iter().any(|row| self.entries[*row].is_checked_in) {
            rows.retain(|row| self.entries[*row].is_checked_in);
        }
    }

    /// Least recently assigned first, never-assigned before everyone, ties
    /// broken by worker id so batch output is reproducible.
    pub fn order_fair(&self, rows: &mut Vec<usize>) {
        rows.sort_by_cached_key(|row| {
            let entry = &self.entries[*row];
            let effective = self.effective_last_assigned(&entry.worker_id);
            (effective.is_some(), effective, entry.worker_id.clone())
        });
    }

    /// Most recent assignment across every row of the worker. Reading the
    /// maximum keeps a multi-skill worker from looking idle on one row right
    /// after being assigned through another.
    pub fn effective_last_assigned(&self, worker_id: &str) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .filter(|entry| entry.worker_id == worker_id)
            .filter_map(|entry| entry.last_assigned_at)
            .max()
    }

    /// Advances the in-memory timestamp so the next ticket in the same batch
    /// sees this worker as just assigned.
    pub fn mark_assigned(&mut self, row: usize, at: DateTime<Utc>) {
        if let Some(entry) = self.entries.get_mut(row) {
            entry.last_assigned_at = Some(at);
        }
    }
}
