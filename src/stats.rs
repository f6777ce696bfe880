//! Per-user summary statistics.

use crate::query::TaskFilter;
use crate::store::{GroupField, StoreResult, TaskStore};
use crate::types::{Priority, TaskStats, TaskStatus, UserId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::warn;

/// Compute the caller's statistics from independent counts.
///
/// Counts are not taken in a single snapshot, so a concurrent write may be
/// visible in one count and not another.
pub fn compute_stats(
    store: &dyn TaskStore,
    owner: &UserId,
    now: DateTime<Utc>,
) -> StoreResult<TaskStats> {
    let all = TaskFilter::owned_by(owner);

    let total_tasks = store.count(&all)?;
    let completed_tasks = store.count(&all.clone().with_status(TaskStatus::Completed))?;
    let pending_tasks = store.count(&all.clone().with_status(TaskStatus::Pending))?;
    let overdue_tasks = store.count(
        &all.clone()
            .with_status(TaskStatus::Pending)
            .due_before(now),
    )?;

    let mut tasks_by_priority = BTreeMap::new();
    for (key, count) in store.aggregate_by_field(&all, GroupField::Priority)? {
        match key.parse::<Priority>() {
            Ok(priority) => {
                tasks_by_priority.insert(priority, count);
            }
            Err(_) => warn!(owner = %owner, priority = %key, "Skipping unknown priority group"),
        }
    }

    Ok(TaskStats {
        total_tasks,
        completed_tasks,
        pending_tasks,
        completion_rate: completion_rate(completed_tasks, total_tasks),
        tasks_by_priority,
        overdue_tasks,
    })
}

/// Percentage of completed tasks, rounded half away from zero; 0 when there are none.
pub fn completion_rate(completed: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (completed as f64 / total as f64 * 100.0).round() as u32
}
