//! Persistence for tasks.
//!
//! Every read and write takes a [`TaskFilter`], which always carries an
//! owner clause, so a store never touches another user's tasks.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::Database;

use crate::query::{SortSpec, TaskFilter};
use crate::types::{NewTask, Task, TaskChanges};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] refinery::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("conflicting update: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Fields a count can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    Priority,
    Status,
}

impl GroupField {
    pub fn column(self) -> &'static str {
        match self {
            GroupField::Priority => "priority",
            GroupField::Status => "status",
        }
    }
}

/// Task persistence.
///
/// `update_one` and `delete_one` act atomically on at most one task
/// matching the filter and return `None` when nothing matched.
pub trait TaskStore: Send + Sync {
    /// All matching tasks in `sort` order. Ties keep insertion order.
    fn find(&self, filter: &TaskFilter, sort: &SortSpec) -> StoreResult<Vec<Task>>;

    fn find_one(&self, filter: &TaskFilter) -> StoreResult<Option<Task>>;

    /// Persist a new task, assigning its id and timestamps.
    fn insert(&self, task: NewTask) -> StoreResult<Task>;

    /// Apply `changes` to the matching task and return it as stored afterwards.
    fn update_one(&self, filter: &TaskFilter, changes: &TaskChanges)
    -> StoreResult<Option<Task>>;

    /// Remove the matching task and return it as it was.
    fn delete_one(&self, filter: &TaskFilter) -> StoreResult<Option<Task>>;

    fn count(&self, filter: &TaskFilter) -> StoreResult<u64>;

    /// Count matching tasks per distinct value of `field`.
    fn aggregate_by_field(
        &self,
        filter: &TaskFilter,
        field: GroupField,
    ) -> StoreResult<BTreeMap<String, u64>>;
}
