//! In-process task store. Contents are lost when the process exits.

use super::{GroupField, StoreError, StoreResult, TaskStore};
use crate::query::{SortSpec, TaskFilter};
use crate::types::{NewTask, Task, TaskChanges, TaskId, now};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Tasks kept in insertion order behind a single lock.
#[derive(Default)]
pub struct MemoryStore {
    tasks: Mutex<Vec<Task>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Vec<Task>>> {
        self.tasks.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl TaskStore for MemoryStore {
    fn find(&self, filter: &TaskFilter, sort: &SortSpec) -> StoreResult<Vec<Task>> {
        let tasks = self.lock()?;
        let mut found: Vec<Task> = tasks.iter().filter(|t| filter.matches(t)).cloned().collect();
        found.sort_by(|a, b| sort.compare(a, b));
        Ok(found)
    }

    fn find_one(&self, filter: &TaskFilter) -> StoreResult<Option<Task>> {
        Ok(self.lock()?.iter().find(|t| filter.matches(t)).cloned())
    }

    fn insert(&self, new: NewTask) -> StoreResult<Task> {
        let created = now();
        let task = Task {
            id: TaskId::generate(),
            owner: new.owner,
            title: new.title,
            description: new.description,
            priority: new.priority,
            status: Default::default(),
            due_date: new.due_date,
            created_at: created,
            updated_at: created,
        };
        self.lock()?.push(task.clone());
        Ok(task)
    }

    fn update_one(
        &self,
        filter: &TaskFilter,
        changes: &TaskChanges,
    ) -> StoreResult<Option<Task>> {
        let mut tasks = self.lock()?;
        Ok(tasks.iter_mut().find(|t| filter.matches(t)).map(|task| {
            changes.apply(task, now());
            task.clone()
        }))
    }

    fn delete_one(&self, filter: &TaskFilter) -> StoreResult<Option<Task>> {
        let mut tasks = self.lock()?;
        Ok(tasks
            .iter()
            .position(|t| filter.matches(t))
            .map(|index| tasks.remove(index)))
    }

    fn count(&self, filter: &TaskFilter) -> StoreResult<u64> {
        Ok(self.lock()?.iter().filter(|t| filter.matches(t)).count() as u64)
    }

    fn aggregate_by_field(
        &self,
        filter: &TaskFilter,
        field: GroupField,
    ) -> StoreResult<BTreeMap<String, u64>> {
        let mut groups = BTreeMap::new();
        for task in self.lock()?.iter().filter(|t| filter.matches(t)) {
            let key = match field {
                GroupField::Priority => task.priority.as_str(),
                GroupField::Status => task.status.as_str(),
            };
            *groups.entry(key.to_string()).or_insert(0) += 1;
        }
        Ok(groups)
    }
}
