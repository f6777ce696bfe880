//! Owner-scoped task operations.

use crate::config::QueryConfig;
use crate::error::TaskError;
use crate::query::{ListParams, TaskFilter, build_list_query};
use crate::stats::compute_stats;
use crate::store::{StoreError, TaskStore};
use crate::types::{Task, TaskChanges, TaskId, TaskStats, UserId, now};
use crate::validate::{CreateTaskRequest, UpdateTaskRequest, validate_create, validate_update};
use std::sync::Arc;
use tracing::{debug, info};

/// Attempts a status toggle makes before giving up on a contended task.
const TOGGLE_ATTEMPTS: usize = 3;

pub struct TaskService {
    store: Arc<dyn TaskStore>,
    query_config: QueryConfig,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, query_config: QueryConfig) -> Self {
        Self {
            store,
            query_config,
        }
    }

    /// Parse a client-supplied id into a filter on the caller's task.
    fn scoped(caller: &UserId, raw_id: &str) -> Result<(TaskId, TaskFilter), TaskError> {
        let id = TaskId::parse(raw_id)?;
        Ok((id, TaskFilter::owned_by(caller).with_id(id)))
    }

    pub fn list(&self, caller: &UserId, params: &ListParams) -> Result<Vec<Task>, TaskError> {
        let query = build_list_query(caller, params, &self.query_config, now())?;
        let tasks = self.store.find(&query.filter, &query.sort)?;
        debug!(caller = %caller, count = tasks.len(), "Listed tasks");
        Ok(tasks)
    }

    pub fn stats(&self, caller: &UserId) -> Result<TaskStats, TaskError> {
        Ok(compute_stats(self.store.as_ref(), caller, now())?)
    }

    pub fn get(&self, caller: &UserId, raw_id: &str) -> Result<Task, TaskError> {
        let (id, filter) = Self::scoped(caller, raw_id)?;
        self.store
            .find_one(&filter)?
            .ok_or(TaskError::NotFound(id))
    }

    pub fn create(&self, caller: &UserId, request: &CreateTaskRequest) -> Result<Task, TaskError> {
        let new = validate_create(caller, request)?;
        let task = self.store.insert(new)?;
        info!(caller = %caller, task_id = %task.id, "Created task");
        Ok(task)
    }

    pub fn update(
        &self,
        caller: &UserId,
        raw_id: &str,
        request: &UpdateTaskRequest,
    ) -> Result<Task, TaskError> {
        let (id, filter) = Self::scoped(caller, raw_id)?;
        let changes = validate_update(request)?;
        let task = self
            .store
            .update_one(&filter, &changes)?
            .ok_or(TaskError::NotFound(id))?;
        info!(caller = %caller, task_id = %task.id, "Updated task");
        Ok(task)
    }

    /// Flip pending and completed.
    ///
    /// The write is conditioned on the status that was read, so two
    /// concurrent toggles never collapse into one.
    pub fn toggle_status(&self, caller: &UserId, raw_id: &str) -> Result<Task, TaskError> {
        let (id, filter) = Self::scoped(caller, raw_id)?;

        for attempt in 1..=TOGGLE_ATTEMPTS {
            let current = self
                .store
                .find_one(&filter)?
                .ok_or(TaskError::NotFound(id))?;

            let observed = filter.clone().with_status(current.status);
            let changes = TaskChanges::status(current.status.toggled());
            if let Some(task) = self.store.update_one(&observed, &changes)? {
                info!(
                    caller = %caller,
                    task_id = %task.id,
                    status = %task.status,
                    "Toggled task status"
                );
                return Ok(task);
            }
            debug!(caller = %caller, task_id = %current.id, attempt, "Status changed underneath toggle, retrying");
        }

        Err(StoreError::Conflict(format!("status of task {} kept changing during toggle", id)).into())
    }

    pub fn delete(&self, caller: &UserId, raw_id: &str) -> Result<Task, TaskError> {
        let (id, filter) = Self::scoped(caller, raw_id)?;
        let task = self
            .store
            .delete_one(&filter)?
            .ok_or(TaskError::NotFound(id))?;
        info!(caller = %caller, task_id = %task.id, "Deleted task");
        Ok(task)
    }
}
