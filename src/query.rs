//! Translation of list parameters into an owner-scoped filter and a sort.
//!
//! [`TaskFilter::owned_by`] is the only way to construct a filter, so every
//! query and mutation that reaches a store carries an owner clause.

use crate::config::QueryConfig;
use crate::error::FieldError;
use crate::types::{Priority, Task, TaskId, TaskStatus, UserId, parse_date};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::cmp::Ordering;

/// Raw list parameters as received from the caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub created_from: Option<String>,
    pub created_to: Option<String>,
    pub overdue: Option<String>,
}

/// Conjunction of constraints on a user's tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFilter {
    owner: UserId,
    id: Option<TaskId>,
    status: Option<TaskStatus>,
    priority: Option<Priority>,
    due_before: Option<DateTime<Utc>>,
    created_from: Option<DateTime<Utc>>,
    created_to: Option<DateTime<Utc>>,
    /// Set when the constraints contradict each other or name a value no
    /// task can hold.
    unsatisfiable: bool,
}

impl TaskFilter {
    /// All tasks owned by `owner`.
    pub fn owned_by(owner: &UserId) -> Self {
        Self {
            owner: owner.clone(),
            id: None,
            status: None,
            priority: None,
            due_before: None,
            created_from: None,
            created_to: None,
            unsatisfiable: false,
        }
    }

    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    /// Constraints conjoin: a second, different status matches nothing.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        if self.status.is_some_and(|s| s != status) {
            self.unsatisfiable = true;
        }
        self.status = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        if self.priority.is_some_and(|p| p != priority) {
            self.unsatisfiable = true;
        }
        self.priority = Some(priority);
        self
    }

    /// Force the filter to match no task, e.g. for a filter value outside
    /// the enumeration.
    pub fn match_nothing(mut self) -> Self {
        self.unsatisfiable = true;
        self
    }

    /// Only tasks that have a due date strictly before `instant`.
    pub fn due_before(mut self, instant: DateTime<Utc>) -> Self {
        self.due_before = Some(instant);
        self
    }

    /// Only tasks created within the inclusive range.
    pub fn created_between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_from = from;
        self.created_to = to;
        self
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn id(&self) -> Option<TaskId> {
        self.id
    }

    pub fn status(&self) -> Option<TaskStatus> {
        self.status
    }

    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    pub fn due_before_instant(&self) -> Option<DateTime<Utc>> {
        self.due_before
    }

    pub fn created_from(&self) -> Option<DateTime<Utc>> {
        self.created_from
    }

    pub fn created_to(&self) -> Option<DateTime<Utc>> {
        self.created_to
    }

    pub fn is_unsatisfiable(&self) -> bool {
        self.unsatisfiable
    }

    /// Evaluate the filter against a task in memory.
    pub fn matches(&self, task: &Task) -> bool {
        !self.unsatisfiable
            && task.owner == self.owner
            && self.id.is_none_or(|id| task.id == id)
            && self.status.is_none_or(|s| task.status == s)
            && self.priority.is_none_or(|p| task.priority == p)
            && self
                .due_before
                .is_none_or(|t| task.due_date.is_some_and(|due| due < t))
            && self.created_from.is_none_or(|t| task.created_at >= t)
            && self.created_to.is_none_or(|t| task.created_at <= t)
    }
}

/// Field a listing is ordered by.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    DueDate,
    Title,
    Priority,
    Status,
    /// A name no task field answers to. Stores return insertion order.
    Other(String),
}

impl SortField {
    pub const KNOWN: [&'static str; 6] =
        ["createdAt", "updatedAt", "dueDate", "title", "priority", "status"];

    pub fn parse(name: &str) -> Self {
        match name {
            "createdAt" | "created_at" => SortField::CreatedAt,
            "updatedAt" | "updated_at" => SortField::UpdatedAt,
            "dueDate" | "due_date" => SortField::DueDate,
            "title" => SortField::Title,
            "priority" => SortField::Priority,
            "status" => SortField::Status,
            other => SortField::Other(other.to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, SortField::Other(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Only the exact value `"desc"` selects descending order.
    pub fn from_param(order: Option<&str>) -> Self {
        match order {
            Some("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortSpec {
    /// Compare two tasks under this sort. Ties (and unknown fields) compare
    /// equal so a stable sort keeps insertion order.
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let ordering = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::DueDate => a.due_date.cmp(&b.due_date),
            SortField::Title => a.title.cmp(&b.title),
            SortField::Priority => a.priority.cmp(&b.priority),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
            SortField::Other(_) => Ordering::Equal,
        };
        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// A fully resolved listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filter: TaskFilter,
    pub sort: SortSpec,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Build the filter and sort for a caller's listing.
///
/// Every malformed parameter is reported, not just the first.
pub fn build_list_query(
    caller: &UserId,
    params: &ListParams,
    config: &QueryConfig,
    now: DateTime<Utc>,
) -> Result<ListQuery, Vec<FieldError>> {
    let mut errors = Vec::new();
    let mut filter = TaskFilter::owned_by(caller);

    if let Some(raw) = non_empty(params.status.as_ref()) {
        filter = match raw.parse::<TaskStatus>() {
            Ok(status) => filter.with_status(status),
            Err(_) => filter.match_nothing(),
        };
    }

    if let Some(raw) = non_empty(params.priority.as_ref()) {
        filter = match raw.parse::<Priority>() {
            Ok(priority) => filter.with_priority(priority),
            Err(_) => filter.match_nothing(),
        };
    }

    let mut range_bound = |field: &str, raw: Option<&String>| match non_empty(raw) {
        None => None,
        Some(raw) => {
            let parsed = parse_date(raw);
            if parsed.is_none() {
                errors.push(FieldError::new(
                    field,
                    format!("{} must be a valid date", field),
                ));
            }
            parsed
        }
    };
    let created_from = range_bound("createdFrom", params.created_from.as_ref());
    let created_to = range_bound("createdTo", params.created_to.as_ref());
    if created_from.is_some() || created_to.is_some() {
        filter = filter.created_between(created_from, created_to);
    }

    if non_empty(params.overdue.as_ref()) == Some("true") {
        filter = filter.with_status(TaskStatus::Pending).due_before(now);
    }

    let field = non_empty(params.sort_by.as_ref())
        .map(SortField::parse)
        .unwrap_or_default();
    if config.strict_sort_fields && !field.is_known() {
        errors.push(FieldError::new(
            "sortBy",
            format!("sortBy must be one of {}", SortField::KNOWN.join(", ")),
        ));
    }
    let sort = SortSpec {
        field,
        order: SortOrder::from_param(params.order.as_deref()),
    };

    if errors.is_empty() {
        Ok(ListQuery { filter, sort })
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn caller() -> UserId {
        UserId::new("alice")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        let mut p = ListParams::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "status" => p.status = value,
                "priority" => p.priority = value,
                "sortBy" => p.sort_by = value,
                "order" => p.order = value,
                "createdFrom" => p.created_from = value,
                "createdTo" => p.created_to = value,
                "overdue" => p.overdue = value,
                other => panic!("unknown param {}", other),
            }
        }
        p
    }

    fn build(pairs: &[(&str, &str)]) -> Result<ListQuery, Vec<FieldError>> {
        build_list_query(&caller(), &params(pairs), &QueryConfig::default(), now())
    }

    #[test]
    fn no_params_scopes_to_owner_with_default_sort() {
        let query = build(&[]).unwrap();
        assert_eq!(query.filter, TaskFilter::owned_by(&caller()));
        assert_eq!(query.sort.field, SortField::CreatedAt);
        assert_eq!(query.sort.order, SortOrder::Asc);
    }

    #[test]
    fn status_and_priority_are_added_when_present() {
        let query = build(&[("status", "completed"), ("priority", "high")]).unwrap();
        assert_eq!(query.filter.owner(), &caller());
        assert_eq!(query.filter.status(), Some(TaskStatus::Completed));
        assert_eq!(query.filter.priority(), Some(Priority::High));
    }

    #[test]
    fn empty_filters_are_ignored() {
        let query = build(&[("status", ""), ("priority", "  "), ("sortBy", "")]).unwrap();
        assert_eq!(query.filter.status(), None);
        assert_eq!(query.filter.priority(), None);
        assert_eq!(query.sort.field, SortField::CreatedAt);
    }

    #[test]
    fn unknown_filter_values_match_nothing() {
        let query = build(&[("status", "done")]).unwrap();
        assert!(query.filter.is_unsatisfiable());
        let query = build(&[("priority", "urgent")]).unwrap();
        assert!(query.filter.is_unsatisfiable());
        assert!(!build(&[("status", "pending")]).unwrap().filter.is_unsatisfiable());
    }

    #[test]
    fn overdue_conjoins_with_status_filter() {
        let query = build(&[("status", "completed"), ("overdue", "true")]).unwrap();
        assert!(query.filter.is_unsatisfiable());

        let query = build(&[("status", "pending"), ("overdue", "true")]).unwrap();
        assert!(!query.filter.is_unsatisfiable());
        assert_eq!(query.filter.status(), Some(TaskStatus::Pending));
    }

    #[test]
    fn only_exact_desc_sorts_descending() {
        assert_eq!(build(&[("order", "desc")]).unwrap().sort.order, SortOrder::Desc);
        for order in ["asc", "", "DESC", "descending", "1", "-1"] {
            assert_eq!(
                build(&[("order", order)]).unwrap().sort.order,
                SortOrder::Asc,
                "order={:?}",
                order
            );
        }
    }

    #[test]
    fn sort_by_accepts_both_spellings_and_forwards_unknown_names() {
        assert_eq!(build(&[("sortBy", "dueDate")]).unwrap().sort.field, SortField::DueDate);
        assert_eq!(build(&[("sortBy", "due_date")]).unwrap().sort.field, SortField::DueDate);
        assert_eq!(
            build(&[("sortBy", "colour")]).unwrap().sort.field,
            SortField::Other("colour".to_string())
        );
    }

    #[test]
    fn strict_mode_rejects_unknown_sort_fields() {
        let config = QueryConfig {
            strict_sort_fields: true,
        };
        let errors =
            build_list_query(&caller(), &params(&[("sortBy", "colour")]), &config, now())
                .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "sortBy");

        assert!(
            build_list_query(&caller(), &params(&[("sortBy", "title")]), &config, now()).is_ok()
        );
    }

    #[test]
    fn overdue_restricts_to_pending_past_due() {
        let query = build(&[("overdue", "true")]).unwrap();
        assert_eq!(query.filter.status(), Some(TaskStatus::Pending));
        assert_eq!(query.filter.due_before_instant(), Some(now()));

        let query = build(&[("overdue", "false")]).unwrap();
        assert_eq!(query.filter.due_before_instant(), None);
    }

    #[test]
    fn created_range_is_parsed_and_validated() {
        let query = build(&[("createdFrom", "2025-01-01"), ("createdTo", "2025-01-31")]).unwrap();
        assert_eq!(
            query.filter.created_from(),
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
        assert!(query.filter.created_to().is_some());

        let errors = build(&[("createdFrom", "yesterday")]).unwrap_err();
        assert_eq!(errors[0].field, "createdFrom");
    }

    #[test]
    fn filter_matches_owner_and_constraints() {
        let created = now() - Duration::days(2);
        let task = Task {
            id: TaskId::generate(),
            owner: caller(),
            title: "Pay rent".to_string(),
            description: None,
            priority: Priority::High,
            status: TaskStatus::Pending,
            due_date: Some(now() - Duration::hours(1)),
            created_at: created,
            updated_at: created,
        };

        assert!(TaskFilter::owned_by(&caller()).matches(&task));
        assert!(!TaskFilter::owned_by(&UserId::new("bob")).matches(&task));
        assert!(TaskFilter::owned_by(&caller()).with_id(task.id).matches(&task));
        assert!(
            !TaskFilter::owned_by(&caller())
                .with_id(TaskId::generate())
                .matches(&task)
        );
        assert!(!TaskFilter::owned_by(&caller())
            .with_status(TaskStatus::Completed)
            .matches(&task));
        assert!(TaskFilter::owned_by(&caller()).due_before(now()).matches(&task));
        assert!(!TaskFilter::owned_by(&caller())
            .created_between(Some(now() - Duration::days(1)), None)
            .matches(&task));
        assert!(!TaskFilter::owned_by(&caller()).match_nothing().matches(&task));
        assert!(!TaskFilter::owned_by(&caller())
            .with_status(TaskStatus::Completed)
            .with_status(TaskStatus::Pending)
            .matches(&task));
    }

    #[test]
    fn compare_orders_priority_by_rank_and_status_lexically() {
        let base = Task {
            id: TaskId::generate(),
            owner: caller(),
            title: "a".to_string(),
            description: None,
            priority: Priority::Low,
            status: TaskStatus::Pending,
            due_date: None,
            created_at: now(),
            updated_at: now(),
        };
        let mut other = base.clone();
        other.priority = Priority::High;
        other.status = TaskStatus::Completed;

        let by_priority = SortSpec {
            field: SortField::Priority,
            order: SortOrder::Asc,
        };
        assert_eq!(by_priority.compare(&base, &other), Ordering::Less);

        let by_status = SortSpec {
            field: SortField::Status,
            order: SortOrder::Asc,
        };
        assert_eq!(by_status.compare(&base, &other), Ordering::Greater);

        let unknown = SortSpec {
            field: SortField::Other("colour".to_string()),
            order: SortOrder::Desc,
        };
        assert_eq!(unknown.compare(&base, &other), Ordering::Equal);
    }
}
