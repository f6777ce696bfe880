//! SQLite task store.

use super::{GroupField, StoreError, StoreResult, TaskStore};
use crate::query::{SortField, SortOrder, SortSpec, TaskFilter};
use crate::types::{NewTask, Task, TaskChanges, TaskId, UserId, now};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

const COLUMNS: &str =
    "id, owner, title, description, priority, status, due_date, created_at, updated_at";

/// Database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;",
        )?;

        Self::with_migrations(conn)
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_migrations(Connection::open_in_memory()?)
    }

    fn with_migrations(mut conn: Connection) -> StoreResult<Self> {
        embedded::migrations::runner().run(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute a function with exclusive access to the connection.
    fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn)
    }

    /// Execute a function with mutable access to the connection (for transactions).
    fn with_conn_mut<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut conn)
    }
}

fn to_ms(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

fn from_ms(ms: i64, column: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("{} out of range: {}", column, ms)))
}

/// Build a WHERE clause (without the keyword) and its positional parameters.
fn where_clause(filter: &TaskFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut sql = String::from("owner = ?");
    let mut params_vec: Vec<Box<dyn ToSql>> = vec![Box::new(filter.owner().as_str().to_string())];

    if let Some(id) = filter.id() {
        sql.push_str(" AND id = ?");
        params_vec.push(Box::new(id.to_string()));
    }
    if let Some(status) = filter.status() {
        sql.push_str(" AND status = ?");
        params_vec.push(Box::new(status.as_str()));
    }
    if let Some(priority) = filter.priority() {
        sql.push_str(" AND priority = ?");
        params_vec.push(Box::new(priority.as_str()));
    }
    if let Some(before) = filter.due_before_instant() {
        sql.push_str(" AND due_date IS NOT NULL AND due_date < ?");
        params_vec.push(Box::new(to_ms(before)));
    }
    if let Some(from) = filter.created_from() {
        sql.push_str(" AND created_at >= ?");
        params_vec.push(Box::new(to_ms(from)));
    }
    if let Some(to) = filter.created_to() {
        sql.push_str(" AND created_at <= ?");
        params_vec.push(Box::new(to_ms(to)));
    }
    if filter.is_unsatisfiable() {
        sql.push_str(" AND 0");
    }

    (sql, params_vec)
}

/// Build a safe ORDER BY expression. Ties fall back to insertion order.
fn order_clause(sort: &SortSpec) -> String {
    let field = match sort.field {
        SortField::CreatedAt => "created_at",
        SortField::UpdatedAt => "updated_at",
        SortField::DueDate => "due_date",
        SortField::Title => "title",
        SortField::Priority => {
            "CASE priority WHEN 'low' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END"
        }
        SortField::Status => "status",
        SortField::Other(_) => return "rowid ASC".to_string(),
    };

    let order = match sort.order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };

    format!("{} {}, rowid ASC", field, order)
}

/// Raw column values, converted to a [`Task`] outside the row callback so
/// malformed values surface as [`StoreError::Corrupt`].
struct TaskRow {
    id: String,
    owner: String,
    title: String,
    description: Option<String>,
    priority: String,
    status: String,
    due_date: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TaskRow {
    fn read(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            owner: row.get("owner")?,
            title: row.get("title")?,
            description: row.get("description")?,
            priority: row.get("priority")?,
            status: row.get("status")?,
            due_date: row.get("due_date")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> StoreResult<Self> {
        let corrupt = |what: &str, value: &str| {
            StoreError::Corrupt(format!("task {}: bad {} {:?}", row.id, what, value))
        };

        Ok(Task {
            id: TaskId::parse(&row.id).map_err(|_| corrupt("id", &row.id))?,
            owner: UserId::new(row.owner.clone()),
            title: row.title.clone(),
            description: row.description.clone(),
            priority: row
                .priority
                .parse()
                .map_err(|_| corrupt("priority", &row.priority))?,
            status: row
                .status
                .parse()
                .map_err(|_| corrupt("status", &row.status))?,
            due_date: row
                .due_date
                .map(|ms| from_ms(ms, "due_date"))
                .transpose()?,
            created_at: from_ms(row.created_at, "created_at")?,
            updated_at: from_ms(row.updated_at, "updated_at")?,
        })
    }
}

fn select_one(conn: &Connection, filter: &TaskFilter) -> StoreResult<Option<Task>> {
    let (clause, params_vec) = where_clause(filter);
    let sql = format!(
        "SELECT {} FROM tasks WHERE {} ORDER BY rowid ASC LIMIT 1",
        COLUMNS, clause
    );
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();

    conn.query_row(&sql, params_refs.as_slice(), TaskRow::read)
        .optional()?
        .map(Task::try_from)
        .transpose()
}

impl TaskStore for Database {
    fn find(&self, filter: &TaskFilter, sort: &SortSpec) -> StoreResult<Vec<Task>> {
        self.with_conn(|conn| {
            let (clause, params_vec) = where_clause(filter);
            let sql = format!(
                "SELECT {} FROM tasks WHERE {} ORDER BY {}",
                COLUMNS,
                clause,
                order_clause(sort)
            );
            let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_refs.as_slice(), TaskRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter().map(Task::try_from).collect()
        })
    }

    fn find_one(&self, filter: &TaskFilter) -> StoreResult<Option<Task>> {
        self.with_conn(|conn| select_one(conn, filter))
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

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, owner, title, description, priority, status, due_date, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    task.id.to_string(),
                    task.owner.as_str(),
                    task.title,
                    task.description,
                    task.priority.as_str(),
                    task.status.as_str(),
                    task.due_date.map(to_ms),
                    to_ms(task.created_at),
                    to_ms(task.updated_at),
                ],
            )?;
            Ok(())
        })?;

        Ok(task)
    }

    fn update_one(
        &self,
        filter: &TaskFilter,
        changes: &TaskChanges,
    ) -> StoreResult<Option<Task>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(mut task) = select_one(&tx, filter)? else {
                return Ok(None);
            };
            changes.apply(&mut task, now());

            tx.execute(
                "UPDATE tasks
                 SET title = ?1, description = ?2, priority = ?3, status = ?4,
                     due_date = ?5, updated_at = ?6
                 WHERE id = ?7 AND owner = ?8",
                params![
                    task.title,
                    task.description,
                    task.priority.as_str(),
                    task.status.as_str(),
                    task.due_date.map(to_ms),
                    to_ms(task.updated_at),
                    task.id.to_string(),
                    task.owner.as_str(),
                ],
            )?;

            tx.commit()?;
            Ok(Some(task))
        })
    }

    fn delete_one(&self, filter: &TaskFilter) -> StoreResult<Option<Task>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(task) = select_one(&tx, filter)? else {
                return Ok(None);
            };
            tx.execute(
                "DELETE FROM tasks WHERE id = ?1 AND owner = ?2",
                params![task.id.to_string(), task.owner.as_str()],
            )?;

            tx.commit()?;
            Ok(Some(task))
        })
    }

    fn count(&self, filter: &TaskFilter) -> StoreResult<u64> {
        self.with_conn(|conn| {
            let (clause, params_vec) = where_clause(filter);
            let sql = format!("SELECT COUNT(*) FROM tasks WHERE {}", clause);
            let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();

            let count: i64 = conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    fn aggregate_by_field(
        &self,
        filter: &TaskFilter,
        field: GroupField,
    ) -> StoreResult<BTreeMap<String, u64>> {
        self.with_conn(|conn| {
            let (clause, params_vec) = where_clause(filter);
            let column = field.column();
            let sql = format!(
                "SELECT {column}, COUNT(*) FROM tasks WHERE {clause} GROUP BY {column}"
            );
            let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();

            let mut stmt = conn.prepare(&sql)?;
            let groups = stmt
                .query_map(params_refs.as_slice(), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })?
                .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;

            Ok(groups)
        })
    }
}
