//! SQLite-backed implementation of the external store contract.
//!
//! # Responsibility
//! - Keep SQL text and parameter binding inside the store boundary.
//! - Map uniqueness violations to `StoreError::Constraint`.
//!
//! # Invariants
//! - The connection must be fully migrated before the store is built.
//! - `fetch_snapshot` orders tasks by `order_index` so polls observe the
//!   flattened display sequence directly.

use crate::db::migrations::latest_version;
use crate::model::item::StoreId;
use crate::store::{ProjectRecord, ProjectSnapshot, ProjectStore, StoreError, StoreResult, TaskRecord};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::HashMap;

/// External store over a migrated SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Builds a store from a migrated connection.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        let expected = latest_version();
        let actual: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual != expected {
            return Err(StoreError::InvalidData(format!(
                "store requires schema version {expected}, got {actual}"
            )));
        }
        Ok(Self { conn })
    }

    /// Gives back the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

impl ProjectStore for SqliteStore {
    fn create_project(&mut self, record: &ProjectRecord) -> StoreResult<StoreId> {
        self.conn
            .execute(
                "INSERT INTO projects (
                    name, start_date, end_date, description, creator, created_at,
                    likely_duration, min_duration, max_duration
                 ) VALUES (?1, ?2, ?3, ?4, ?5,
                           COALESCE(NULLIF(?6, 0), strftime('%s', 'now') * 1000),
                           ?7, ?8, ?9);",
                params![
                    record.name,
                    record.start_date,
                    record.end_date,
                    record.description,
                    record.creator,
                    record.created_at,
                    record.likely_duration,
                    record.min_duration,
                    record.max_duration,
                ],
            )
            .map_err(map_constraint)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_project(&mut self, record: &ProjectRecord) -> StoreResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE projects
                 SET name = ?2,
                     start_date = ?3,
                     end_date = ?4,
                     description = ?5,
                     likely_duration = ?6,
                     min_duration = ?7,
                     max_duration = ?8
                 WHERE project_id = ?1;",
                params![
                    record.store_id,
                    record.name,
                    record.start_date,
                    record.end_date,
                    record.description,
                    record.likely_duration,
                    record.min_duration,
                    record.max_duration,
                ],
            )
            .map_err(map_constraint)?;
        if changed == 0 {
            return Err(StoreError::NotFound(record.store_id));
        }
        Ok(())
    }

    fn create_task(&mut self, record: &TaskRecord) -> StoreResult<StoreId> {
        self.conn
            .execute(
                "INSERT INTO tasks (
                    project_id, name, start_date, end_date, description, creator, created_at,
                    likely_duration, min_duration, max_duration, order_index, parent_task_id
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                           COALESCE(NULLIF(?7, 0), strftime('%s', 'now') * 1000),
                           ?8, ?9, ?10, ?11, ?12);",
                params![
                    record.project_id,
                    record.name,
                    record.start_date,
                    record.end_date,
                    record.description,
                    record.creator,
                    record.created_at,
                    record.likely_duration,
                    record.min_duration,
                    record.max_duration,
                    record.order_index,
                    record.parent_id,
                ],
            )
            .map_err(map_constraint)?;
        let task_id = self.conn.last_insert_rowid();

        for dependent in &record.dependencies {
            self.add_dependency_link(task_id, *dependent)?;
        }
        for worker in &record.workers {
            self.add_worker_link(task_id, worker)?;
        }
        Ok(task_id)
    }

    fn update_task(&mut self, record: &TaskRecord) -> StoreResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE tasks
                 SET name = ?2,
                     start_date = ?3,
                     end_date = ?4,
                     description = ?5,
                     likely_duration = ?6,
                     min_duration = ?7,
                     max_duration = ?8,
                     order_index = ?9
                 WHERE task_id = ?1;",
                params![
                    record.store_id,
                    record.name,
                    record.start_date,
                    record.end_date,
                    record.description,
                    record.likely_duration,
                    record.min_duration,
                    record.max_duration,
                    record.order_index,
                ],
            )
            .map_err(map_constraint)?;
        if changed == 0 {
            return Err(StoreError::NotFound(record.store_id));
        }
        Ok(())
    }

    fn update_task_row(&mut self, task: StoreId, order_index: i64) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks SET order_index = ?2 WHERE task_id = ?1;",
            params![task, order_index],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(task));
        }
        Ok(())
    }

    fn set_parent_link(&mut self, task: StoreId, parent: Option<StoreId>) -> StoreResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE tasks SET parent_task_id = ?2 WHERE task_id = ?1;",
                params![task, parent],
            )
            .map_err(map_constraint)?;
        if changed == 0 {
            return Err(StoreError::NotFound(task));
        }
        Ok(())
    }

    fn delete_task(&mut self, task: StoreId) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE task_id = ?1;", params![task])?;
        if changed == 0 {
            return Err(StoreError::NotFound(task));
        }
        Ok(())
    }

    fn add_dependency_link(&mut self, blocker: StoreId, dependent: StoreId) -> StoreResult<()> {
        self.conn
            .execute(
                "INSERT INTO task_dependencies (blocker_id, dependent_id) VALUES (?1, ?2);",
                params![blocker, dependent],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn remove_dependency_link(&mut self, blocker: StoreId, dependent: StoreId) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM task_dependencies WHERE blocker_id = ?1 AND dependent_id = ?2;",
            params![blocker, dependent],
        )?;
        Ok(())
    }

    fn add_worker_link(&mut self, task: StoreId, worker: &str) -> StoreResult<()> {
        self.conn
            .execute(
                "INSERT INTO task_workers (task_id, worker) VALUES (?1, ?2);",
                params![task, worker],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn remove_worker_link(&mut self, task: StoreId, worker: &str) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM task_workers WHERE task_id = ?1 AND worker = ?2;",
            params![task, worker],
        )?;
        Ok(())
    }

    fn fetch_snapshot(&mut self, project: StoreId) -> StoreResult<ProjectSnapshot> {
        let project_record = self
            .conn
            .query_row(
                "SELECT project_id, name, start_date, end_date, description,
                        created_at, creator, likely_duration, min_duration, max_duration
                 FROM projects
                 WHERE project_id = ?1;",
                params![project],
                parse_project_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound(project))?;

        let mut stmt = self.conn.prepare(
            "SELECT task_id, project_id, name, start_date, end_date, description,
                    created_at, creator, likely_duration, min_duration, max_duration,
                    order_index, parent_task_id
             FROM tasks
             WHERE project_id = ?1
             ORDER BY order_index ASC, task_id ASC;",
        )?;
        let mut rows = stmt.query(params![project])?;
        let mut tasks = Vec::new();
        let mut by_id: HashMap<StoreId, usize> = HashMap::new();
        while let Some(row) = rows.next()? {
            let record = parse_task_row(row)?;
            by_id.insert(record.store_id, tasks.len());
            tasks.push(record);
        }
        drop(rows);
        drop(stmt);

        let mut stmt = self.conn.prepare(
            "SELECT d.blocker_id, d.dependent_id
             FROM task_dependencies d
             INNER JOIN tasks t ON t.task_id = d.blocker_id
             WHERE t.project_id = ?1;",
        )?;
        let mut rows = stmt.query(params![project])?;
        while let Some(row) = rows.next()? {
            let blocker: StoreId = row.get(0)?;
            let dependent: StoreId = row.get(1)?;
            if let Some(index) = by_id.get(&blocker) {
                tasks[*index].dependencies.push(dependent);
            }
        }
        drop(rows);
        drop(stmt);

        let mut stmt = self.conn.prepare(
            "SELECT w.task_id, w.worker
             FROM task_workers w
             INNER JOIN tasks t ON t.task_id = w.task_id
             WHERE t.project_id = ?1
             ORDER BY w.worker ASC;",
        )?;
        let mut rows = stmt.query(params![project])?;
        while let Some(row) = rows.next()? {
            let task_id: StoreId = row.get(0)?;
            let worker: String = row.get(1)?;
            if let Some(index) = by_id.get(&task_id) {
                tasks[*index].workers.push(worker);
            }
        }

        Ok(ProjectSnapshot {
            project: project_record,
            tasks,
        })
    }
}

fn parse_project_row(row: &Row<'_>) -> rusqlite::Result<ProjectRecord> {
    Ok(ProjectRecord {
        store_id: row.get(0)?,
        name: row.get(1)?,
        start_date: row.get(2)?,
        end_date: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
        creator: row.get(6)?,
        likely_duration: row.get(7)?,
        min_duration: row.get(8)?,
        max_duration: row.get(9)?,
    })
}

fn parse_task_row(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    Ok(TaskRecord {
        store_id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        start_date: row.get(3)?,
        end_date: row.get(4)?,
        description: row.get(5)?,
        created_at: row.get(6)?,
        creator: row.get(7)?,
        likely_duration: row.get(8)?,
        min_duration: row.get(9)?,
        max_duration: row.get(10)?,
        order_index: row.get(11)?,
        parent_id: row.get(12)?,
        dependencies: Vec::new(),
        workers: Vec::new(),
    })
}

fn map_constraint(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::Constraint(
                message
                    .clone()
                    .unwrap_or_else(|| "constraint violation".to_string()),
            )
        }
        _ => err.into(),
    }
}
