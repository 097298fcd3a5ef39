use chrono::Utc;
use rusqlite::{params, Row};

use taskdesk_core::task::{CreateTask, Task, TaskStatus, UpdateTask};

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    let status_str: String = row.get("status")?;
    Ok(Task {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: TaskStatus::parse_str(&status_str).unwrap_or(TaskStatus::Pending),
        deadline: row.get("deadline")?,
        attachment_path: row.get("attachment_path")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn not_found(id: &str) -> impl FnOnce(rusqlite::Error) -> DbError + '_ {
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("task {id}")),
        other => DbError::Internal(other.to_string()),
    }
}

impl SqliteDatabase {
    pub fn create_task_sync(&self, input: &CreateTask) -> Result<Task, DbError> {
        self.with_conn(|conn| {
            let id = uuid::Uuid::new_v4().to_string();
            let now = Utc::now();
            conn.execute(
                "INSERT INTO tasks (
                    id, user_id, title, description, status, deadline, attachment_path,
                    created_at, updated_at
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    input.user_id,
                    input.title,
                    input.description,
                    input.status.as_str(),
                    input.deadline,
                    input.attachment_path,
                    now,
                    now,
                ],
            )
            .to_db()?;

            conn.query_row("SELECT * FROM tasks WHERE id = ?1", params![id], row_to_task)
                .to_db()
        })
    }

    pub fn get_task_sync(&self, id: &str) -> Result<Task, DbError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM tasks WHERE id = ?1", params![id], row_to_task)
                .map_err(not_found(id))
        })
    }

    pub fn list_tasks_for_user_sync(&self, user_id: &str) -> Result<Vec<Task>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT * FROM tasks WHERE user_id = ?1 ORDER BY created_at ASC, rowid ASC")
                .to_db()?;
            let tasks = stmt
                .query_map(params![user_id], row_to_task)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(tasks)
        })
    }

    pub fn update_task_sync(&self, id: &str, update: &UpdateTask) -> Result<Task, DbError> {
        self.with_conn(|conn| {
            let now = Utc::now();
            let changed = conn
                .execute(
                    "UPDATE tasks
                     SET title = ?1, description = ?2, status = ?3, deadline = ?4,
                         attachment_path = COALESCE(?5, attachment_path), updated_at = ?6
                     WHERE id = ?7",
                    params![
                        update.title,
                        update.description,
                        update.status.as_str(),
                        update.deadline,
                        update.attachment_path,
                        now,
                        id,
                    ],
                )
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("task {id}")));
            }
            conn.query_row("SELECT * FROM tasks WHERE id = ?1", params![id], row_to_task)
                .map_err(not_found(id))
        })
    }

    pub fn delete_task_sync(&self, id: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM tasks WHERE id = ?1", params![id])
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("task {id}")));
            }
            Ok(())
        })
    }

    pub fn list_attachment_paths_sync(&self) -> Result<Vec<String>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT attachment_path FROM tasks
                     WHERE attachment_path IS NOT NULL ORDER BY attachment_path",
                )
                .to_db()?;
            let paths = stmt
                .query_map([], |row| row.get(0))
                .to_db()?
                .collect::<Result<Vec<String>, _>>()
                .to_db()?;
            Ok(paths)
        })
    }
}
