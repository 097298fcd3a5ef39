use chrono::{DateTime, NaiveDate, Utc};

use taskdesk_core::task::{CreateTask, Task, TaskStatus, UpdateTask};

use super::super::{pg_err, pg_not_found, PostgresDatabase};
use crate::DbError;

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    user_id: String,
    title: String,
    description: Option<String>,
    status: String,
    deadline: NaiveDate,
    attachment_path: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(r: TaskRow) -> Self {
        Task {
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            description: r.description,
            status: TaskStatus::parse_str(&r.status).unwrap_or(TaskStatus::Pending),
            deadline: r.deadline,
            attachment_path: r.attachment_path,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl PostgresDatabase {
    pub(crate) async fn pg_create_task(&self, input: &CreateTask) -> Result<Task, DbError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let row = sqlx::query_as::<_, TaskRow>(
            "INSERT INTO tasks (
                id, user_id, title, description, status, deadline, attachment_path,
                created_at, updated_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(&id)
        .bind(&input.user_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.status.as_str())
        .bind(input.deadline)
        .bind(&input.attachment_path)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(pg_err)?;

        Ok(row.into())
    }

    pub(crate) async fn pg_get_task(&self, id: &str) -> Result<Task, DbError> {
        let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(pg_err)?
            .ok_or_else(|| pg_not_found(&format!("task {id}")))?;
        Ok(row.into())
    }

    pub(crate) async fn pg_list_tasks_for_user(&self, user_id: &str) -> Result<Vec<Task>, DbError> {
        let rows = sqlx::query_as::<_, TaskRow>(
            "SELECT * FROM tasks WHERE user_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub(crate) async fn pg_update_task(&self, id: &str, update: &UpdateTask) -> Result<Task, DbError> {
        let row = sqlx::query_as::<_, TaskRow>(
            "UPDATE tasks
             SET title = $1, description = $2, status = $3, deadline = $4,
                 attachment_path = COALESCE($5, attachment_path), updated_at = $6
             WHERE id = $7
             RETURNING *",
        )
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.status.as_str())
        .bind(update.deadline)
        .bind(&update.attachment_path)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(pg_err)?
        .ok_or_else(|| pg_not_found(&format!("task {id}")))?;

        Ok(row.into())
    }

    pub(crate) async fn pg_delete_task(&self, id: &str) -> Result<(), DbError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(pg_err)?;
        if result.rows_affected() == 0 {
            return Err(pg_not_found(&format!("task {id}")));
        }
        Ok(())
    }

    pub(crate) async fn pg_list_attachment_paths(&self) -> Result<Vec<String>, DbError> {
        sqlx::query_scalar(
            "SELECT attachment_path FROM tasks
             WHERE attachment_path IS NOT NULL ORDER BY attachment_path",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(pg_err)
    }
}
