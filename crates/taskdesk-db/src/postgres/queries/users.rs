use chrono::{DateTime, Utc};

use taskdesk_core::user::{CreateUser, User, UserCredentials};

use super::super::{pg_err, pg_not_found, PostgresDatabase};
use crate::DbError;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserCredentials {
    fn from(r: UserRow) -> Self {
        UserCredentials {
            user: User {
                id: r.id,
                name: r.name,
                email: r.email,
                created_at: r.created_at,
                updated_at: r.updated_at,
            },
            password_hash: r.password_hash,
        }
    }
}

impl PostgresDatabase {
    pub(crate) async fn pg_create_user(&self, input: &CreateUser) -> Result<User, DbError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(&id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(pg_err)?;

        Ok(UserCredentials::from(row).user)
    }

    pub(crate) async fn pg_get_user(&self, id: &str) -> Result<User, DbError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(pg_err)?
            .ok_or_else(|| pg_not_found(&format!("user {id}")))?;
        Ok(UserCredentials::from(row).user)
    }

    pub(crate) async fn pg_find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, DbError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(pg_err)?;
        Ok(row.map(UserCredentials::from))
    }
}
