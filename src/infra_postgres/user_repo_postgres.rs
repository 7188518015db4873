use super::util::{is_unique_violation, upstream};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Reads and writes the `users` table shared with the catalog routes.
pub struct PgUserRepo {
    pool: PgPool,
}

impl PgUserRepo {
    pub fn new(pool: PgPool) -> Self {
        PgUserRepo { pool }
    }

    fn parse_role(raw: &str) -> Result<Role, AuthError> {
        raw.parse::<Role>()
            .map_err(|e| AuthError::InternalError(e.to_string()))
    }

    fn row_to_record(row: PgRow) -> Result<UserCredentials, AuthError> {
        let user_id: i64 = row.try_get("id").map_err(upstream)?;
        let username: String = row.try_get("username").map_err(upstream)?;
        let password_hash: String = row.try_get("password_hash").map_err(upstream)?;
        let role: String = row.try_get("role").map_err(upstream)?;

        Ok(UserCredentials {
            user_id: UserId(user_id),
            username,
            password_hash,
            role: Self::parse_role(&role)?,
        })
    }
}

#[async_trait::async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, AuthError> {
        let row_opt: Option<PgRow> = sqlx::query(
            r#"
SELECT id::BIGINT AS id, username, password_hash, role
FROM users
WHERE username = $1
"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(upstream)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn find_role_by_id(&self, user_id: UserId) -> Result<Option<Role>, AuthError> {
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(upstream)?;

        role.as_deref().map(Self::parse_role).transpose()
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM users WHERE username = $1"#)
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(upstream)?;

        Ok(count > 0)
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<UserId, AuthError> {
        let user_id: i64 = sqlx::query_scalar(
            r#"
INSERT INTO users (username, password_hash, role)
VALUES ($1, $2, $3)
RETURNING id::BIGINT
"#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::UserExists
            } else {
                upstream(e)
            }
        })?;

        Ok(UserId(user_id))
    }
}
