use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::models::{Role, User};
use crate::db::RepositoryError;
use crate::state::DbPool;

/// Credential store.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError>;

    /// Fails with `Conflict` when the email is already registered.
    async fn insert(&self, user: &User) -> Result<(), RepositoryError>;
}

pub struct SqliteUserRepository {
    pool: DbPool,
}

impl SqliteUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn find_one(&self, column: &str, value: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT id, username, email, password_hash, role, created_at FROM users WHERE {} = ?1",
            column
        );
        let row = conn
            .query_row(&sql, params![value], raw_user)
            .optional()?;
        row.map(RawUser::into_user).transpose()
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.find_one("email", email)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        self.find_one("id", id)
    }

    async fn insert(&self, user: &User) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO users (id, username, email, password_hash, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id,
                user.username,
                user.email,
                user.password_hash,
                user.role.as_str(),
                format_timestamp(&user.created_at),
            ],
        )
        .map_err(|e| RepositoryError::from_write(e, "User already exists"))?;
        Ok(())
    }
}

struct RawUser {
    id: String,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: String,
}

fn raw_user(row: &Row<'_>) -> rusqlite::Result<RawUser> {
    Ok(RawUser {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl RawUser {
    fn into_user(self) -> Result<User, RepositoryError> {
        let role: Role = self.role.parse().map_err(RepositoryError::Corrupt)?;
        Ok(User {
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            role,
        })
    }
}

/// Fixed-width UTC timestamps so that text ordering matches time ordering.
pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Corrupt(format!("bad timestamp {:?}: {}", raw, e)))
}
