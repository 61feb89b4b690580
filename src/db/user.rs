use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// Subscription tier of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Basic,
    Enterprise,
    EnterpriseTrial,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Basic => "basic",
            Grade::Enterprise => "enterprise",
            Grade::EnterpriseTrial => "enterprise_trial",
        }
    }

    /// Parse a stored grade. Unknown values fall back to the least privileged tier.
    pub fn parse(s: &str) -> Self {
        match s {
            "enterprise" => Grade::Enterprise,
            "enterprise_trial" => Grade::EnterpriseTrial,
            _ => Grade::Basic,
        }
    }
}

/// Account status. Suspended users keep their tokens but lose every privileged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
        }
    }

    /// Parse a stored status. Unknown values are treated as suspended.
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => UserStatus::Active,
            _ => UserStatus::Suspended,
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub phone: Option<String>,
    pub status: UserStatus,
    pub grade: Grade,
    pub is_admin: bool,
    pub trial_ends_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_suspended(&self) -> bool {
        self.status == UserStatus::Suspended
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    name: String,
    phone: Option<String>,
    status: String,
    grade: String,
    is_admin: i32,
    trial_ends_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            name: row.name,
            phone: row.phone,
            status: UserStatus::parse(&row.status),
            grade: Grade::parse(&row.grade),
            is_admin: row.is_admin != 0,
            trial_ends_at: row.trial_ends_at,
        }
    }
}

/// User summary for the admin dashboard. Never exposes the password hash.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub name: String,
    pub status: UserStatus,
    pub grade: Grade,
    pub is_admin: bool,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct UserSummaryRow {
    id: String,
    email: String,
    name: String,
    status: String,
    grade: String,
    is_admin: i32,
    trial_ends_at: Option<DateTime<Utc>>,
    created_at: String,
}

impl From<UserSummaryRow> for UserSummary {
    fn from(row: UserSummaryRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            status: UserStatus::parse(&row.status),
            grade: Grade::parse(&row.grade),
            is_admin: row.is_admin != 0,
            trial_ends_at: row.trial_ends_at,
            created_at: row.created_at,
        }
    }
}

/// Fields for a new user row.
pub struct NewUser<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub name: &'a str,
    pub phone: Option<&'a str>,
    pub is_admin: bool,
}

const USER_COLUMNS: &str =
    "id, email, password_hash, name, phone, status, grade, is_admin, trial_ends_at";

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new active basic-grade user.
    pub async fn create(&self, user: &NewUser<'_>) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, name, phone, is_admin) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.name)
        .bind(user.phone)
        .bind(user.is_admin as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Set the grade for a user.
    pub async fn set_grade(&self, id: &str, grade: Grade) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET grade = ?, updated_at = datetime('now') WHERE id = ?")
                .bind(grade.as_str())
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the account status for a user.
    pub async fn set_status(&self, id: &str, status: UserStatus) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET status = ?, updated_at = datetime('now') WHERE id = ?")
                .bind(status.as_str())
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Grant or remove the admin flag.
    pub async fn set_admin(&self, id: &str, is_admin: bool) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET is_admin = ?, updated_at = datetime('now') WHERE id = ?")
                .bind(is_admin as i32)
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a basic user onto the enterprise trial. A user can only ever start
    /// one trial; returns false if the user is not basic or already had one.
    pub async fn start_trial(&self, id: &str, ends_at: DateTime<Utc>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET grade = 'enterprise_trial', trial_ends_at = ?, updated_at = datetime('now')
             WHERE id = ? AND grade = 'basic' AND trial_ends_at IS NULL",
        )
        .bind(ends_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Downgrade every trial that ended at or before `now` back to basic.
    /// Same bound as [`crate::entitlements::effective_grade`].
    pub async fn expire_trials(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET grade = 'basic', updated_at = datetime('now')
             WHERE grade = 'enterprise_trial' AND trial_ends_at IS NOT NULL AND trial_ends_at <= ?",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete a user by ID.
    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List all users (for admin dashboard).
    pub async fn list(&self) -> Result<Vec<UserSummary>, sqlx::Error> {
        let rows: Vec<UserSummaryRow> = sqlx::query_as(
            "SELECT id, email, name, status, grade, is_admin, trial_ends_at, created_at FROM users ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(UserSummary::from).collect())
    }
}
