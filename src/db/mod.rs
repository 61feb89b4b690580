mod company;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use company::{Company, CompanyFields, CompanyStore};
pub use user::{Grade, NewUser, User, UserStatus, UserStore, UserSummary};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        if version < 2 {
            self.migrate_v2().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id TEXT PRIMARY KEY NOT NULL,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    name TEXT NOT NULL,
                    phone TEXT,
                    status TEXT NOT NULL DEFAULT 'active',
                    grade TEXT NOT NULL DEFAULT 'basic',
                    is_admin INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_email ON users(email)",
                "CREATE TABLE companies (
                    id TEXT PRIMARY KEY NOT NULL,
                    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    registration_number TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    category_tags TEXT NOT NULL DEFAULT '[]',
                    detail_images TEXT NOT NULL DEFAULT '[]',
                    brand_color TEXT,
                    video_url TEXT,
                    featured INTEGER NOT NULL DEFAULT 0,
                    verified INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_companies_owner_id ON companies(owner_id)",
                "CREATE INDEX idx_companies_featured ON companies(featured, created_at)",
            ],
        )
        .await
    }

    async fn migrate_v2(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            2,
            &[
                // Set when the one-time survey starts the enterprise trial; never cleared
                // so the trial cannot be restarted.
                "ALTER TABLE users ADD COLUMN trial_ends_at TEXT",
                "CREATE INDEX idx_users_trial ON users(grade, trial_ends_at)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the company store.
    pub fn companies(&self) -> CompanyStore {
        CompanyStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    async fn create_user(db: &Database, id: &str, email: &str) {
        db.users()
            .create(&NewUser {
                id,
                email,
                password_hash: "hash",
                name: "Alice",
                phone: None,
                is_admin: false,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();
        create_user(&db, "uuid-123", "alice@example.com").await;

        let user = db.users().get_by_id("uuid-123").await.unwrap().unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.grade, Grade::Basic);
        assert_eq!(user.status, UserStatus::Active);
        assert!(!user.is_admin);
        assert!(user.trial_ends_at.is_none());

        let user = db
            .users()
            .get_by_email("ALICE@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, "uuid-123");
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();
        create_user(&db, "uuid-1", "alice@example.com").await;

        let result = db
            .users()
            .create(&NewUser {
                id: "uuid-2",
                email: "Alice@Example.com",
                password_hash: "hash",
                name: "Other",
                phone: None,
                is_admin: false,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_status_and_grade_updates() {
        let db = Database::open(":memory:").await.unwrap();
        create_user(&db, "uuid-1", "alice@example.com").await;

        assert!(db.users().set_status("uuid-1", UserStatus::Suspended).await.unwrap());
        assert!(db.users().set_grade("uuid-1", Grade::Enterprise).await.unwrap());
        assert!(!db.users().set_grade("missing", Grade::Enterprise).await.unwrap());

        let user = db.users().get_by_id("uuid-1").await.unwrap().unwrap();
        assert!(user.is_suspended());
        assert_eq!(user.grade, Grade::Enterprise);
    }

    #[tokio::test]
    async fn test_trial_starts_once() {
        let db = Database::open(":memory:").await.unwrap();
        create_user(&db, "uuid-1", "alice@example.com").await;
        let ends_at = Utc::now() + Duration::days(90);

        assert!(db.users().start_trial("uuid-1", ends_at).await.unwrap());
        let user = db.users().get_by_id("uuid-1").await.unwrap().unwrap();
        assert_eq!(user.grade, Grade::EnterpriseTrial);
        assert!(user.trial_ends_at.is_some());

        // Downgraded back to basic, the trial still cannot be restarted.
        db.users().set_grade("uuid-1", Grade::Basic).await.unwrap();
        assert!(!db.users().start_trial("uuid-1", ends_at).await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_trials() {
        let db = Database::open(":memory:").await.unwrap();
        create_user(&db, "lapsed", "a@example.com").await;
        create_user(&db, "running", "b@example.com").await;

        let now = Utc::now();
        db.users()
            .start_trial("lapsed", now - Duration::days(1))
            .await
            .unwrap();
        db.users()
            .start_trial("running", now + Duration::days(30))
            .await
            .unwrap();

        assert_eq!(db.users().expire_trials(now).await.unwrap(), 1);

        let lapsed = db.users().get_by_id("lapsed").await.unwrap().unwrap();
        let running = db.users().get_by_id("running").await.unwrap().unwrap();
        assert_eq!(lapsed.grade, Grade::Basic);
        assert_eq!(running.grade, Grade::EnterpriseTrial);
    }

    #[tokio::test]
    async fn test_expire_trials_boundary_matches_evaluation() {
        use crate::entitlements::{TrialPolicy, effective_grade};

        let db = Database::open(":memory:").await.unwrap();
        create_user(&db, "edge", "edge@example.com").await;

        let now = Utc::now();
        db.users().start_trial("edge", now).await.unwrap();
        let user = db.users().get_by_id("edge").await.unwrap().unwrap();
        assert_eq!(
            effective_grade(user.grade, user.trial_ends_at, now, TrialPolicy::Downgrade),
            Grade::Basic
        );

        assert_eq!(db.users().expire_trials(now).await.unwrap(), 1);
        let user = db.users().get_by_id("edge").await.unwrap().unwrap();
        assert_eq!(user.grade, Grade::Basic);
    }

    #[tokio::test]
    async fn test_company_crud() {
        let db = Database::open(":memory:").await.unwrap();
        create_user(&db, "owner", "owner@example.com").await;

        let fields = CompanyFields {
            name: "Acme".to_string(),
            registration_number: "1234567890".to_string(),
            category_tags: vec!["tools".to_string()],
            ..Default::default()
        };
        db.companies().create("c1", "owner", &fields).await.unwrap();
        db.companies().set_verified("c1", true).await.unwrap();

        let company = db.companies().get("c1").await.unwrap().unwrap();
        assert_eq!(company.owner_id, "owner");
        assert_eq!(company.category_tags, vec!["tools".to_string()]);
        assert!(company.verified);

        // Same registration number keeps verification.
        let mut updated = fields.clone();
        updated.description = "Anvils".to_string();
        db.companies().update("c1", &updated).await.unwrap();
        assert!(db.companies().get("c1").await.unwrap().unwrap().verified);

        // A new registration number drops it.
        updated.registration_number = "0987654321".to_string();
        db.companies().update("c1", &updated).await.unwrap();
        assert!(!db.companies().get("c1").await.unwrap().unwrap().verified);

        assert_eq!(db.companies().list_by_owner("owner").await.unwrap().len(), 1);
        assert!(db.companies().delete("c1").await.unwrap());
        assert!(db.companies().get("c1").await.unwrap().is_none());
    }
}
