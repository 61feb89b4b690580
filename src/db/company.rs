//! Company profile storage.
//!
//! Tags and detail image URLs are stored as JSON arrays. Images are already
//! hosted elsewhere; only their URLs (and count) live here.

use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePool, types::Json};

use crate::entitlements::ProfileUsage;

/// Editable fields of a company profile, as submitted by the owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyFields {
    pub name: String,
    pub registration_number: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_tags: Vec<String>,
    #[serde(default)]
    pub detail_images: Vec<String>,
    #[serde(default)]
    pub brand_color: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

impl CompanyFields {
    /// Feature usage of this profile, checked against the owner's entitlements.
    pub fn usage(&self) -> ProfileUsage {
        ProfileUsage {
            detail_images: self.detail_images.len(),
            category_tags: self.category_tags.len(),
            brand_color: self.brand_color.is_some(),
            video: self.video_url.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Company {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub registration_number: String,
    pub description: String,
    pub category_tags: Vec<String>,
    pub detail_images: Vec<String>,
    pub brand_color: Option<String>,
    pub video_url: Option<String>,
    pub featured: bool,
    pub verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct CompanyRow {
    id: String,
    owner_id: String,
    name: String,
    registration_number: String,
    description: String,
    category_tags: Json<Vec<String>>,
    detail_images: Json<Vec<String>>,
    brand_color: Option<String>,
    video_url: Option<String>,
    featured: i32,
    verified: i32,
    created_at: String,
    updated_at: String,
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            registration_number: row.registration_number,
            description: row.description,
            category_tags: row.category_tags.0,
            detail_images: row.detail_images.0,
            brand_color: row.brand_color,
            video_url: row.video_url,
            featured: row.featured != 0,
            verified: row.verified != 0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const COMPANY_COLUMNS: &str = "id, owner_id, name, registration_number, description, category_tags, detail_images, brand_color, video_url, featured, verified, created_at, updated_at";

#[derive(Clone)]
pub struct CompanyStore {
    pool: SqlitePool,
}

impl CompanyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a company profile owned by `owner_id`.
    pub async fn create(
        &self,
        id: &str,
        owner_id: &str,
        fields: &CompanyFields,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO companies (id, owner_id, name, registration_number, description, category_tags, detail_images, brand_color, video_url)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(owner_id)
        .bind(&fields.name)
        .bind(&fields.registration_number)
        .bind(&fields.description)
        .bind(Json(&fields.category_tags))
        .bind(Json(&fields.detail_images))
        .bind(&fields.brand_color)
        .bind(&fields.video_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Company>, sqlx::Error> {
        let row: Option<CompanyRow> = sqlx::query_as(&format!(
            "SELECT {} FROM companies WHERE id = ?",
            COMPANY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Company::from))
    }

    /// Replace the editable fields. A changed registration number drops the verified flag.
    pub async fn update(&self, id: &str, fields: &CompanyFields) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE companies SET
                verified = CASE WHEN registration_number = ? THEN verified ELSE 0 END,
                name = ?, registration_number = ?, description = ?, category_tags = ?,
                detail_images = ?, brand_color = ?, video_url = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(&fields.registration_number)
        .bind(&fields.name)
        .bind(&fields.registration_number)
        .bind(&fields.description)
        .bind(Json(&fields.category_tags))
        .bind(Json(&fields.detail_images))
        .bind(&fields.brand_color)
        .bind(&fields.video_url)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM companies WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All companies owned by a user, newest first.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Company>, sqlx::Error> {
        let rows: Vec<CompanyRow> = sqlx::query_as(&format!(
            "SELECT {} FROM companies WHERE owner_id = ? ORDER BY created_at DESC, rowid DESC",
            COMPANY_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Company::from).collect())
    }

    /// Public directory listing: featured companies first, then newest.
    pub async fn list_public(&self) -> Result<Vec<Company>, sqlx::Error> {
        let rows: Vec<CompanyRow> = sqlx::query_as(&format!(
            "SELECT {} FROM companies ORDER BY featured DESC, created_at DESC, rowid DESC",
            COMPANY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Company::from).collect())
    }

    pub async fn set_featured(&self, id: &str, featured: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE companies SET featured = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(featured as i32)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_verified(&self, id: &str, verified: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE companies SET verified = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(verified as i32)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
