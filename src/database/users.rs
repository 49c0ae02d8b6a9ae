use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::UserProfile;

const PROFILE_COLUMNS: &str = r#"
    id, email, username, full_name, role, is_active, agency_id, created_at, updated_at
"#;

/// Tracking tables the debug cleanup endpoint is allowed to empty
pub const CLEANUP_TABLES: [&str; 2] = ["user_role_changes", "user_creations"];

pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupResult {
    pub table: &'static str,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<UserProfile>, DatabaseError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM user_profiles ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, UserProfile>(&sql).fetch_all(self.pool).await?;
        Ok(rows)
    }

    pub async fn get(&self, id: Uuid) -> Result<UserProfile, DatabaseError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE id = $1");
        sqlx::query_as::<_, UserProfile>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("User profile not found".to_string()))
    }

    /// Insert or refresh the profile mirror of an auth user
    pub async fn upsert(
        &self,
        id: Uuid,
        email: &str,
        username: Option<&str>,
        full_name: Option<&str>,
        role: &str,
        agency_id: Option<Uuid>,
    ) -> Result<UserProfile, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO user_profiles (id, email, username, full_name, role, is_active, agency_id)
            VALUES ($1, $2, $3, $4, $5, true, $6)
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                username = COALESCE(EXCLUDED.username, user_profiles.username),
                full_name = COALESCE(EXCLUDED.full_name, user_profiles.full_name),
                role = EXCLUDED.role,
                agency_id = COALESCE(EXCLUDED.agency_id, user_profiles.agency_id),
                updated_at = now()
            RETURNING {PROFILE_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(id)
            .bind(email)
            .bind(username)
            .bind(full_name)
            .bind(role)
            .bind(agency_id)
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }

    pub async fn username_taken(&self, username: &str) -> Result<bool, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_profiles WHERE username = $1")
            .bind(username)
            .fetch_one(self.pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn set_role(&self, id: Uuid, role: &str) -> Result<UserProfile, DatabaseError> {
        let sql = format!(
            "UPDATE user_profiles SET role = $2, updated_at = now() WHERE id = $1 RETURNING {PROFILE_COLUMNS}"
        );
        sqlx::query_as::<_, UserProfile>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("User profile not found".to_string()))
    }

    pub async fn record_role_change(
        &self,
        user_id: Uuid,
        old_role: Option<&str>,
        new_role: &str,
        reason: &str,
        changed_by: Uuid,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO user_role_changes (user_id, old_role, new_role, reason, changed_by)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(old_role)
        .bind(new_role)
        .bind(reason)
        .bind(changed_by)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Empty each tracking table independently; one failure does not stop the rest
    pub async fn cleanup_tracking_tables(&self) -> Vec<CleanupResult> {
        let mut results = Vec::with_capacity(CLEANUP_TABLES.len());
        for table in CLEANUP_TABLES {
            // Table names come from the fixed list above, never from input
            let sql = format!("DELETE FROM {}", table);
            match sqlx::query(&sql).execute(self.pool).await {
                Ok(done) => {
                    tracing::info!("Cleaned table: {}", table);
                    results.push(CleanupResult {
                        table,
                        success: true,
                        deleted: Some(done.rows_affected()),
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::error!("Error cleaning {}: {}", table, e);
                    results.push(CleanupResult {
                        table,
                        success: false,
                        deleted: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        results
    }
}
