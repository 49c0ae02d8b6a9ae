use sqlx::PgPool;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{Agency, NewAgency};

const AGENCY_COLUMNS: &str = r#"
    id, name, email, phone_numbers, contact_person_name, address,
    contact_information, is_active, created_by, created_at, updated_at
"#;

pub struct AgencyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AgencyRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Agency>, DatabaseError> {
        let sql = format!("SELECT {AGENCY_COLUMNS} FROM agencies ORDER BY name");
        let rows = sqlx::query_as::<_, Agency>(&sql).fetch_all(self.pool).await?;
        Ok(rows)
    }

    pub async fn create(&self, agency: &NewAgency, created_by: Uuid) -> Result<Agency, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO agencies
                (name, email, phone_numbers, contact_person_name, address,
                 contact_information, is_active, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, true, $7)
            RETURNING {AGENCY_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, Agency>(&sql)
            .bind(agency.name.trim())
            .bind(&agency.email)
            .bind(&agency.phone_numbers)
            .bind(&agency.contact_person_name)
            .bind(&agency.address)
            .bind(&agency.contact_information)
            .bind(created_by)
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }

    /// Find by exact name, or create a bare agency row
    pub async fn find_or_create_by_name(&self, name: &str, created_by: Uuid) -> Result<Agency, DatabaseError> {
        let sql = format!("SELECT {AGENCY_COLUMNS} FROM agencies WHERE name = $1 LIMIT 1");
        if let Some(existing) = sqlx::query_as::<_, Agency>(&sql)
            .bind(name)
            .fetch_optional(self.pool)
            .await?
        {
            return Ok(existing);
        }

        let new_agency = NewAgency {
            name: name.to_string(),
            email: None,
            phone_numbers: None,
            contact_person_name: None,
            address: None,
            contact_information: None,
        };
        self.create(&new_agency, created_by).await
    }

    pub async fn add_member(&self, agency_id: Uuid, user_id: Uuid, role: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO agency_users (agency_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (agency_id, user_id) DO UPDATE SET role = EXCLUDED.role
            "#,
        )
        .bind(agency_id)
        .bind(user_id)
        .bind(role)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
