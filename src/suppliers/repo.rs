use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub street: String,
    pub city: String,
    pub country: String,
    pub phone_numbers: Vec<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const SUPPLIER_COLUMNS: &str =
    "id, name, street, city, country, phone_numbers, created_at, updated_at";

impl Supplier {
    pub async fn list(db: &PgPool) -> Result<Vec<Supplier>, AppError> {
        let suppliers = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers ORDER BY created_at"
        ))
        .fetch_all(db)
        .await?;
        Ok(suppliers)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<Supplier>, AppError> {
        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(supplier)
    }

    pub async fn create(
        db: &PgPool,
        name: &str,
        street: &str,
        city: &str,
        country: &str,
        phone_numbers: &[String],
    ) -> Result<Supplier, AppError> {
        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            "INSERT INTO suppliers (name, street, city, country, phone_numbers) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {SUPPLIER_COLUMNS}"
        ))
        .bind(name)
        .bind(street)
        .bind(city)
        .bind(country)
        .bind(phone_numbers)
        .fetch_one(db)
        .await?;
        Ok(supplier)
    }

    /// Partial update; absent fields keep their stored value.
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        street: Option<&str>,
        city: Option<&str>,
        country: Option<&str>,
        phone_numbers: Option<&[String]>,
    ) -> Result<Option<Supplier>, AppError> {
        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            "UPDATE suppliers SET \
                 name = COALESCE($2, name), \
                 street = COALESCE($3, street), \
                 city = COALESCE($4, city), \
                 country = COALESCE($5, country), \
                 phone_numbers = COALESCE($6, phone_numbers), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {SUPPLIER_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(street)
        .bind(city)
        .bind(country)
        .bind(phone_numbers)
        .fetch_optional(db)
        .await?;
        Ok(supplier)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
