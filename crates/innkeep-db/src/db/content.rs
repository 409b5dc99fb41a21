//! Content repository: URL-bearing columns of the site's content tables.
//!
//! Identifiers interpolated into SQL come from `UrlField::registry()` only; every
//! value is bound.

use innkeep_core::models::{ContentRow, FieldShape, FieldValue, UrlField};
use innkeep_core::AppError;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

#[derive(Clone)]
pub struct ContentRepository {
    pool: PgPool,
}

impl ContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Rows of `field` holding `url` (as the scalar, an array element, or an item's URL).
    #[tracing::instrument(
        skip(self),
        fields(db.table = %field.table, db.column = field.column, db.operation = "select")
    )]
    pub async fn find_referencing(
        &self,
        field: &UrlField,
        url: &str,
    ) -> Result<Vec<ContentRow>, AppError> {
        let table = field.table.as_str();
        let column = field.column;
        match field.shape {
            FieldShape::Scalar => {
                let sql = format!(
                    "SELECT id, {column} FROM {table} WHERE {column} = $1 ORDER BY id"
                );
                let rows = sqlx::query_as::<Postgres, (Uuid, Option<String>)>(&sql)
                    .bind(url)
                    .fetch_all(&self.pool)
                    .await?;
                Ok(rows.into_iter().map(scalar_row).collect())
            }
            FieldShape::UrlArray => {
                let sql = format!(
                    "SELECT id, {column} FROM {table} WHERE $1 = ANY({column}) ORDER BY id"
                );
                let rows = sqlx::query_as::<Postgres, (Uuid, Option<Vec<String>>)>(&sql)
                    .bind(url)
                    .fetch_all(&self.pool)
                    .await?;
                Ok(rows.into_iter().map(url_array_row).collect())
            }
            FieldShape::ItemArray { url_key } => {
                let sql = format!(
                    "SELECT id, {column} FROM {table} WHERE {column} @> $1 ORDER BY id"
                );
                let mut item = serde_json::Map::new();
                item.insert(url_key.to_string(), JsonValue::String(url.to_string()));
                let probe = JsonValue::Array(vec![JsonValue::Object(item)]);
                let rows = sqlx::query_as::<Postgres, (Uuid, Option<JsonValue>)>(&sql)
                    .bind(probe)
                    .fetch_all(&self.pool)
                    .await?;
                Ok(rows
                    .into_iter()
                    .map(|row| item_array_row(row, url_key))
                    .collect())
            }
        }
    }

    /// Every row of `field` with a non-null value.
    #[tracing::instrument(
        skip(self),
        fields(db.table = %field.table, db.column = field.column, db.operation = "select")
    )]
    pub async fn list_field(&self, field: &UrlField) -> Result<Vec<ContentRow>, AppError> {
        let table = field.table.as_str();
        let column = field.column;
        let sql =
            format!("SELECT id, {column} FROM {table} WHERE {column} IS NOT NULL ORDER BY id");
        let rows = match field.shape {
            FieldShape::Scalar => sqlx::query_as::<Postgres, (Uuid, Option<String>)>(&sql)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(scalar_row)
                .collect(),
            FieldShape::UrlArray => sqlx::query_as::<Postgres, (Uuid, Option<Vec<String>>)>(&sql)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(url_array_row)
                .collect(),
            FieldShape::ItemArray { url_key } => {
                sqlx::query_as::<Postgres, (Uuid, Option<JsonValue>)>(&sql)
                    .fetch_all(&self.pool)
                    .await?
                    .into_iter()
                    .map(|row| item_array_row(row, url_key))
                    .collect()
            }
        };
        Ok(rows)
    }

    /// Overwrite `field` on one row.
    #[tracing::instrument(
        skip(self, value),
        fields(
            db.table = %field.table,
            db.column = field.column,
            db.operation = "update",
            db.record_id = %row_id
        )
    )]
    pub async fn write_field(
        &self,
        field: &UrlField,
        row_id: Uuid,
        value: &FieldValue,
    ) -> Result<(), AppError> {
        let sql = format!(
            "UPDATE {} SET {} = $1, updated_at = NOW() WHERE id = $2",
            field.table.as_str(),
            field.column
        );
        let query = sqlx::query::<Postgres>(&sql);
        let query = match (field.shape, value) {
            (FieldShape::Scalar, FieldValue::Scalar(v)) => query.bind(v.clone()),
            (FieldShape::UrlArray, FieldValue::Urls(v)) => query.bind(v.clone()),
            (FieldShape::ItemArray { .. }, FieldValue::Items { items, .. }) => {
                query.bind(JsonValue::Array(items.clone()))
            }
            _ => {
                return Err(AppError::InvalidInput(format!(
                    "value shape does not match column {}",
                    field
                )))
            }
        };

        let affected = query.bind(row_id).execute(&self.pool).await?.rows_affected();
        if affected == 0 {
            return Err(AppError::NotFound(format!("{} row {}", field.table, row_id)));
        }
        Ok(())
    }
}

fn scalar_row((row_id, value): (Uuid, Option<String>)) -> ContentRow {
    ContentRow {
        row_id,
        value: FieldValue::Scalar(value),
    }
}

fn url_array_row((row_id, value): (Uuid, Option<Vec<String>>)) -> ContentRow {
    ContentRow {
        row_id,
        value: FieldValue::Urls(value.unwrap_or_default()),
    }
}

fn item_array_row((row_id, value): (Uuid, Option<JsonValue>), url_key: &'static str) -> ContentRow {
    let items = match value {
        Some(JsonValue::Array(items)) => items,
        _ => Vec::new(),
    };
    ContentRow {
        row_id,
        value: FieldValue::Items { url_key, items },
    }
}
