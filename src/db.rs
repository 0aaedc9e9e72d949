use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use crate::config::is_valid_table_name;
use crate::errors::AppError;
use crate::lead::Lead;

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }
}

/// Reads lead rows from Postgres as open-ended JSON documents.
///
/// Each row is converted with `to_jsonb`, so column names become document
/// keys exactly as stored (snake_case columns, camelCase JSON keys inside a
/// `jsonb` column are both fine for the extractor).
pub struct LeadStore {
    pool: PgPool,
    table: String,
}

impl LeadStore {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self, AppError> {
        let table = table.into();
        if !is_valid_table_name(&table) {
            return Err(AppError::BadRequest(format!(
                "invalid leads table name '{}'",
                table
            )));
        }
        Ok(Self { pool, table })
    }

    pub async fn fetch_leads(&self, limit: i64) -> Result<Vec<Lead>, AppError> {
        // Identifier is validated in `new`; only the limit is a bind parameter
        let sql = format!(
            "SELECT to_jsonb(t) AS document FROM {} t LIMIT $1",
            self.table
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let leads = rows
            .iter()
            .map(|row| {
                row.try_get::<serde_json::Value, _>("document")
                    .map(flatten_document)
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!("Loaded {} leads from table {}", leads.len(), self.table);
        Ok(leads)
    }
}

/// Turns a table row into a lead. A single `jsonb` column named `document`
/// or `data` is unwrapped so document-style tables read naturally.
fn flatten_document(row: serde_json::Value) -> Lead {
    if let serde_json::Value::Object(map) = &row {
        if map.len() == 1 {
            for key in ["document", "data"] {
                if let Some(serde_json::Value::Object(inner)) = map.get(key) {
                    return Lead::new(inner.clone());
                }
            }
        }
    }
    Lead::from_value(row)
}
