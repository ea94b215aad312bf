//! JSON document access
//!
//! Read/write JSON values in the `documents` table (key-value store).

use serde_json::Value;
use sqlx::{Pool, Sqlite};

use crate::error::{Error, Result};

/// Fetch and parse a document
///
/// Returns `Ok(None)` when the key is absent and `Error::Storage` when the
/// stored text is not valid JSON.
pub async fn get_document(db: &Pool<Sqlite>, key: &str) -> Result<Option<Value>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM documents WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| Error::Storage(format!("Document '{}' is not valid JSON: {}", key, e))),
        None => Ok(None),
    }
}

/// Insert or replace a document
pub async fn set_document(db: &Pool<Sqlite>, key: &str, value: &Value) -> Result<()> {
    let text = serde_json::to_string(value)?;

    sqlx::query(
        r#"
        INSERT INTO documents (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(text)
    .execute(db)
    .await?;

    Ok(())
}

/// Remove a document; absent keys are fine
pub async fn delete_document(db: &Pool<Sqlite>, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM documents WHERE key = ?")
        .bind(key)
        .execute(db)
        .await?;

    Ok(())
}
