//! SQLite-backed stores
//!
//! Each store writes one JSON document per key:
//! - catalog: array of meals under `cooktime.meals.v1`
//! - active meal id: string under `cooktime.activeMealId.v1`
//! - session: object under `cooktime.session.v1`

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Pool, Sqlite};
use tracing::warn;

use cooktime_common::model::normalize_catalog;
use cooktime_common::Meal;

use super::{MealStore, SessionStore};
use crate::db::documents::{delete_document, get_document, set_document};
use crate::db::{ACTIVE_MEAL_KEY, MEALS_KEY, SESSION_KEY};
use crate::error::Result;
use crate::session::Session;

/// Meal and session store over a SQLite pool
#[derive(Clone)]
pub struct SqliteStore {
    db: Pool<Sqlite>,
}

impl SqliteStore {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.db
    }
}

#[async_trait]
impl MealStore for SqliteStore {
    async fn load(&self) -> Result<Vec<Meal>> {
        Ok(get_document(&self.db, MEALS_KEY)
            .await?
            .map(|value| normalize_catalog(&value))
            .unwrap_or_default())
    }

    async fn save(&self, meals: &[Meal]) -> Result<()> {
        let value = serde_json::to_value(meals)?;
        set_document(&self.db, MEALS_KEY, &value).await
    }

    async fn get_active_id(&self) -> Result<Option<String>> {
        Ok(match get_document(&self.db, ACTIVE_MEAL_KEY).await? {
            Some(Value::String(id)) if !id.is_empty() => Some(id),
            _ => None,
        })
    }

    async fn set_active_id(&self, id: &str) -> Result<()> {
        set_document(&self.db, ACTIVE_MEAL_KEY, &Value::String(id.to_string())).await
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn load(&self) -> Result<Option<Session>> {
        let Some(value) = get_document(&self.db, SESSION_KEY).await? else {
            return Ok(None);
        };

        match serde_json::from_value::<Session>(value) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                // Unreadable record behaves like no record; it is overwritten on next arm
                warn!("Ignoring unreadable session record: {}", e);
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let value = serde_json::to_value(session)?;
        set_document(&self.db, SESSION_KEY, &value).await
    }

    async fn clear(&self) -> Result<()> {
        delete_document(&self.db, SESSION_KEY).await
    }
}
