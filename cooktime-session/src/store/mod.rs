//! Storage ports
//!
//! The meal catalog and the session record are persisted through two small
//! async traits. [`SqliteStore`] implements both over the `documents` table;
//! [`MemoryStore`] keeps everything in process memory (tests, dry runs).

mod memory;
mod sqlite;

use async_trait::async_trait;

use cooktime_common::Meal;

use crate::error::Result;
use crate::session::Session;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Persistence of the meal catalog and the active selection
#[async_trait]
pub trait MealStore: Send + Sync {
    /// All stored meals in catalog order (empty when nothing is stored)
    async fn load(&self) -> Result<Vec<Meal>>;

    /// Replace the stored catalog
    async fn save(&self, meals: &[Meal]) -> Result<()>;

    async fn get_active_id(&self) -> Result<Option<String>>;

    async fn set_active_id(&self, id: &str) -> Result<()>;
}

/// Persistence of the single live session record
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<Session>>;

    async fn save(&self, session: &Session) -> Result<()>;

    /// Remove the record; a missing record is not an error
    async fn clear(&self) -> Result<()>;
}
