//! Database access layer
//!
//! Cooktime keeps everything it persists in one key/value table of JSON
//! documents (`documents`). See [`documents`] for the accessors and [`init`]
//! for pool setup.

pub mod documents;
pub mod init;

/// Key of the meal catalog document (JSON array of meals)
pub const MEALS_KEY: &str = "cooktime.meals.v1";

/// Key of the active meal id document (JSON string)
pub const ACTIVE_MEAL_KEY: &str = "cooktime.activeMealId.v1";

/// Key of the live session document
pub const SESSION_KEY: &str = "cooktime.session.v1";

pub use init::{open_database, open_in_memory};
