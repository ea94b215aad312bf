//! # Cooktime Common Library
//!
//! Shared code for the Cooktime crates including:
//! - Meal document model and normalization of untyped meal JSON
//! - Timeline derivation (meal -> ordered alert events)
//! - Event types (CooktimeEvent enum) and the EventBus
//! - Configuration loading and root folder resolution
//! - Time and id utilities

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod model;
pub mod time;
pub mod timeline;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use model::{Dish, Meal, Stage};
pub use timeline::{EventKind, TimelineEvent, Zone};
