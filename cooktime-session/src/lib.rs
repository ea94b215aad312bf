//! # Cooktime session engine (cooktime-session)
//!
//! Arms, persists, recovers and fires the alerts of a meal timeline.
//!
//! **Purpose:** Keep the meal catalog, run the live cooking session against
//! real timers, and expose both over HTTP/SSE and a command line.
//!
//! **Architecture:** One [`CookApp`] behind a `tokio::sync::Mutex`; timer
//! expiries come back through a channel drained by [`app::run_fire_loop`];
//! storage, timers, notifications and audio sit behind traits.

pub mod api;
pub mod app;
pub mod audio;
pub mod catalog;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod notify;
pub mod session;
pub mod store;

pub use app::{AppDeps, CookApp, SharedApp};
pub use error::{Error, Result};
