//! HTTP API module
//!
//! REST endpoints over the [`CookApp`](crate::CookApp) and an SSE stream of
//! session and alert events.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, AppContext};
