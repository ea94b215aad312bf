//! HTTP server setup and routing
//!
//! Sets up the Axum router for meal editing, timeline, session control and
//! the SSE stream. Default port 5780.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use cooktime_common::events::EventBus;

use crate::app::SharedApp;
use crate::error::Result;

use super::{handlers, sse};

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub app: SharedApp,
    /// Held outside the app lock so SSE clients never wait on it
    pub bus: Arc<EventBus>,
}

impl AppContext {
    pub fn new(app: SharedApp, bus: Arc<EventBus>) -> Self {
        Self { app, bus }
    }
}

/// Build the router with every route attached
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(handlers::health))

        // Meal catalog
        .route("/meals", get(handlers::list_meals).post(handlers::create_meal))
        .route("/meals/import", post(handlers::import_meal))
        .route("/meals/active", get(handlers::get_active_meal))
        .route("/meals/active/serve", put(handlers::set_serve))
        .route("/meals/:id", delete(handlers::delete_meal))
        .route("/meals/:id/export", get(handlers::export_meal))
        .route("/meals/:id/copy", post(handlers::copy_meal))
        .route("/meals/:id/select", post(handlers::select_meal))

        // Dish and stage editing on the active meal
        .route("/meals/active/dishes", post(handlers::add_dish))
        .route(
            "/meals/active/dishes/:dish_id",
            put(handlers::rename_dish).delete(handlers::remove_dish),
        )
        .route("/meals/active/dishes/:dish_id/move", post(handlers::move_dish))
        .route("/meals/active/dishes/:dish_id/stages", post(handlers::add_stage))
        .route(
            "/meals/active/dishes/:dish_id/stages/:stage_id",
            put(handlers::update_stage).delete(handlers::remove_stage),
        )
        .route(
            "/meals/active/dishes/:dish_id/stages/:stage_id/move",
            post(handlers::move_stage),
        )

        // Timeline and session
        .route("/timeline", get(handlers::get_timeline))
        .route("/session", get(handlers::get_session))
        .route("/session/arm", post(handlers::arm_session))
        .route("/session/stop", post(handlers::stop_session))
        .route("/sound/test", post(handlers::test_sound))

        // SSE event stream
        .route("/events", get(sse::event_stream))

        .with_state(ctx)

        // Enable CORS for local access
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve the API until `shutdown` resolves
pub async fn run(
    port: u16,
    ctx: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = create_router(ctx);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
