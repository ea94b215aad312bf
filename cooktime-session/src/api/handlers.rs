//! HTTP request handlers
//!
//! Every handler locks the app once, runs its operation to completion and
//! maps failures to a status code with a `{"status": "error: ..."}` body:
//! validation 422, malformed input 400, not found 404, anything else 500.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Path, Query, Request, State},
    http::{header, StatusCode},
    Json,
};
use serde::de::DeserializeOwned;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use cooktime_common::model::{Direction, StagePatch};
use cooktime_common::time::{parse_serve_date, parse_serve_time};
use cooktime_common::timeline::{Granularity, TimelineFilter};
use cooktime_common::Meal;

use crate::api::server::AppContext;
use crate::app::TimelineView;
use crate::catalog::MealSummary;
use crate::error::{Error, ErrorKind};
use crate::session::SessionView;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

type ApiError = (StatusCode, Json<StatusResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealsResponse {
    active_meal_id: String,
    meals: Vec<MealSummary>,
}

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CopyRequest {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServeRequest {
    #[serde(default)]
    serve_date: Option<String>,
    #[serde(default)]
    serve_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    direction: Direction,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    id: String,
    meal: Meal,
}

#[derive(Debug, Serialize)]
pub struct MoveResponse {
    moved: bool,
    meal: Meal,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimelineQuery {
    filter: Option<String>,
    granularity: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmResponse {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    serve_when: DateTime<Utc>,
    scheduled: usize,
    skipped: usize,
    session: SessionView,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    stopped: bool,
}

#[derive(Debug, Serialize)]
pub struct SoundTestResponse {
    played: bool,
}

fn api_error(e: impl Into<Error>) -> ApiError {
    let e = e.into();
    let status = match e.kind() {
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::MalformedInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }

    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

/// JSON body extractor whose rejections use the same error body as handlers
///
/// Well-formed JSON of the wrong shape is a validation failure (422); a
/// missing content type or unparsable body is malformed input (400).
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(api_error(rejection_error(rejection))),
        }
    }
}

fn rejection_error(rejection: JsonRejection) -> Error {
    let message = rejection.body_text();
    match rejection {
        JsonRejection::JsonDataError(_) => Error::Validation(message),
        _ => cooktime_common::Error::MalformedInput(message).into(),
    }
}

/// Empty or absent means unset; anything else must parse
fn parse_optional<T>(
    value: Option<&str>,
    parse: fn(&str) -> Option<T>,
    what: &str,
) -> Result<Option<T>, Error> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => parse(v)
            .map(Some)
            .ok_or_else(|| Error::Validation(format!("Invalid {}: '{}'", what, v))),
    }
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "cooktime".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Meal Catalog Endpoints
// ============================================================================

/// GET /meals - Meal ids and names plus the active id
pub async fn list_meals(State(ctx): State<AppContext>) -> Json<MealsResponse> {
    let app = ctx.app.lock().await;
    Json(MealsResponse {
        active_meal_id: app.catalog().active_id().to_string(),
        meals: app.catalog().summaries(),
    })
}

/// POST /meals - Create an empty meal and make it active
pub async fn create_meal(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<NameRequest>,
) -> Result<(StatusCode, Json<Meal>), ApiError> {
    let mut app = ctx.app.lock().await;
    let meal = app.catalog_mut().create(&req.name).await.map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(meal.clone())))
}

/// POST /meals/import - Import a meal document; the body is the raw JSON
pub async fn import_meal(
    State(ctx): State<AppContext>,
    body: String,
) -> Result<(StatusCode, Json<Meal>), ApiError> {
    let mut app = ctx.app.lock().await;
    let meal = app.catalog_mut().import_json(&body).await.map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(meal.clone())))
}

/// GET /meals/active - Full document of the active meal
pub async fn get_active_meal(State(ctx): State<AppContext>) -> Json<Meal> {
    let app = ctx.app.lock().await;
    Json(app.catalog().active().clone())
}

/// GET /meals/:id/export - Pretty-printed meal document
pub async fn export_meal(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<([(header::HeaderName, &'static str); 1], String), ApiError> {
    let app = ctx.app.lock().await;
    let json = app.catalog().export_json(&id).map_err(api_error)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], json))
}

/// POST /meals/:id/copy - Duplicate a meal and make the copy active
pub async fn copy_meal(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<CopyRequest>,
) -> Result<(StatusCode, Json<Meal>), ApiError> {
    let mut app = ctx.app.lock().await;
    let meal = app
        .catalog_mut()
        .copy(&id, req.name.as_deref())
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(meal.clone())))
}

/// POST /meals/:id/select - Make a meal active
///
/// An armed session keeps its timers; they belong to the meal they were
/// armed for.
pub async fn select_meal(State(ctx): State<AppContext>, Path(id): Path<String>) -> ApiResult<Meal> {
    let mut app = ctx.app.lock().await;
    let meal = app.catalog_mut().select(&id).await.map_err(api_error)?;
    Ok(Json(meal.clone()))
}

/// DELETE /meals/:id - Delete a meal (never the last one)
pub async fn delete_meal(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusResponse> {
    let mut app = ctx.app.lock().await;
    app.catalog_mut().delete(&id).await.map_err(api_error)?;
    info!("Meal {} deleted via API", id);
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

/// PUT /meals/active/serve - Set or clear the serve date and time
pub async fn set_serve(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<ServeRequest>,
) -> ApiResult<Meal> {
    let date: Option<NaiveDate> =
        parse_optional(req.serve_date.as_deref(), parse_serve_date, "serve date").map_err(api_error)?;
    let time: Option<NaiveTime> =
        parse_optional(req.serve_time.as_deref(), parse_serve_time, "serve time").map_err(api_error)?;

    let mut app = ctx.app.lock().await;
    Ok(Json(app.catalog_mut().set_serve(date, time).await))
}

// ============================================================================
// Dish and Stage Endpoints
// ============================================================================

/// POST /meals/active/dishes - Append a dish
pub async fn add_dish(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<NameRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let mut app = ctx.app.lock().await;
    let id = app.catalog_mut().add_dish(&req.name).await;
    let meal = app.catalog().active().clone();
    Ok((StatusCode::CREATED, Json(CreatedResponse { id, meal })))
}

/// PUT /meals/active/dishes/:dish_id - Rename a dish
pub async fn rename_dish(
    State(ctx): State<AppContext>,
    Path(dish_id): Path<String>,
    ApiJson(req): ApiJson<NameRequest>,
) -> ApiResult<Meal> {
    let mut app = ctx.app.lock().await;
    app.catalog_mut()
        .rename_dish(&dish_id, &req.name)
        .await
        .map_err(api_error)?;
    Ok(Json(app.catalog().active().clone()))
}

/// DELETE /meals/active/dishes/:dish_id
pub async fn remove_dish(
    State(ctx): State<AppContext>,
    Path(dish_id): Path<String>,
) -> ApiResult<Meal> {
    let mut app = ctx.app.lock().await;
    app.catalog_mut().remove_dish(&dish_id).await.map_err(api_error)?;
    Ok(Json(app.catalog().active().clone()))
}

/// POST /meals/active/dishes/:dish_id/move
pub async fn move_dish(
    State(ctx): State<AppContext>,
    Path(dish_id): Path<String>,
    ApiJson(req): ApiJson<MoveRequest>,
) -> ApiResult<MoveResponse> {
    let mut app = ctx.app.lock().await;
    let moved = app
        .catalog_mut()
        .move_dish(&dish_id, req.direction)
        .await
        .map_err(api_error)?;
    let meal = app.catalog().active().clone();
    Ok(Json(MoveResponse { moved, meal }))
}

/// POST /meals/active/dishes/:dish_id/stages - Append a default stage
pub async fn add_stage(
    State(ctx): State<AppContext>,
    Path(dish_id): Path<String>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let mut app = ctx.app.lock().await;
    let id = app.catalog_mut().add_stage(&dish_id).await.map_err(api_error)?;
    let meal = app.catalog().active().clone();
    Ok((StatusCode::CREATED, Json(CreatedResponse { id, meal })))
}

/// PUT /meals/active/dishes/:dish_id/stages/:stage_id - Patch a stage
pub async fn update_stage(
    State(ctx): State<AppContext>,
    Path((dish_id, stage_id)): Path<(String, String)>,
    ApiJson(patch): ApiJson<StagePatch>,
) -> ApiResult<Meal> {
    let mut app = ctx.app.lock().await;
    app.catalog_mut()
        .update_stage(&dish_id, &stage_id, &patch)
        .await
        .map_err(api_error)?;
    Ok(Json(app.catalog().active().clone()))
}

/// DELETE /meals/active/dishes/:dish_id/stages/:stage_id
pub async fn remove_stage(
    State(ctx): State<AppContext>,
    Path((dish_id, stage_id)): Path<(String, String)>,
) -> ApiResult<Meal> {
    let mut app = ctx.app.lock().await;
    app.catalog_mut()
        .remove_stage(&dish_id, &stage_id)
        .await
        .map_err(api_error)?;
    Ok(Json(app.catalog().active().clone()))
}

/// POST /meals/active/dishes/:dish_id/stages/:stage_id/move
pub async fn move_stage(
    State(ctx): State<AppContext>,
    Path((dish_id, stage_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<MoveRequest>,
) -> ApiResult<MoveResponse> {
    let mut app = ctx.app.lock().await;
    let moved = app
        .catalog_mut()
        .move_stage(&dish_id, &stage_id, req.direction)
        .await
        .map_err(api_error)?;
    let meal = app.catalog().active().clone();
    Ok(Json(MoveResponse { moved, meal }))
}

// ============================================================================
// Timeline and Session Endpoints
// ============================================================================

/// GET /timeline?filter=all|upcoming|done&granularity=all|start|end
pub async fn get_timeline(
    State(ctx): State<AppContext>,
    Query(query): Query<TimelineQuery>,
) -> ApiResult<TimelineView> {
    let filter: TimelineFilter = query
        .filter
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(api_error)?;
    let granularity: Granularity = query
        .granularity
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(api_error)?;

    let app = ctx.app.lock().await;
    Ok(Json(app.timeline(filter, granularity)))
}

/// GET /session - Current session status
pub async fn get_session(State(ctx): State<AppContext>) -> Json<SessionView> {
    let app = ctx.app.lock().await;
    Json(app.session_view())
}

/// POST /session/arm - Arm a session for the active meal
pub async fn arm_session(State(ctx): State<AppContext>) -> ApiResult<ArmResponse> {
    let mut app = ctx.app.lock().await;
    let outcome = app.arm_active().await.map_err(api_error)?;
    Ok(Json(ArmResponse {
        serve_when: outcome.serve_when,
        scheduled: outcome.scheduled,
        skipped: outcome.skipped,
        session: app.session_view(),
    }))
}

/// POST /session/stop - Stop the session (no-op when idle)
pub async fn stop_session(State(ctx): State<AppContext>) -> ApiResult<StopResponse> {
    let mut app = ctx.app.lock().await;
    let stopped = app.stop().await.map_err(api_error)?;
    Ok(Json(StopResponse { stopped }))
}

/// POST /sound/test - Play the sound-check cue
pub async fn test_sound(State(ctx): State<AppContext>) -> Json<SoundTestResponse> {
    let app = ctx.app.lock().await;
    Json(SoundTestResponse {
        played: app.test_sound(),
    })
}
