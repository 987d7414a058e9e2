use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::api::models::Envelope;
use crate::error::ScheduleError;
use crate::schedules::{Schedule, ScheduleFields, ScheduleManager};

pub mod models;

#[derive(Clone)]
pub struct ApiState {
    pub manager: ScheduleManager,
    /// Include internal error text in 500 responses.
    pub expose_error_details: bool,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(schedule_routes())
        // legacy clients call the /api prefix
        .nest("/api", schedule_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn schedule_routes() -> Router<ApiState> {
    Router::new()
        .route("/schedules", get(list_schedules).post(create_schedule))
        .route(
            "/schedules/:id",
            get(get_schedule)
                .patch(update_schedule)
                .delete(delete_schedule),
        )
        .route("/schedules/:id/notify", post(notify_schedule))
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(Envelope::error(self.message))).into_response()
    }
}

impl ApiState {
    fn fail(&self, e: ScheduleError) -> ApiError {
        let status = match &e {
            ScheduleError::Validation(_) | ScheduleError::InvalidId(_) => StatusCode::BAD_REQUEST,
            ScheduleError::NotFound => StatusCode::NOT_FOUND,
            ScheduleError::Notification(_) | ScheduleError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = if status.is_server_error() {
            tracing::error!(code = e.code(), error = %e, "request failed");
            if self.expose_error_details {
                e.to_string()
            } else {
                match e {
                    ScheduleError::Notification(_) => "Failed to send notification".to_string(),
                    _ => "Internal server error".to_string(),
                }
            }
        } else {
            match e {
                ScheduleError::NotFound => "Schedule not found".to_string(),
                other => other.to_string(),
            }
        };

        ApiError { status, message }
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_id(state: &ApiState, raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| state.fail(ScheduleError::InvalidId(raw.to_string())))
}

fn body(
    state: &ApiState,
    payload: Result<Json<ScheduleFields>, JsonRejection>,
) -> ApiResult<ScheduleFields> {
    payload
        .map(|Json(fields)| fields)
        .map_err(|rejection| state.fail(ScheduleError::validation(rejection.body_text())))
}

pub async fn list_schedules(
    State(state): State<ApiState>,
) -> ApiResult<Json<Envelope<Vec<Schedule>>>> {
    let schedules = state.manager.list().await.map_err(|e| state.fail(e))?;
    Ok(Json(Envelope::ok(schedules)))
}

pub async fn create_schedule(
    State(state): State<ApiState>,
    payload: Result<Json<ScheduleFields>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<Schedule>>)> {
    let fields = body(&state, payload)?;
    let schedule = state.manager.create(fields).await.map_err(|e| state.fail(e))?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(schedule))))
}

pub async fn get_schedule(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<Schedule>>> {
    let id = parse_id(&state, &id)?;
    let schedule = state.manager.get(id).await.map_err(|e| state.fail(e))?;
    Ok(Json(Envelope::ok(schedule)))
}

pub async fn update_schedule(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    payload: Result<Json<ScheduleFields>, JsonRejection>,
) -> ApiResult<Json<Envelope<Schedule>>> {
    let id = parse_id(&state, &id)?;
    let fields = body(&state, payload)?;
    let schedule = state
        .manager
        .update(id, fields)
        .await
        .map_err(|e| state.fail(e))?;
    Ok(Json(Envelope::ok(schedule)))
}

pub async fn delete_schedule(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<()>>> {
    let id = parse_id(&state, &id)?;
    state.manager.delete(id).await.map_err(|e| state.fail(e))?;
    Ok(Json(Envelope::message("Schedule deleted")))
}

pub async fn notify_schedule(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<Schedule>>> {
    let id = parse_id(&state, &id)?;
    let schedule = state.manager.notify(id).await.map_err(|e| state.fail(e))?;
    Ok(Json(Envelope::ok(schedule).with_message("Notification sent")))
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
