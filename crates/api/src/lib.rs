use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, Query, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::error;
use trip_core::{CatalogStats, ItineraryCombination, PlanOutcome, PlannerError, TripRequest};
use trip_observability::{AppMetrics, MetricsSnapshot};
use trip_service::{open_store, PlannerConfig, TripPlannerService};
use trip_storage::Store;

const DEFAULT_PREDICTION_LIMIT: usize = 20;
const MAX_PREDICTION_LIMIT: usize = 200;
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct ApiState {
    pub planner: Arc<TripPlannerService<Store>>,
    pub metrics: Arc<AppMetrics>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    catalog: CatalogStats,
    model: &'static str,
    fallback_model: bool,
}

#[derive(Debug, Deserialize)]
struct PredictionsQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ConfirmPlanRequest {
    plan_number: u32,
    full_plan: ItineraryCombination,
}

pub async fn build_app(config: &PlannerConfig) -> Result<Router> {
    let metrics = AppMetrics::shared();
    let store = Arc::new(open_store(config).await?);
    let planner = Arc::new(TripPlannerService::bootstrap(
        config,
        store,
        metrics.clone(),
    )?);

    Ok(build_router(ApiState { planner, metrics }))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/predictions", get(list_predictions))
        .route(
            "/confirmed-plans",
            get(list_confirmed_plans).post(confirm_plan),
        )
        .route("/confirmed-plans/:id", delete(delete_confirmed_plan))
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Trip Budget Prediction API is up and running!"
    }))
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        catalog: state.planner.catalog_stats(),
        model: state.planner.model_name(),
        fallback_model: state.planner.uses_fallback_model(),
    };
    (StatusCode::OK, Json(payload))
}

async fn predict(
    State(state): State<ApiState>,
    payload: Result<Json<TripRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return validation_failed(rejection.body_text()),
    };

    match state.planner.predict(request).await {
        Ok(report) => match report.outcome {
            PlanOutcome::Combinations(combinations) => (
                StatusCode::OK,
                Json(serde_json::json!({ "combinations": combinations })),
            )
                .into_response(),
            PlanOutcome::Rejected(rejection) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(rejection)).into_response()
            }
        },
        Err(error) => match error.downcast_ref::<PlannerError>() {
            Some(PlannerError::Validation(validation)) => validation_failed(validation.to_string()),
            Some(PlannerError::Encoding(encoding)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({
                    "error": "unknown_category",
                    "message": encoding.to_string()
                })),
            )
                .into_response(),
            _ => {
                error!(error = ?error, "prediction failed");
                internal_error("prediction_failed", &error)
            }
        },
    }
}

async fn list_predictions(
    State(state): State<ApiState>,
    Query(query): Query<PredictionsQuery>,
) -> Response {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PREDICTION_LIMIT)
        .clamp(1, MAX_PREDICTION_LIMIT);

    match state.planner.recent_predictions(limit).await {
        Ok(predictions) => (
            StatusCode::OK,
            Json(serde_json::json!({ "predictions": predictions })),
        )
            .into_response(),
        Err(error) => internal_error("storage_failed", &error),
    }
}

async fn list_confirmed_plans(State(state): State<ApiState>) -> Response {
    match state.planner.list_confirmed_plans().await {
        Ok(plans) => (
            StatusCode::OK,
            Json(serde_json::json!({ "confirmed_plans": plans })),
        )
            .into_response(),
        Err(error) => internal_error("storage_failed", &error),
    }
}

async fn confirm_plan(
    State(state): State<ApiState>,
    payload: Result<Json<ConfirmPlanRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return validation_failed(rejection.body_text()),
    };
    if request.full_plan.plan.is_empty() {
        return validation_failed("full_plan must contain at least one package".to_string());
    }

    match state
        .planner
        .confirm_plan(request.plan_number, request.full_plan)
        .await
    {
        Ok(plan) => (StatusCode::CREATED, Json(plan)).into_response(),
        Err(error) => internal_error("storage_failed", &error),
    }
}

async fn delete_confirmed_plan(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Response {
    match state.planner.delete_confirmed_plan(&id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({ "deleted": true })),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "not_found",
                "message": format!("no confirmed plan with id {}", id)
            })),
        )
            .into_response(),
        Err(error) => internal_error("storage_failed", &error),
    }
}

fn validation_failed(message: String) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(serde_json::json!({
            "error": "validation_failed",
            "message": message
        })),
    )
        .into_response()
}

fn internal_error(code: &'static str, error: &anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": code,
            "message": error.to_string()
        })),
    )
        .into_response()
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
