use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::error::AppError;

use super::domain::BuildingId;
use super::repository::{ChargesDataSource, PaymentLedger};
use super::service::{ChargesService, ChargesServiceError};

/// Body of a `calculate_advanced` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateRequest {
    pub building_id: BuildingId,
    pub period_start_date: NaiveDate,
    pub period_end_date: NaiveDate,
    /// Reference date for the management-fee month rule; defaults to today.
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

/// Router builder exposing the charges calculation endpoints.
pub fn charges_router<S, L>(service: Arc<ChargesService<S, L>>) -> Router
where
    S: ChargesDataSource + 'static,
    L: PaymentLedger + 'static,
{
    Router::new()
        .route("/api/v1/charges/calculate", post(calculate_handler::<S, L>))
        .route(
            "/api/v1/buildings/:building_id/reserve-fund",
            get(reserve_fund_handler::<S, L>),
        )
        .with_state(service)
}

pub(crate) async fn calculate_handler<S, L>(
    State(service): State<Arc<ChargesService<S, L>>>,
    axum::Json(request): axum::Json<CalculateRequest>,
) -> Response
where
    S: ChargesDataSource + 'static,
    L: PaymentLedger + 'static,
{
    let as_of = request
        .as_of
        .unwrap_or_else(|| Local::now().date_naive());

    match service.calculate_advanced(
        request.building_id,
        request.period_start_date,
        request.period_end_date,
        as_of,
    ) {
        Ok(statement) => (StatusCode::OK, axum::Json(statement)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reserve_fund_handler<S, L>(
    State(service): State<Arc<ChargesService<S, L>>>,
    Path(building_id): Path<u64>,
) -> Response
where
    S: ChargesDataSource + 'static,
    L: PaymentLedger + 'static,
{
    match service.reserve_schedule(BuildingId(building_id)) {
        Ok(schedule) => (StatusCode::OK, axum::Json(schedule)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) fn error_response(err: ChargesServiceError) -> Response {
    let message = err.to_string();
    let status = AppError::from(err).status();
    let payload = match status {
        StatusCode::UNPROCESSABLE_ENTITY => json!({
            "error": message,
            "errors": {
                "missing_readings": [],
                "configuration": message,
            },
        }),
        StatusCode::INTERNAL_SERVER_ERROR => {
            error!(error = %message, "charges calculation failed");
            json!({ "error": "internal charges fault" })
        }
        _ => json!({ "error": message }),
    };
    (status, axum::Json(payload)).into_response()
}
