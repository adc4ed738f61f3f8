use super::common::*;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::charges::domain::HeatingSystem;
use crate::workflows::charges::repository::NoLedger;
use crate::error::AppError;
use crate::workflows::charges::domain::{AllocationError, BuildingId};
use crate::workflows::charges::repository::RepositoryError;
use crate::workflows::charges::router::{calculate_handler, error_response, reserve_fund_handler};
use crate::workflows::charges::ChargesServiceError;
use crate::workflows::charges::{charges_router, CalculateRequest, ChargesService};

fn request(start: (i32, u32, u32), end: (i32, u32, u32)) -> CalculateRequest {
    CalculateRequest {
        building_id: BUILDING,
        period_start_date: date(start.0, start.1, start.2),
        period_end_date: date(end.0, end.1, end.2),
        as_of: Some(settled()),
    }
}

#[tokio::test]
async fn calculate_handler_returns_statement() {
    let response = calculate_handler::<MemoryStore, MemoryLedger>(
        State(heating_service()),
        axum::Json(request((2025, 9, 1), (2025, 9, 30))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["shares"]["10"]["total_due"], "37.00");
    assert_eq!(payload["shares"]["11"]["breakdown"]["heating_variable"], "42.00");
    assert_eq!(payload["totals"]["grand_total"], "100.00");
}

#[tokio::test]
async fn calculate_handler_maps_inverted_period_to_bad_request() {
    let response = calculate_handler::<MemoryStore, MemoryLedger>(
        State(heating_service()),
        axum::Json(request((2025, 9, 30), (2025, 9, 1))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn calculate_handler_maps_configuration_errors_to_unprocessable() {
    let (expenses, readings) = heating_scenario();
    let store = MemoryStore::new(building(HeatingSystem::HourMeters, None), two_apartments())
        .with_expenses(expenses)
        .with_readings(readings);
    let (service, _) = build_service(store);

    let response = calculate_handler::<MemoryStore, MemoryLedger>(
        State(service),
        axum::Json(request((2025, 9, 1), (2025, 9, 30))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    let configuration = payload["errors"]["configuration"]
        .as_str()
        .expect("configuration message");
    assert!(configuration.contains("heating_fixed_percentage"));
}

#[tokio::test]
async fn calculate_handler_returns_internal_error_on_repository_failure() {
    let service = Arc::new(ChargesService::new(
        Arc::new(UnavailableStore),
        Arc::new(NoLedger),
    ));

    let response = calculate_handler::<UnavailableStore, NoLedger>(
        State(service),
        axum::Json(request((2025, 9, 1), (2025, 9, 30))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "internal charges fault");
}

#[tokio::test]
async fn error_responses_share_the_application_status_mapping() {
    let errors = || {
        vec![
            ChargesServiceError::BuildingNotFound(BuildingId(7)),
            ChargesServiceError::from(AllocationError::input_range("period", "reversed")),
            ChargesServiceError::from(AllocationError::configuration(
                BuildingId(1),
                "heating_system",
                "no heating",
            )),
            ChargesServiceError::from(AllocationError::Reconciliation {
                category: "operational",
                expected: rust_decimal::Decimal::ONE,
                allocated: rust_decimal::Decimal::ZERO,
            }),
            ChargesServiceError::from(RepositoryError::Unavailable("offline".to_string())),
        ]
    };

    let expected: Vec<_> = errors()
        .into_iter()
        .map(|err| AppError::from(err).status())
        .collect();
    let actual: Vec<_> = errors()
        .into_iter()
        .map(|err| error_response(err).status())
        .collect();

    assert_eq!(actual, expected);
    assert_eq!(
        actual,
        vec![
            StatusCode::NOT_FOUND,
            StatusCode::BAD_REQUEST,
            StatusCode::UNPROCESSABLE_ENTITY,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::INTERNAL_SERVER_ERROR,
        ]
    );
}

#[tokio::test]
async fn reserve_fund_handler_returns_not_found_for_unknown_building() {
    let response = reserve_fund_handler::<MemoryStore, MemoryLedger>(
        State(heating_service()),
        Path(404),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn calculate_route_accepts_json_payloads() {
    let router = charges_router(heating_service());

    let body = json!({
        "building_id": 1,
        "period_start_date": "2025-09-01",
        "period_end_date": "2025-09-30",
        "as_of": "2026-01-15",
    });
    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/charges/calculate")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&body).expect("serializable"),
                ))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["building_id"], 1);
    assert_eq!(payload["shares"]["10"]["apartment_number"], "A1");
}

#[tokio::test]
async fn reserve_fund_route_reports_schedule() {
    let mut reserve_building = building(HeatingSystem::None, None);
    reserve_building.reserve_contribution_per_apartment = Some(rust_decimal_macros::dec!(80));
    let (service, _) = build_service(MemoryStore::new(reserve_building, two_apartments()));
    let router = charges_router(service);

    let response = router
        .oneshot(
            axum::http::Request::get("/api/v1/buildings/1/reserve-fund")
                .body(axum::body::Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["mode"], "flat");
    assert_eq!(payload["mills_total"], 1000);
    let per_mill: rust_decimal::Decimal = payload["per_mill"]
        .as_str()
        .expect("decimal string")
        .parse()
        .expect("decimal");
    assert_eq!(per_mill, rust_decimal_macros::dec!(0.08));
}
