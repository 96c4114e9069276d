//! REST surface driven against the live runtime: setpoints and relay
//! switches entered over HTTP must reach the node states and, through the
//! mocks, come back as reported device state.

mod helpers;

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use helpers::TestHarness;
use wb_http_api::{AppState, build_router};

async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

#[tokio::test(start_paused = true)]
async fn setpoint_over_http_heats_the_kettle() {
    let harness = TestHarness::new();
    harness.start().await;
    harness.connect().await;
    let router = build_router(AppState::new(harness.runtime.clone()));

    tokio::time::sleep(Duration::from_secs(2)).await;

    let (status, json) = get_json(&router, "/kettle/kettle_1/temp/set?r=66.0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");

    tokio::time::sleep(Duration::from_secs(3)).await;

    // The controller saw the setpoint and drove the heat plate; the mock
    // echoed the command back as reported state, visible over HTTP.
    let (status, json) = get_json(&router, "/kettle/kettle_1/heat_plate").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["on"], true);

    harness.runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn steering_switch_round_trips() {
    let harness = TestHarness::new();
    harness.start().await;
    harness.connect().await;
    let router = build_router(AppState::new(harness.runtime.clone()));

    let (status, json) = get_json(&router, "/kettle/kettle_1/steering/on").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["state"], "on");

    // Producer → send task → mock echo → dispatch.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let (status, json) = get_json(&router, "/kettle/kettle_1/steering").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["on"], true);

    harness.runtime.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn endpoints_fail_cleanly_after_device_loss() {
    let harness = TestHarness::new();
    harness.start().await;
    harness.connect().await;
    let router = build_router(AppState::new(harness.runtime.clone()));

    let (status, _) = get_json(&router, "/kettle/kettle_1/temp").await;
    assert_eq!(status, StatusCode::OK);

    harness.disconnect().await;

    // Session gone: the assembly no longer exists.
    let (status, json) = get_json(&router, "/kettle/kettle_1/temp").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");

    harness.runtime.stop().await.unwrap();
}
