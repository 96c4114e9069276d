//! Kettle endpoints and the router builder.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::Router;
use serde_json::{Value as JsonValue, json};
use tower_http::trace::TraceLayer;

use wb_protocol::{Payload, Value, format_on_off, parse_on_off};
use wb_runtime::KettleAssembly;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/kettle/{key}/temp", get(get_temp))
        .route("/kettle/{key}/temp/set", get(set_temp))
        .route("/kettle/{key}/heat_plate", get(get_heat_plate))
        .route("/kettle/{key}/heat_plate/{on_off}", get(set_heat_plate))
        .route("/kettle/{key}/steering", get(get_steering))
        .route("/kettle/{key}/steering/{on_off}", get(set_steering))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /kettle/{key}/temp — combined thermometer reading.
async fn get_temp(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let kettle = kettle(&state, "get_temp", &key).await?;
    let reading = kettle.temp_state().await;
    Ok(success(
        "get_temp",
        json!({"temp_c": reading.temp_c, "temp_v": reading.temp_v}),
    ))
}

/// GET /kettle/{key}/temp/set?r=<degC> — set the heat-plate setpoint.
async fn set_temp(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    let kettle = kettle(&state, "set_temp", &key).await?;
    let setpoint: f64 = params
        .get("r")
        .ok_or_else(|| ApiError::new("set_temp", "missing query parameter 'r'"))?
        .parse()
        .map_err(|_| ApiError::new("set_temp", "query parameter 'r' is not a number"))?;

    kettle.set_setpoint(setpoint).await;
    Ok(success("set_temp", json!({"setpoint": setpoint})))
}

/// GET /kettle/{key}/heat_plate — last reported heat-plate relay state.
async fn get_heat_plate(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let kettle = kettle(&state, "get_heat_plate", &key).await?;
    Ok(success(
        "get_heat_plate",
        payload_to_json(kettle.heat_plate_state().await),
    ))
}

/// GET /kettle/{key}/heat_plate/{on|off} — command the heat plate.
async fn set_heat_plate(
    State(state): State<AppState>,
    Path((key, on_off)): Path<(String, String)>,
) -> Result<Json<JsonValue>, ApiError> {
    let kettle = kettle(&state, "set_heat_plate", &key).await?;
    let on = parse_switch("set_heat_plate", &on_off)?;
    kettle
        .set_heat_plate(on)
        .await
        .map_err(|e| ApiError::new("set_heat_plate", e.to_string()))?;
    Ok(success("set_heat_plate", json!({"state": format_on_off(on)})))
}

/// GET /kettle/{key}/steering — last reported steering relay state.
async fn get_steering(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let kettle = kettle(&state, "get_steering", &key).await?;
    Ok(success(
        "get_steering",
        payload_to_json(kettle.steering_state().await),
    ))
}

/// GET /kettle/{key}/steering/{on|off} — command the steering motor.
async fn set_steering(
    State(state): State<AppState>,
    Path((key, on_off)): Path<(String, String)>,
) -> Result<Json<JsonValue>, ApiError> {
    let kettle = kettle(&state, "set_steering", &key).await?;
    let on = parse_switch("set_steering", &on_off)?;
    kettle
        .set_steering(on)
        .await
        .map_err(|e| ApiError::new("set_steering", e.to_string()))?;
    Ok(success("set_steering", json!({"state": format_on_off(on)})))
}

async fn kettle(state: &AppState, action: &str, key: &str) -> Result<KettleAssembly, ApiError> {
    state
        .runtime
        .kettle(key)
        .await
        .ok_or_else(|| ApiError::new(action, format!("unknown assembly '{key}'")))
}

fn parse_switch(action: &str, token: &str) -> Result<bool, ApiError> {
    parse_on_off(token).map_err(|e| ApiError::new(action, e.to_string()))
}

fn success(action: &str, data: JsonValue) -> Json<JsonValue> {
    Json(json!({
        "action": action,
        "status": "success",
        "data": data,
    }))
}

fn payload_to_json(payload: Option<Payload>) -> JsonValue {
    match payload {
        None => JsonValue::Null,
        Some(payload) => {
            let map: serde_json::Map<String, JsonValue> = payload
                .into_iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::Int(v) => json!(v),
                        Value::Float(v) => json!(v),
                        Value::Flag(v) => json!(v),
                    };
                    (key, value)
                })
                .collect();
            JsonValue::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    use wb_canbus::{CanPort, MockBusDriver};
    use wb_config::{Catalog, Config};
    use wb_runtime::Runtime;

    fn catalog() -> Arc<Catalog> {
        let yaml = r#"
port: {process_interval: 0.01, device_connect_interval: 0.05}
message_types:
  - key: therm_state
    dbc_name: TEMP_STATE
    pgn: 0xFF10
    direction: rx
    signals:
      - {key: temp_c, dbc_name: TEMP_C, start_bit: 0, signal_size: 16, signed: true, value_scale: 0.01, unit: degC, py_type: float}
      - {key: temp_v, dbc_name: TEMP_V, start_bit: 16, signal_size: 16, value_scale: 0.001, unit: V, py_type: float}
  - key: relay_state
    dbc_name: RELAY_STATE_MSG
    pgn: 0xFF20
    direction: rx
    signals:
      - {key: on, dbc_name: RELAY_STATE, start_bit: 0, signal_size: 8, py_type: flag}
  - key: relay_cmd
    dbc_name: RELAY_CMD
    pgn: 0x1000
    direction: tx
    signals:
      - {key: on, dbc_name: RELAY_STATE, start_bit: 0, signal_size: 8, py_type: flag}
node_types:
  - {key: master, messages: [], node_state_class: master}
  - key: thermometer
    messages: [{key: therm_state, msg_type_ref: therm_state}]
    node_state_class: thermometer
    mock_class: thermometer
  - key: relay
    messages:
      - {key: relay_state, msg_type_ref: relay_state}
      - {key: relay_cmd, msg_type_ref: relay_cmd, frequency: 10.0}
    node_state_class: relay
    mock_class: relay
nodes:
  - {key: master, node_type_ref: master, node_addr: 0x00}
  - {key: temp_1, node_type_ref: thermometer, node_addr: 0x10, params: {window: 10.0, error_sigma: 0.0}, debug: {mock: true}}
  - {key: heat_plate_1, node_type_ref: relay, node_addr: 0x20, debug: {mock: true}}
  - {key: motor_1, node_type_ref: relay, node_addr: 0x21, debug: {mock: true}}
assembly_types:
  - {key: kettle, assembly_class: kettle}
assemblies:
  - key: kettle_1
    assembly_type_ref: kettle
    nodes:
      thermometer: [temp_1]
      steering: motor_1
      heat_plate: heat_plate_1
    params:
      - {name: volume, value: 35.0}
      - name: controller
        config_class: controller
        value: {p_gain: 1.0, d_gain: 120.0, max_cs: 2.5, low_jump_thres: 0.1, high_jump_thres: 0.9, pwm_interval: 10.0}
      - name: data_collect
        config_class: data_collect
        value: {window: 10.0, collect_interval: 20.0}
"#;
        Arc::new(Catalog::build(serde_yaml::from_str::<Config>(yaml).unwrap()).unwrap())
    }

    /// Runtime with an active mock session, plus its router.
    async fn app() -> (Runtime, Router) {
        let catalog = catalog();
        let driver = MockBusDriver::new();
        driver.plug();
        let port = CanPort::new(catalog.port.clone(), Box::new(driver));
        let runtime = Runtime::with_port(catalog, port);
        runtime.run().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(runtime.session_active().await);

        let router = build_router(AppState::new(runtime.clone()));
        (runtime, router)
    }

    async fn get_json(
        router: &Router,
        uri: &str,
    ) -> (StatusCode, serde_json::Value) {
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
    async fn temp_endpoint_reports_reading() {
        let (runtime, router) = app().await;
        // Let the mock thermometer feed a few samples through dispatch.
        tokio::time::sleep(Duration::from_secs(1)).await;

        let (status, json) = get_json(&router, "/kettle/kettle_1/temp").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["action"], "get_temp");
        assert_eq!(json["status"], "success");
        let temp_c = json["data"]["temp_c"].as_f64().expect("temp reported");
        assert!((temp_c - 20.0).abs() < 1.0);

        runtime.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_assembly_is_bad_request() {
        let (runtime, router) = app().await;
        let (status, json) = get_json(&router, "/kettle/kettle_9/temp").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "error");
        runtime.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn heat_plate_switch_writes_cmd_state() {
        let (runtime, router) = app().await;

        let (status, json) = get_json(&router, "/kettle/kettle_1/heat_plate/on").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["state"], "on");

        let heat_plate = runtime.node_state("heat_plate_1").await.unwrap();
        assert!(heat_plate.read().await.as_relay().unwrap().cmd_state);

        let (status, _) = get_json(&router, "/kettle/kettle_1/heat_plate/off").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!heat_plate.read().await.as_relay().unwrap().cmd_state);

        runtime.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn bad_switch_token_is_bad_request() {
        let (runtime, router) = app().await;
        let (status, json) = get_json(&router, "/kettle/kettle_1/steering/banana").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["action"], "set_steering");
        runtime.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn setpoint_round_trips_through_query() {
        let (runtime, router) = app().await;

        let (status, json) = get_json(&router, "/kettle/kettle_1/temp/set?r=66.5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["setpoint"], 66.5);

        let kettle = runtime.kettle("kettle_1").await.unwrap();
        assert_eq!(kettle.setpoint().await, Some(66.5));

        runtime.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn setpoint_requires_numeric_r() {
        let (runtime, router) = app().await;

        let (status, _) = get_json(&router, "/kettle/kettle_1/temp/set").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = get_json(&router, "/kettle/kettle_1/temp/set?r=warm").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        runtime.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn relay_states_surface_after_mock_echo() {
        let (runtime, router) = app().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let (status, json) = get_json(&router, "/kettle/kettle_1/heat_plate").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["on"], false);

        runtime.stop().await.unwrap();
    }

    #[tokio::test]
    async fn no_session_means_unknown_assembly() {
        let catalog = catalog();
        let driver = MockBusDriver::new(); // never plugged
        let port = CanPort::new(catalog.port.clone(), Box::new(driver));
        let runtime = Runtime::with_port(catalog, port);
        let router = build_router(AppState::new(runtime));

        let (status, json) = get_json(&router, "/kettle/kettle_1/temp").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "error");
    }
}
