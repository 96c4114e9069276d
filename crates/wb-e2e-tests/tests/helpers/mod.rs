//! Shared test harness for the E2E suites.
//!
//! Builds the full runtime over a scripted mock bus driver so tests can
//! plug/unplug the fake adapter and exercise the real startup, dispatch,
//! send, and teardown paths.

use std::sync::Arc;
use std::time::Duration;

use wb_canbus::{CanPort, MockBusDriver};
use wb_config::{Catalog, Config};
use wb_runtime::Runtime;

/// Calibration line of the mock thermometer, `temp_c = m * temp_v + b`.
pub const V_TO_TEMP_M: f64 = 23.69448038;
pub const V_TO_TEMP_B: f64 = -4.59983094;

/// One mocked kettle: a noiseless thermometer, a steering motor, and a heat
/// plate, all behind the scripted bus driver.
pub fn sample_catalog() -> Arc<Catalog> {
    let yaml = r#"
port: {process_interval: 0.01, device_connect_interval: 0.1, bus: {channel: can0, interface: socketcan, receive_timeout: 0.05}}
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

/// Full runtime behind a scripted bus driver, starting unplugged.
pub struct TestHarness {
    pub runtime: Runtime,
    pub driver: MockBusDriver,
}

impl TestHarness {
    pub fn new() -> Self {
        let catalog = sample_catalog();
        let driver = MockBusDriver::new();
        let port = CanPort::new(catalog.port.clone(), Box::new(driver.clone()));
        Self {
            runtime: Runtime::with_port(catalog, port),
            driver,
        }
    }

    /// Start the runtime tasks (event loop + connect poller).
    pub async fn start(&self) {
        self.runtime.run().await;
    }

    /// Plug the fake adapter and wait for the session to come up.
    pub async fn connect(&self) {
        self.driver.plug();
        self.wait_for_session(true).await;
    }

    /// Unplug the fake adapter and wait for the session to be torn down.
    pub async fn disconnect(&self) {
        self.driver.unplug();
        self.wait_for_session(false).await;
    }

    async fn wait_for_session(&self, active: bool) {
        for _ in 0..200 {
            if self.runtime.session_active().await == active {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("session did not become {}", if active { "active" } else { "inactive" });
    }
}
