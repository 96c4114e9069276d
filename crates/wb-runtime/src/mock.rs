//! In-process mock devices and the thermodynamic simulator.
//!
//! A mock node bypasses the CAN port entirely: its source task drops
//! synthesized rx items onto the mock queue (dispatched exactly like real
//! frames), and outbound messages reach it through `handle_message` from the
//! send task. The simulator couples the heat-plate relay state to the water
//! temperature so the control loop can be exercised off-bench.

use std::sync::Arc;

use rand_distr::{Distribution, Normal};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Duration;

use wb_config::Node;
use wb_protocol::{Payload, Value};

use crate::error::{RuntimeError, RuntimeResult};
use crate::node_state::SharedNodeState;
use crate::queue::{QueueItem, QueueSender};

/// Emission period of mock sources, seconds.
pub const MOCK_MSG_INTERVAL: f64 = 0.1;

/// Simulator tick, seconds.
pub const SIM_INTERVAL: f64 = 0.1;

pub type SharedMockNode = Arc<Mutex<MockNode>>;

/// An in-process substitute for one physical device.
pub struct MockNode {
    node: Arc<Node>,
    variant: MockVariant,
}

enum MockVariant {
    Thermometer(MockThermometer),
    Relay(MockRelay),
}

/// Simulated thermometer: reads the simulator temperature, adds Gaussian
/// measurement noise, and derives the sensor voltage from the calibration
/// line `temp_c = m * temp_v + b`.
pub struct MockThermometer {
    error_mu: f64,
    error_sigma: f64,
    v_to_temp_m: f64,
    v_to_temp_b: f64,
    sim: Arc<RwLock<SimState>>,
}

impl MockThermometer {
    fn from_node(node: &Node, sim: Arc<RwLock<SimState>>) -> Self {
        Self {
            error_mu: 0.0,
            error_sigma: node.param_f64("error_sigma").unwrap_or(0.2),
            v_to_temp_m: node.param_f64("v_to_temp_m").unwrap_or(23.69448038),
            v_to_temp_b: node.param_f64("v_to_temp_b").unwrap_or(-4.59983094),
            sim,
        }
    }

    fn measure_error(&self) -> f64 {
        Normal::new(self.error_mu, self.error_sigma)
            .map(|dist| dist.sample(&mut rand::thread_rng()))
            .unwrap_or(0.0)
    }

    async fn sample(&self) -> Payload {
        let temp_c = self.sim.read().await.temp + self.measure_error();
        let temp_v = (temp_c - self.v_to_temp_b) / self.v_to_temp_m;
        Payload::from([
            ("temp_c".to_string(), Value::Float(temp_c)),
            ("temp_v".to_string(), Value::Float(temp_v)),
        ])
    }
}

/// Simulated relay: remembers the last `relay_cmd` and periodically echoes
/// it back as `relay_state`.
pub struct MockRelay {
    relay_state: Payload,
}

impl MockRelay {
    fn new() -> Self {
        Self {
            relay_state: Payload::from([("on".to_string(), Value::Flag(false))]),
        }
    }
}

impl MockNode {
    /// Build the mock for `node`, resolving its `mock_class` tag through the
    /// factory table. Non-mocked nodes have no mock.
    pub fn from_config(
        node: &Arc<Node>,
        sim: Arc<RwLock<SimState>>,
    ) -> RuntimeResult<Option<MockNode>> {
        if !node.mock {
            return Ok(None);
        }
        let Some(class) = node.mock_class.as_deref() else {
            return Err(RuntimeError::MissingMockClass(node.key.clone()));
        };

        let variant = match class {
            "thermometer" => MockVariant::Thermometer(MockThermometer::from_node(node, sim)),
            "relay" => MockVariant::Relay(MockRelay::new()),
            other => return Err(RuntimeError::UnknownMockClass(other.to_string())),
        };

        Ok(Some(MockNode {
            node: node.clone(),
            variant,
        }))
    }

    pub fn node_key(&self) -> &str {
        &self.node.key
    }

    /// Receive one outbound message routed to this mock by the send task.
    /// A message the device does not accept is a programmer error.
    pub fn handle_message(&mut self, msg_key: &str, payload: Payload) -> RuntimeResult<()> {
        match (&mut self.variant, msg_key) {
            (MockVariant::Relay(relay), "relay_cmd") => {
                relay.relay_state = payload;
                Ok(())
            }
            _ => Err(RuntimeError::InvalidMessage {
                node: self.node.key.clone(),
                message: msg_key.to_string(),
            }),
        }
    }

    /// Synthesize the next rx item this device would put on the bus.
    pub async fn emit(&self) -> QueueItem {
        match &self.variant {
            MockVariant::Thermometer(therm) => QueueItem {
                node_key: self.node.key.clone(),
                msg_key: "therm_state".to_string(),
                payload: therm.sample().await,
            },
            MockVariant::Relay(relay) => QueueItem {
                node_key: self.node.key.clone(),
                msg_key: "relay_state".to_string(),
                payload: relay.relay_state.clone(),
            },
        }
    }
}

/// Periodic source task of one mock node: synthesize an rx item and drop it
/// onto the mock queue.
pub async fn mock_source(mock: SharedMockNode, queue: QueueSender) -> anyhow::Result<()> {
    loop {
        let item = {
            let mock = mock.lock().await;
            mock.emit().await
        };
        queue.send(item)?;
        tokio::time::sleep(Duration::from_secs_f64(MOCK_MSG_INTERVAL)).await;
    }
}

/// Thermodynamic state of the simulated kettle.
///
/// The heat plate feeds `effective_power` through a first-order lag with
/// time constant `tau`; temperature integrates the power balance between
/// heating and ambient losses.
pub struct SimState {
    /// Water temperature, degC.
    pub temp: f64,
    /// Lagged heating power, W.
    pub effective_power: f64,
    /// Heat plate power when energized, W.
    p_on: f64,
    /// Water mass, kg.
    water_amount: f64,
    /// Heat capacity of water, J/(kg K).
    water_heat_capacity: f64,
    /// Heating inertia time constant, s.
    tau: f64,
    /// Ambient temperature, degC.
    ambient: f64,
    /// Heat loss coefficient, W per degC difference. Chosen so the kettle
    /// levels off at 100 degC under full power.
    k: f64,
}

impl SimState {
    pub fn new() -> Self {
        let p_on = 5000.0;
        let ambient = 20.0;
        Self {
            temp: 20.0,
            effective_power: 0.0,
            p_on,
            water_amount: 20.0,
            water_heat_capacity: 4186.0,
            tau: 2.0,
            ambient,
            k: p_on / (100.0 - ambient),
        }
    }

    /// Advance the model by `dt` seconds with the heat plate relay in the
    /// given state.
    pub fn step(&mut self, heating: bool, dt: f64) {
        let target_power = if heating { self.p_on } else { 0.0 };
        self.effective_power += (target_power - self.effective_power) * dt / self.tau;

        let temp_diff = (self.effective_power - self.k * (self.temp - self.ambient)) * dt
            / (self.water_amount * self.water_heat_capacity);
        self.temp += temp_diff;
    }
}

impl Default for SimState {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulator tick task: read the heat-plate relay's reported state, advance
/// the model.
pub async fn simulation_task(
    sim: Arc<RwLock<SimState>>,
    heat_plate: Option<SharedNodeState>,
) -> anyhow::Result<()> {
    loop {
        let heating = match &heat_plate {
            Some(state) => state
                .read()
                .await
                .rx_state("relay_state")
                .and_then(|payload| payload.get("on"))
                .and_then(|value| value.as_bool())
                .unwrap_or(false),
            None => false,
        };
        sim.write().await.step(heating, SIM_INTERVAL);
        tokio::time::sleep(Duration::from_secs_f64(SIM_INTERVAL)).await;
    }
}
