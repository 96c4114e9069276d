//! Per-device state machines.
//!
//! Every configured node with a `node_state_class` tag gets one stateful
//! object: it consumes rx messages (updating variant-specific state and
//! invoking registered handlers) and produces payloads for periodic tx
//! messages. Variants are built through a string-keyed factory table that
//! resolves the class tags from the configuration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use wb_config::Node;
use wb_protocol::{Direction, Payload, Value};

use crate::error::{RuntimeError, RuntimeResult};
use crate::queue::{QueueItem, QueueSender};
use crate::series::WindowedSeries;
use crate::util::unix_time;

/// Callback invoked with every rx payload of one message key.
pub type Handler = Box<dyn Fn(&Payload) + Send + Sync>;

pub type SharedNodeState = Arc<RwLock<NodeState>>;

/// Sliding window for thermometer series when the node params say nothing.
const DEFAULT_THERM_WINDOW: f64 = 10.0;

/// Interpolated thermometer reading at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermReading {
    pub temp_c: Option<f64>,
    pub temp_v: Option<f64>,
}

/// Variant-specific state.
pub enum NodeVariant {
    Thermometer(ThermometerState),
    Relay(RelayState),
    /// Placeholder for controller-side state.
    Master,
}

pub struct ThermometerState {
    window: f64,
    temp_c: WindowedSeries,
    temp_v: WindowedSeries,
}

impl ThermometerState {
    fn new(window: f64) -> Self {
        Self {
            window,
            temp_c: WindowedSeries::new(window),
            temp_v: WindowedSeries::new(window),
        }
    }

    pub fn window(&self) -> f64 {
        self.window
    }

    /// Append one `therm_state` payload at time `now`.
    pub fn ingest(&mut self, payload: &Payload, now: f64) {
        if let Some(value) = payload.get("temp_c") {
            self.temp_c.append(now, value.as_f64());
        }
        if let Some(value) = payload.get("temp_v") {
            self.temp_v.append(now, value.as_f64());
        }
    }

    /// Linear-fit interpolation of both series at `now`.
    pub fn reading_at(&self, now: f64) -> ThermReading {
        ThermReading {
            temp_c: self.temp_c.interp_at(now),
            temp_v: self.temp_v.interp_at(now),
        }
    }
}

pub struct RelayState {
    /// Commanded state, broadcast by the periodic `relay_cmd` producer.
    pub cmd_state: bool,
}

pub struct NodeState {
    node: Arc<Node>,
    rx_state: HashMap<String, Option<Payload>>,
    handlers: HashMap<String, Vec<Handler>>,
    variant: NodeVariant,
}

impl NodeState {
    /// Build the node state for `node`, resolving its `node_state_class` tag
    /// through the factory table. Nodes without a tag have no state.
    pub fn from_config(node: &Arc<Node>) -> RuntimeResult<Option<NodeState>> {
        let Some(class) = node.node_state_class.as_deref() else {
            return Ok(None);
        };

        let variant = match class {
            "thermometer" => NodeVariant::Thermometer(ThermometerState::new(
                node.param_f64("window").unwrap_or(DEFAULT_THERM_WINDOW),
            )),
            "relay" => NodeVariant::Relay(RelayState { cmd_state: false }),
            "master" => NodeVariant::Master,
            other => return Err(RuntimeError::UnknownNodeStateClass(other.to_string())),
        };

        let rx_keys = node
            .messages
            .iter()
            .filter(|m| m.def.direction == Direction::Rx)
            .map(|m| m.key.clone());

        let mut rx_state = HashMap::new();
        let mut handlers = HashMap::new();
        for key in rx_keys {
            rx_state.insert(key.clone(), None);
            handlers.insert(key, Vec::new());
        }

        Ok(Some(NodeState {
            node: node.clone(),
            rx_state,
            handlers,
            variant,
        }))
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn variant(&self) -> &NodeVariant {
        &self.variant
    }

    /// Latest rx payload for `msg_key`, if one arrived this session.
    pub fn rx_state(&self, msg_key: &str) -> Option<&Payload> {
        self.rx_state.get(msg_key).and_then(|p| p.as_ref())
    }

    /// Deliver one rx payload: store it, feed the variant, invoke handlers.
    ///
    /// Handlers run synchronously in the dispatch task, so they observe the
    /// monotonic payload sequence. A message key this node does not declare
    /// is a programmer error.
    pub fn update_rx(&mut self, msg_key: &str, payload: Payload) -> RuntimeResult<()> {
        if !self.rx_state.contains_key(msg_key) {
            return Err(self.invalid(msg_key));
        }

        self.rx_state.insert(msg_key.to_string(), Some(payload.clone()));

        if let NodeVariant::Thermometer(therm) = &mut self.variant
            && msg_key == "therm_state"
        {
            therm.ingest(&payload, unix_time());
        }

        if let Some(handlers) = self.handlers.get(msg_key) {
            for handler in handlers {
                handler(&payload);
            }
        }
        Ok(())
    }

    /// Register a callback for every future rx payload of `msg_key`.
    pub fn register_handler(&mut self, msg_key: &str, handler: Handler) -> RuntimeResult<()> {
        match self.handlers.get_mut(msg_key) {
            Some(handlers) => {
                handlers.push(handler);
                Ok(())
            }
            None => Err(self.invalid(msg_key)),
        }
    }

    /// The periodic producers this node declares: one `(message key,
    /// frequency)` pair per tx message with a configured frequency. The
    /// supervisor spawns one `tx_producer` per pair.
    pub fn producer_specs(&self) -> Vec<(String, f64)> {
        self.node
            .messages
            .iter()
            .filter(|m| m.def.direction == Direction::Tx)
            .filter_map(|m| m.frequency.map(|f| (m.key.clone(), f)))
            .collect()
    }

    /// Payload for one periodic tx message.
    pub fn tx_payload(&self, msg_key: &str) -> RuntimeResult<Payload> {
        match (&self.variant, msg_key) {
            (NodeVariant::Relay(relay), "relay_cmd") => Ok(Payload::from([(
                "on".to_string(),
                Value::Flag(relay.cmd_state),
            )])),
            _ => Err(self.invalid(msg_key)),
        }
    }

    pub fn as_thermometer(&self) -> Option<&ThermometerState> {
        match &self.variant {
            NodeVariant::Thermometer(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_relay(&self) -> Option<&RelayState> {
        match &self.variant {
            NodeVariant::Relay(r) => Some(r),
            _ => None,
        }
    }

    /// Set the commanded relay state. The periodic producer broadcasts it on
    /// the next tick.
    pub fn set_relay_cmd(&mut self, on: bool) -> RuntimeResult<()> {
        match &mut self.variant {
            NodeVariant::Relay(relay) => {
                relay.cmd_state = on;
                Ok(())
            }
            _ => Err(RuntimeError::NodeKind {
                node: self.node.key.clone(),
                expected: "relay",
            }),
        }
    }

    fn invalid(&self, msg_key: &str) -> RuntimeError {
        RuntimeError::InvalidMessage {
            node: self.node.key.clone(),
            message: msg_key.to_string(),
        }
    }
}

/// Periodic producer for one tx message with a declared frequency: every
/// `1/frequency` seconds the node's current payload is appended to the send
/// queue. Owned by the supervisor's task group.
pub async fn tx_producer(
    state: SharedNodeState,
    node_key: String,
    msg_key: String,
    frequency: f64,
    queue: QueueSender,
) -> anyhow::Result<()> {
    let period = Duration::from_secs_f64(1.0 / frequency);
    loop {
        let payload = state.read().await.tx_payload(&msg_key)?;
        queue.send(QueueItem {
            node_key: node_key.clone(),
            msg_key: msg_key.clone(),
            payload,
        })?;
        tokio::time::sleep(period).await;
    }
}
