//! Raw configuration structs, deserialized straight from the YAML document.
//!
//! Keys follow the stable wire schema; `py_type` is the logical value kind
//! tag and `*_class` fields are tags resolved through factory tables at
//! runtime.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use wb_protocol::{Direction, SignalKind};

use crate::error::ConfigResult;

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: PortConfig,
    pub message_types: Vec<MessageTypeConfig>,
    pub node_types: Vec<NodeTypeConfig>,
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub assembly_types: Vec<AssemblyTypeConfig>,
    #[serde(default)]
    pub assemblies: Vec<AssemblyConfig>,
}

impl Config {
    /// Load one YAML document from `path`.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}

/// CAN port and scheduling settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PortConfig {
    /// Sleep between dispatch/send iterations, seconds.
    #[serde(default = "default_process_interval")]
    pub process_interval: f64,
    /// Period of reconnect attempts while disconnected, seconds.
    #[serde(default = "default_device_connect_interval")]
    pub device_connect_interval: f64,
    /// Physical bus settings. Absent when only mocks are configured.
    #[serde(default)]
    pub bus: Option<BusConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Interface channel, e.g. "can0".
    pub channel: String,
    /// Bus driver name, e.g. "socketcan".
    pub interface: String,
    /// Blocking receive timeout, seconds.
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout: f64,
}

fn default_process_interval() -> f64 {
    0.01
}

fn default_device_connect_interval() -> f64 {
    1.0
}

fn default_receive_timeout() -> f64 {
    0.1
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageTypeConfig {
    pub key: String,
    pub dbc_name: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
    pub pgn: u32,
    pub direction: Direction,
    pub signals: Vec<SignalConfig>,
}

fn default_priority() -> u8 {
    6
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    pub key: String,
    pub dbc_name: String,
    pub start_bit: u8,
    pub signal_size: u8,
    #[serde(default)]
    pub signed: bool,
    #[serde(default = "default_scale")]
    pub value_scale: f64,
    #[serde(default)]
    pub value_offset: f64,
    #[serde(default)]
    pub value_min: Option<f64>,
    #[serde(default)]
    pub value_max: Option<f64>,
    #[serde(default)]
    pub unit: String,
    /// Firmware-side type name. Informational only.
    #[serde(default)]
    pub c_type: String,
    /// Logical value kind.
    pub py_type: SignalKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeTypeConfig {
    pub key: String,
    pub messages: Vec<NodeTypeMessageConfig>,
    #[serde(default)]
    pub mock_class: Option<String>,
    #[serde(default)]
    pub node_state_class: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeTypeMessageConfig {
    /// Local message key used by node states and assemblies.
    pub key: String,
    /// Referenced message type.
    pub msg_type_ref: String,
    /// Periodic tx frequency in Hz, for tx messages only.
    #[serde(default)]
    pub frequency: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub key: String,
    pub node_type_ref: String,
    pub node_addr: u16,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub debug: DebugConfig,
    /// Node-level overrides of the node-type tags.
    #[serde(default)]
    pub mock_class: Option<String>,
    #[serde(default)]
    pub node_state_class: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebugConfig {
    #[serde(default)]
    pub mock: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssemblyTypeConfig {
    pub key: String,
    pub assembly_class: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssemblyConfig {
    pub key: String,
    pub assembly_type_ref: String,
    /// Role name → node key or list of node keys.
    pub nodes: BTreeMap<String, NodeRole>,
    #[serde(default)]
    pub params: Vec<AssemblyParam>,
}

/// A role filled by one node or an ordered list of nodes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NodeRole {
    One(String),
    Many(Vec<String>),
}

impl NodeRole {
    pub fn keys(&self) -> Vec<String> {
        match self {
            NodeRole::One(key) => vec![key.clone()],
            NodeRole::Many(keys) => keys.clone(),
        }
    }
}

/// A free-form assembly parameter, optionally tagged with the config struct
/// it deserializes into.
#[derive(Debug, Clone, Deserialize)]
pub struct AssemblyParam {
    pub name: String,
    #[serde(default)]
    pub config_class: Option<String>,
    pub value: serde_json::Value,
}

/// Closed-loop heat-plate controller settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    pub p_gain: f64,
    pub d_gain: f64,
    /// Control signal that maps to a 100% duty cycle.
    pub max_cs: f64,
    pub low_jump_thres: f64,
    pub high_jump_thres: f64,
    /// PWM frequency in Hz; one PWM interval is `1 / pwm_interval` seconds.
    pub pwm_interval: f64,
}

/// Assembly-level temperature data collection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DataCollectConfig {
    /// Sliding window of the combined temperature frame, seconds.
    pub window: f64,
    /// Collection frequency in Hz.
    pub collect_interval: f64,
}
