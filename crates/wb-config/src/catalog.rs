//! Resolved configuration: references checked, codecs built, messages bound
//! to their nodes.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use wb_protocol::{Direction, MessageDef, SignalDef, dbc};

use crate::error::{ConfigError, ConfigResult};
use crate::model::{AssemblyParam, Config, NodeConfig, NodeTypeConfig, PortConfig};

/// A message type bound to a concrete node.
#[derive(Debug, Clone)]
pub struct BoundMessage {
    /// Local message key, as used by node states and assemblies.
    pub key: String,
    pub def: Arc<MessageDef>,
    /// Periodic tx frequency in Hz.
    pub frequency: Option<f64>,
    /// Declared source address for rx messages: the owning node's address.
    pub src_addr: Option<u8>,
}

/// A concrete device instance with its bound messages.
#[derive(Debug, Clone)]
pub struct Node {
    pub key: String,
    pub node_type: String,
    pub node_addr: u8,
    pub params: serde_json::Value,
    pub mock: bool,
    pub mock_class: Option<String>,
    pub node_state_class: Option<String>,
    pub messages: Vec<BoundMessage>,
}

impl Node {
    pub fn message(&self, key: &str) -> Option<&BoundMessage> {
        self.messages.iter().find(|m| m.key == key)
    }

    /// Numeric node parameter, if present.
    pub fn param_f64(&self, name: &str) -> Option<f64> {
        self.params.get(name).and_then(|v| v.as_f64())
    }
}

/// An assembly with normalized roles and typed parameter access.
#[derive(Debug, Clone)]
pub struct ResolvedAssembly {
    pub key: String,
    pub assembly_class: String,
    /// Role name → ordered node keys.
    pub nodes: HashMap<String, Vec<String>>,
    pub params: Vec<AssemblyParam>,
}

impl ResolvedAssembly {
    /// The single node key filling `role`.
    pub fn role_one(&self, role: &str) -> ConfigResult<&str> {
        let keys = self.role_many(role)?;
        match keys {
            [key] => Ok(key),
            _ => Err(ConfigError::RoleCardinality {
                assembly: self.key.clone(),
                role: role.to_string(),
            }),
        }
    }

    /// All node keys filling `role`.
    pub fn role_many(&self, role: &str) -> ConfigResult<&[String]> {
        self.nodes
            .get(role)
            .map(Vec::as_slice)
            .ok_or_else(|| ConfigError::MissingRole {
                assembly: self.key.clone(),
                role: role.to_string(),
            })
    }

    /// Required numeric parameter.
    pub fn param_f64(&self, name: &str) -> ConfigResult<f64> {
        self.param(name)?
            .value
            .as_f64()
            .ok_or_else(|| ConfigError::BadParam {
                assembly: self.key.clone(),
                name: name.to_string(),
                reason: "expected a number".into(),
            })
    }

    /// Required structured parameter tagged with `config_class`.
    pub fn param_config<T: DeserializeOwned>(&self, name: &str, class: &str) -> ConfigResult<T> {
        let param = self.param(name)?;
        if param.config_class.as_deref() != Some(class) {
            return Err(ConfigError::BadParam {
                assembly: self.key.clone(),
                name: name.to_string(),
                reason: format!("expected config_class '{class}'"),
            });
        }
        serde_json::from_value(param.value.clone()).map_err(|e| ConfigError::BadParam {
            assembly: self.key.clone(),
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    fn param(&self, name: &str) -> ConfigResult<&AssemblyParam> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ConfigError::MissingParam {
                assembly: self.key.clone(),
                name: name.to_string(),
            })
    }
}

/// The resolved configuration consumed by the registry and the runtime.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub port: PortConfig,
    pub message_types: Vec<Arc<MessageDef>>,
    pub nodes: Vec<Arc<Node>>,
    pub assemblies: Vec<ResolvedAssembly>,
    nodes_by_key: HashMap<String, Arc<Node>>,
}

impl Catalog {
    /// Load and resolve the YAML document at `path`.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::build(Config::load(path)?)
    }

    /// Resolve a parsed configuration, checking every invariant.
    pub fn build(config: Config) -> ConfigResult<Self> {
        let message_types = build_message_types(&config)?;
        let node_types: HashMap<&str, &NodeTypeConfig> = unique_index(
            config.node_types.iter().map(|t| (t.key.as_str(), t)),
            "node_type",
        )?;

        let mut nodes = Vec::with_capacity(config.nodes.len());
        let mut nodes_by_key = HashMap::new();
        for node_conf in &config.nodes {
            let node = Arc::new(build_node(node_conf, &node_types, &message_types)?);
            if nodes_by_key
                .insert(node.key.clone(), node.clone())
                .is_some()
            {
                return Err(ConfigError::Duplicate {
                    kind: "node",
                    key: node.key.clone(),
                });
            }
            nodes.push(node);
        }

        let assemblies = build_assemblies(&config, &nodes_by_key)?;

        let mut message_types: Vec<Arc<MessageDef>> = message_types.into_values().collect();
        message_types.sort_by_key(|m| (matches!(m.direction, Direction::Tx), m.pgn));

        Ok(Self {
            port: config.port,
            message_types,
            nodes,
            assemblies,
            nodes_by_key,
        })
    }

    pub fn node(&self, key: &str) -> Option<&Arc<Node>> {
        self.nodes_by_key.get(key)
    }

    pub fn assembly(&self, key: &str) -> Option<&ResolvedAssembly> {
        self.assemblies.iter().find(|a| a.key == key)
    }

    /// Render the built-in DBC database for the configured message types.
    pub fn generate_dbc(&self) -> String {
        let defs: Vec<MessageDef> = self.message_types.iter().map(|m| (**m).clone()).collect();
        dbc::generate_dbc(&defs)
    }
}

fn build_message_types(config: &Config) -> ConfigResult<HashMap<String, Arc<MessageDef>>> {
    let mut seen_pgns: HashSet<(Direction, u32)> = HashSet::new();
    let mut out = HashMap::new();

    for msg_conf in &config.message_types {
        let def = MessageDef {
            key: msg_conf.key.clone(),
            dbc_name: msg_conf.dbc_name.clone(),
            pgn: msg_conf.pgn,
            priority: msg_conf.priority,
            direction: msg_conf.direction,
            signals: msg_conf
                .signals
                .iter()
                .map(|s| SignalDef {
                    key: s.key.clone(),
                    dbc_name: s.dbc_name.clone(),
                    start_bit: s.start_bit,
                    size: s.signal_size,
                    signed: s.signed,
                    scale: s.value_scale,
                    offset: s.value_offset,
                    min: s.value_min,
                    max: s.value_max,
                    unit: s.unit.clone(),
                    kind: s.py_type,
                })
                .collect(),
        };
        def.validate()?;

        if !seen_pgns.insert((def.direction, def.pgn)) {
            return Err(ConfigError::DuplicatePgn {
                pgn: def.pgn,
                direction: match def.direction {
                    Direction::Rx => "rx",
                    Direction::Tx => "tx",
                },
            });
        }
        if out.insert(def.key.clone(), Arc::new(def)).is_some() {
            return Err(ConfigError::Duplicate {
                kind: "message_type",
                key: msg_conf.key.clone(),
            });
        }
    }

    Ok(out)
}

fn build_node(
    node_conf: &NodeConfig,
    node_types: &HashMap<&str, &NodeTypeConfig>,
    message_types: &HashMap<String, Arc<MessageDef>>,
) -> ConfigResult<Node> {
    let node_type = node_types
        .get(node_conf.node_type_ref.as_str())
        .ok_or_else(|| ConfigError::UnresolvedRef {
            kind: "node_type",
            reference: node_conf.node_type_ref.clone(),
            context: format!("node '{}'", node_conf.key),
        })?;

    if node_conf.node_addr > 254 {
        return Err(ConfigError::NodeAddr {
            node: node_conf.key.clone(),
            addr: node_conf.node_addr,
        });
    }
    let node_addr = node_conf.node_addr as u8;

    let mut messages = Vec::with_capacity(node_type.messages.len());
    for msg_ref in &node_type.messages {
        let def = message_types
            .get(&msg_ref.msg_type_ref)
            .cloned()
            .ok_or_else(|| ConfigError::UnresolvedRef {
                kind: "message_type",
                reference: msg_ref.msg_type_ref.clone(),
                context: format!("node_type '{}'", node_type.key),
            })?;
        let src_addr = match def.direction {
            Direction::Rx => Some(node_addr),
            Direction::Tx => None,
        };
        messages.push(BoundMessage {
            key: msg_ref.key.clone(),
            def,
            frequency: msg_ref.frequency,
            src_addr,
        });
    }

    Ok(Node {
        key: node_conf.key.clone(),
        node_type: node_type.key.clone(),
        node_addr,
        params: node_conf.params.clone(),
        mock: node_conf.debug.mock,
        mock_class: node_conf
            .mock_class
            .clone()
            .or_else(|| node_type.mock_class.clone()),
        node_state_class: node_conf
            .node_state_class
            .clone()
            .or_else(|| node_type.node_state_class.clone()),
        messages,
    })
}

fn build_assemblies(
    config: &Config,
    nodes_by_key: &HashMap<String, Arc<Node>>,
) -> ConfigResult<Vec<ResolvedAssembly>> {
    let assembly_types = unique_index(
        config
            .assembly_types
            .iter()
            .map(|t| (t.key.as_str(), t.assembly_class.as_str())),
        "assembly_type",
    )?;

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(config.assemblies.len());
    for assembly_conf in &config.assemblies {
        if !seen.insert(assembly_conf.key.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "assembly",
                key: assembly_conf.key.clone(),
            });
        }
        let assembly_class = assembly_types
            .get(assembly_conf.assembly_type_ref.as_str())
            .ok_or_else(|| ConfigError::UnresolvedRef {
                kind: "assembly_type",
                reference: assembly_conf.assembly_type_ref.clone(),
                context: format!("assembly '{}'", assembly_conf.key),
            })?;

        let mut nodes = HashMap::new();
        for (role, role_nodes) in &assembly_conf.nodes {
            let keys = role_nodes.keys();
            for key in &keys {
                if !nodes_by_key.contains_key(key) {
                    return Err(ConfigError::UnresolvedRef {
                        kind: "node",
                        reference: key.clone(),
                        context: format!("assembly '{}' role '{role}'", assembly_conf.key),
                    });
                }
            }
            nodes.insert(role.clone(), keys);
        }

        out.push(ResolvedAssembly {
            key: assembly_conf.key.clone(),
            assembly_class: assembly_class.to_string(),
            nodes,
            params: assembly_conf.params.clone(),
        });
    }

    Ok(out)
}

fn unique_index<'a, V>(
    entries: impl Iterator<Item = (&'a str, V)>,
    kind: &'static str,
) -> ConfigResult<HashMap<&'a str, V>> {
    let mut out = HashMap::new();
    for (key, value) in entries {
        if out.insert(key, value).is_some() {
            return Err(ConfigError::Duplicate {
                kind,
                key: key.to_string(),
            });
        }
    }
    Ok(out)
}
