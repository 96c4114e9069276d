//! Typed configuration for WortBot.
//!
//! One YAML document describes the CAN port, message types, node types,
//! concrete nodes, and assemblies. `Config` is the raw parse; `Catalog` is
//! the resolved view (references checked, message codecs built, messages
//! bound to their nodes) that the rest of the system consumes.

pub mod catalog;
pub mod error;
pub mod model;

pub use catalog::{BoundMessage, Catalog, Node, ResolvedAssembly};
pub use error::{ConfigError, ConfigResult};
pub use model::{
    AssemblyConfig, AssemblyParam, BusConfig, Config, ControllerConfig, DataCollectConfig,
    NodeConfig, PortConfig,
};
