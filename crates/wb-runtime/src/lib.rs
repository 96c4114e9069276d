//! The CAN orchestration runtime of WortBot.
//!
//! Per-node state machines, windowed time series and the PD/PWM control
//! math, mock devices with a thermodynamic simulator, the kettle assembly,
//! and the supervisor that owns every per-session task and rebuilds the whole
//! session when the bus appears or disappears.

pub mod assembly;
pub mod control;
pub mod error;
pub mod mock;
pub mod node_state;
pub mod queue;
pub mod series;
pub mod supervisor;
pub mod util;

// Re-export key types for convenience
pub use assembly::{Assembly, KettleAssembly};
pub use error::{RuntimeError, RuntimeResult};
pub use mock::{MockNode, SharedMockNode, SimState};
pub use node_state::{NodeState, NodeVariant, SharedNodeState, ThermReading};
pub use queue::QueueItem;
pub use series::WindowedSeries;
pub use supervisor::Runtime;
