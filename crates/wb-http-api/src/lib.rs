//! REST adapter over WortBot assemblies.
//!
//! One thin handler per operation: read the combined kettle temperature,
//! read or switch the heat-plate and steering relays, set the temperature
//! setpoint. Everything else lives in `wb-runtime`.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
