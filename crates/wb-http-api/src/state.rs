//! Shared application state for the Axum server.

use wb_runtime::Runtime;

/// Handler state: just a handle to the orchestration runtime. Assemblies are
/// looked up per request because they only exist while a session is active.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Runtime,
}

impl AppState {
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }
}
