//! WortBot daemon — brewing appliance control plane.
//!
//! Wires the YAML configuration, the CAN orchestration runtime, and the REST
//! adapter into a single binary.

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use wb_config::Catalog;
use wb_http_api::{AppState, build_router};
use wb_runtime::Runtime;

const DEFAULT_CONFIG_PATH: &str = "conf/config.yaml";
const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "wortbotd starting");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let catalog = Catalog::load(&config_path)?;
    tracing::info!(
        config = %config_path,
        nodes = catalog.nodes.len(),
        assemblies = catalog.assemblies.len(),
        "config loaded"
    );

    // Dump the generated CAN database for candump/cantools users.
    if let Ok(dbc_path) = std::env::var("WORTBOT_DBC_OUT") {
        std::fs::write(&dbc_path, catalog.generate_dbc())?;
        tracing::info!(path = %dbc_path, "CAN database written");
    }

    let runtime = Runtime::new(catalog)?;
    runtime.run().await;
    tracing::info!("runtime started");

    let app = build_router(AppState::new(runtime.clone()));

    let addr =
        std::env::var("WORTBOT_HTTP_ADDR").unwrap_or_else(|_| DEFAULT_HTTP_ADDR.to_string());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    runtime.stop().await?;
    tracing::info!("wortbotd stopped");
    Ok(())
}
