//! The runtime supervisor.
//!
//! Owns all per-session state (node states, assemblies, mock nodes, the
//! simulator, both queues, and the background task group) and rebuilds it
//! from scratch whenever the CAN device appears or disappears. Port
//! lifecycle events are consumed by a single main task, so startups and
//! shutdowns never interleave.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, mpsc};

use wb_canbus::{CanPort, MessageRegistry, PortEvent, connect_loop};
use wb_config::Catalog;

use crate::assembly::{Assembly, KettleAssembly};
use crate::error::{RuntimeError, RuntimeResult};
use crate::mock::{self, MockNode, SharedMockNode, SimState};
use crate::node_state::{self, NodeState, SharedNodeState};
use crate::queue::{QueueItem, QueueReceiver};
use crate::util::TaskGroup;

/// Handle to the orchestration runtime. Cheap to clone; the HTTP adapter
/// holds one.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<Inner>,
}

struct Inner {
    catalog: Arc<Catalog>,
    registry: Arc<MessageRegistry>,
    port: Arc<Mutex<CanPort>>,
    session: RwLock<Option<Session>>,
    runtime_tasks: Mutex<TaskGroup>,
    events: Mutex<Option<mpsc::UnboundedReceiver<PortEvent>>>,
}

/// Everything that lives exactly as long as one bus connection.
struct Session {
    node_states: HashMap<String, SharedNodeState>,
    assemblies: HashMap<String, Assembly>,
    mock_nodes: HashMap<String, SharedMockNode>,
    #[allow(dead_code)]
    sim: Arc<RwLock<SimState>>,
    tasks: TaskGroup,
}

/// Counters over the active session, for tests and health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub node_states: usize,
    pub assemblies: usize,
    pub mock_nodes: usize,
    pub tasks: usize,
}

impl Runtime {
    /// Build the runtime with the port implied by the catalog's config.
    pub fn new(catalog: Catalog) -> RuntimeResult<Self> {
        let catalog = Arc::new(catalog);
        let port = CanPort::from_config(catalog.port.clone())?;
        Ok(Self::with_port(catalog, port))
    }

    /// Build the runtime around an explicit port (tests inject a scripted
    /// mock driver this way).
    pub fn with_port(catalog: Arc<Catalog>, mut port: CanPort) -> Self {
        let events = port.subscribe();
        let registry = Arc::new(MessageRegistry::new(catalog.clone()));
        Self {
            inner: Arc::new(Inner {
                catalog,
                registry,
                port: Arc::new(Mutex::new(port)),
                session: RwLock::new(None),
                runtime_tasks: Mutex::new(TaskGroup::new()),
                events: Mutex::new(Some(events)),
            }),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.inner.catalog
    }

    pub fn registry(&self) -> &Arc<MessageRegistry> {
        &self.inner.registry
    }

    /// Start the main event loop and the device connect poller. Idempotent.
    pub async fn run(&self) {
        let Some(events) = self.inner.events.lock().await.take() else {
            return;
        };

        let mut tasks = self.inner.runtime_tasks.lock().await;
        let inner = self.inner.clone();
        tasks.spawn("main", main_loop(inner, events));

        let port = self.inner.port.clone();
        let interval = Duration::from_secs_f64(self.inner.catalog.port.device_connect_interval);
        tasks.spawn("connect_can", connect_loop(port, interval));
    }

    /// Stop the runtime: cancel the main tasks, tear down any active
    /// session, close the port.
    pub async fn stop(&self) -> RuntimeResult<()> {
        self.inner.runtime_tasks.lock().await.cancel_all().await?;
        shutdown(&self.inner).await?;
        self.inner.port.lock().await.shutdown();
        Ok(())
    }

    pub async fn session_active(&self) -> bool {
        self.inner.session.read().await.is_some()
    }

    pub async fn session_stats(&self) -> Option<SessionStats> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| SessionStats {
                node_states: s.node_states.len(),
                assemblies: s.assemblies.len(),
                mock_nodes: s.mock_nodes.len(),
                tasks: s.tasks.len(),
            })
    }

    pub async fn node_state(&self, key: &str) -> Option<SharedNodeState> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .and_then(|s| s.node_states.get(key).cloned())
    }

    pub async fn assembly(&self, key: &str) -> Option<Assembly> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .and_then(|s| s.assemblies.get(key).cloned())
    }

    /// The kettle assembly under `key`, when a session is active.
    pub async fn kettle(&self, key: &str) -> Option<KettleAssembly> {
        self.assembly(key)
            .await
            .and_then(|a| a.as_kettle().cloned())
    }
}

/// Consume port lifecycle events, one at a time.
async fn main_loop(
    inner: Arc<Inner>,
    mut events: mpsc::UnboundedReceiver<PortEvent>,
) -> anyhow::Result<()> {
    while let Some(event) = events.recv().await {
        match event {
            PortEvent::Connected => startup(&inner).await?,
            PortEvent::Shutdown => shutdown(&inner).await?,
        }
    }
    Ok(())
}

/// Build the whole session: node states, simulator, mock nodes, assemblies,
/// and every background task.
async fn startup(inner: &Arc<Inner>) -> RuntimeResult<()> {
    let mut session_slot = inner.session.write().await;
    if let Some(mut stale) = session_slot.take() {
        tracing::warn!("startup with an active session, tearing the old one down");
        stale.tasks.cancel_all().await?;
    }

    tracing::info!("starting CAN session");

    let mut node_states: HashMap<String, SharedNodeState> = HashMap::new();
    for node in &inner.catalog.nodes {
        if let Some(state) = NodeState::from_config(node)? {
            node_states.insert(node.key.clone(), Arc::new(RwLock::new(state)));
        }
    }

    let (send_tx, send_rx) = mpsc::unbounded_channel();
    let (mock_tx, mock_rx) = mpsc::unbounded_channel();

    let sim = Arc::new(RwLock::new(SimState::new()));
    let mut mock_nodes: HashMap<String, SharedMockNode> = HashMap::new();
    for node in &inner.catalog.nodes {
        if let Some(mock) = MockNode::from_config(node, sim.clone())? {
            mock_nodes.insert(node.key.clone(), Arc::new(Mutex::new(mock)));
        }
    }

    let mut assemblies: HashMap<String, Assembly> = HashMap::new();
    for conf in &inner.catalog.assemblies {
        let assembly = Assembly::from_config(conf, &node_states).await?;
        assemblies.insert(assembly.key().to_string(), assembly);
    }

    let process_interval = Duration::from_secs_f64(inner.catalog.port.process_interval);
    let mut tasks = TaskGroup::new();

    for (key, mock_node) in &mock_nodes {
        tasks.spawn(
            format!("mock_sources.{key}"),
            mock::mock_source(mock_node.clone(), mock_tx.clone()),
        );
    }

    tasks.spawn(
        "simulate_mock_state",
        mock::simulation_task(sim.clone(), heat_plate_state(inner, &node_states)),
    );

    for (node_key, state) in &node_states {
        let specs = state.read().await.producer_specs();
        for (i, (msg_key, frequency)) in specs.into_iter().enumerate() {
            tasks.spawn(
                format!("queue_tasks.{node_key}[{i}]"),
                node_state::tx_producer(
                    state.clone(),
                    node_key.clone(),
                    msg_key,
                    frequency,
                    send_tx.clone(),
                ),
            );
        }
    }

    tasks.spawn(
        "handle_node_messages",
        dispatch_task(
            inner.port.clone(),
            inner.registry.clone(),
            node_states.clone(),
            mock_rx,
            process_interval,
        ),
    );

    tasks.spawn(
        "process_send_queue",
        send_task(
            inner.port.clone(),
            inner.registry.clone(),
            inner.catalog.clone(),
            mock_nodes.clone(),
            send_rx,
            process_interval,
        ),
    );

    for (key, assembly) in &assemblies {
        match assembly {
            Assembly::Kettle(kettle) => {
                tasks.spawn(format!("assemblies.{key}[0]"), kettle.clone().collect_task());
                tasks.spawn(format!("assemblies.{key}[1]"), kettle.clone().control_task());
            }
        }
    }

    *session_slot = Some(Session {
        node_states,
        assemblies,
        mock_nodes,
        sim,
        tasks,
    });
    Ok(())
}

/// Tear the session down: cancel every task, await completion, clear state.
async fn shutdown(inner: &Arc<Inner>) -> RuntimeResult<()> {
    let session = inner.session.write().await.take();
    if let Some(mut session) = session {
        tracing::info!("shutting down CAN session");
        session.tasks.cancel_all().await?;
    }
    Ok(())
}

/// The heat-plate node state of the first kettle, which the simulator
/// couples to. Absent when no kettle is configured.
fn heat_plate_state(
    inner: &Inner,
    node_states: &HashMap<String, SharedNodeState>,
) -> Option<SharedNodeState> {
    inner
        .catalog
        .assemblies
        .iter()
        .find(|a| a.assembly_class == "kettle")
        .and_then(|a| a.role_one("heat_plate").ok())
        .and_then(|key| node_states.get(key).cloned())
}

/// Dispatch task: round-robin between physical inbound frames and the mock
/// queue, delivering each decoded message to its node state.
async fn dispatch_task(
    port: Arc<Mutex<CanPort>>,
    registry: Arc<MessageRegistry>,
    node_states: HashMap<String, SharedNodeState>,
    mut mock_rx: QueueReceiver,
    interval: Duration,
) -> anyhow::Result<()> {
    loop {
        let frame = { port.lock().await.recv().await };
        match frame.and_then(|f| registry.decode(&f)) {
            Some(decoded) => {
                deliver(
                    &node_states,
                    &decoded.node.key,
                    &decoded.msg_key,
                    decoded.payload,
                )
                .await?;
            }
            None => {
                if let Ok(item) = mock_rx.try_recv() {
                    deliver(&node_states, &item.node_key, &item.msg_key, item.payload).await?;
                }
            }
        }
        tokio::time::sleep(interval).await;
    }
}

async fn deliver(
    node_states: &HashMap<String, SharedNodeState>,
    node_key: &str,
    msg_key: &str,
    payload: wb_protocol::Payload,
) -> RuntimeResult<()> {
    if let Some(state) = node_states.get(node_key) {
        state.write().await.update_rx(msg_key, payload)?;
    }
    Ok(())
}

/// Send task: drain the send queue, routing each item either to its mock
/// node's `handle_message` or through the registry onto the wire.
async fn send_task(
    port: Arc<Mutex<CanPort>>,
    registry: Arc<MessageRegistry>,
    catalog: Arc<Catalog>,
    mock_nodes: HashMap<String, SharedMockNode>,
    mut send_rx: QueueReceiver,
    interval: Duration,
) -> anyhow::Result<()> {
    loop {
        if let Ok(item) = send_rx.try_recv() {
            route_send(&port, &registry, &catalog, &mock_nodes, item).await?;
        }
        tokio::time::sleep(interval).await;
    }
}

async fn route_send(
    port: &Arc<Mutex<CanPort>>,
    registry: &Arc<MessageRegistry>,
    catalog: &Arc<Catalog>,
    mock_nodes: &HashMap<String, SharedMockNode>,
    item: QueueItem,
) -> RuntimeResult<()> {
    let node = catalog
        .node(&item.node_key)
        .ok_or_else(|| RuntimeError::UnknownNode(item.node_key.clone()))?;

    if node.mock {
        let mock = mock_nodes
            .get(&item.node_key)
            .ok_or_else(|| RuntimeError::MissingMockClass(item.node_key.clone()))?;
        mock.lock()
            .await
            .handle_message(&item.msg_key, item.payload)?;
    } else {
        let frame = registry.encode(&item.node_key, &item.msg_key, &item.payload)?;
        port.lock().await.send(&frame).await;
    }
    Ok(())
}
