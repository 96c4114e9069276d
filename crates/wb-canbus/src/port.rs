//! CAN port: owns the bus handle and its connection lifecycle.
//!
//! The port is either `Disconnected` or `Connected`. Dynamic plug/unplug of
//! the adapter is normal operation: connect attempts while unplugged stay
//! silent, device loss mid-session notifies subscribers so the supervisor can
//! tear the session down, and the connect loop keeps polling for the device
//! to come back.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};

use wb_config::PortConfig;
use wb_protocol::Frame;

use crate::driver::{BusDriver, BusHandle, VirtualBusDriver};
use crate::error::{CanError, CanResult};

/// Connection lifecycle event delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortEvent {
    Connected,
    Shutdown,
}

pub struct CanPort {
    conf: PortConfig,
    driver: Box<dyn BusDriver>,
    handle: Option<Box<dyn BusHandle>>,
    subscribers: Vec<mpsc::UnboundedSender<PortEvent>>,
}

impl CanPort {
    pub fn new(conf: PortConfig, driver: Box<dyn BusDriver>) -> Self {
        Self {
            conf,
            driver,
            handle: None,
            subscribers: Vec::new(),
        }
    }

    /// Build the port with the driver implied by the config: SocketCAN when a
    /// bus section is present, otherwise a virtual always-present device so
    /// mock-only setups still run full sessions.
    pub fn from_config(conf: PortConfig) -> CanResult<Self> {
        let driver: Box<dyn BusDriver> = match &conf.bus {
            None => Box::new(VirtualBusDriver),
            Some(bus) => match bus.interface.as_str() {
                #[cfg(target_os = "linux")]
                "socketcan" => Box::new(crate::socketcan::SocketCanDriver::new(&bus.channel)),
                other => {
                    return Err(CanError::Interface(format!(
                        "unsupported bus interface '{other}'"
                    )));
                }
            },
        };
        Ok(Self::new(conf, driver))
    }

    /// Register a lifecycle event subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PortEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Attempt to open the device. Succeeding notifies `Connected`; an
    /// unplugged adapter is silent. Already-connected is a no-op.
    pub async fn connect_device(&mut self) -> CanResult<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        match self.driver.open().await {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("connection established to CAN device");
                self.notify(PortEvent::Connected);
                Ok(())
            }
            Err(CanError::NoDevice) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Receive one frame, or `None` on timeout or while disconnected.
    /// Device loss transitions to `Disconnected` and notifies `Shutdown`.
    pub async fn recv(&mut self) -> Option<Frame> {
        let timeout = self.receive_timeout();
        let handle = self.handle.as_mut()?;

        match handle.recv(timeout).await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "connection to CAN device lost, shutting down");
                self.shutdown();
                None
            }
        }
    }

    /// Send one frame, fire-and-forget. Dropped while disconnected; device
    /// loss transitions to `Disconnected` and notifies `Shutdown`.
    pub async fn send(&mut self, frame: &Frame) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };

        if let Err(e) = handle.send(frame).await {
            tracing::warn!(error = %e, "connection to CAN device lost, shutting down");
            self.shutdown();
        }
    }

    /// Drop the bus handle and notify `Shutdown`.
    pub fn shutdown(&mut self) {
        self.handle = None;
        self.notify(PortEvent::Shutdown);
    }

    fn notify(&self, event: PortEvent) {
        for subscriber in &self.subscribers {
            // A dropped receiver just means nobody is listening anymore.
            let _ = subscriber.send(event);
        }
    }

    fn receive_timeout(&self) -> Duration {
        let secs = self
            .conf
            .bus
            .as_ref()
            .map(|b| b.receive_timeout)
            .unwrap_or(0.1);
        Duration::from_secs_f64(secs)
    }
}

/// Periodically attempt to open the device while disconnected.
pub async fn connect_loop(port: Arc<Mutex<CanPort>>, interval: Duration) -> anyhow::Result<()> {
    loop {
        port.lock().await.connect_device().await?;
        tokio::time::sleep(interval).await;
    }
}
