//! Bus driver abstraction.
//!
//! `CanPort` talks to the wire through these traits so the same lifecycle
//! code runs against SocketCAN hardware, a virtual device for mock-only
//! setups, and a scripted mock in tests.

use std::time::Duration;

use async_trait::async_trait;

use wb_protocol::Frame;

use crate::error::CanResult;

/// Opens bus handles. `open` returns `CanError::NoDevice` while the adapter
/// is unplugged; any other error is unexpected.
#[async_trait]
pub trait BusDriver: Send + Sync {
    async fn open(&self) -> CanResult<Box<dyn BusHandle>>;
}

/// An open connection to the bus.
#[async_trait]
pub trait BusHandle: Send {
    /// Receive one frame, or `None` when `timeout` elapses without traffic.
    /// Returns `CanError::DeviceLost` when the adapter disappears.
    async fn recv(&mut self, timeout: Duration) -> CanResult<Option<Frame>>;

    /// Send one frame. Returns `CanError::DeviceLost` when the adapter
    /// disappears.
    async fn send(&mut self, frame: &Frame) -> CanResult<()>;
}

/// Driver used when the config has no `bus` section: a virtual device that
/// is always present and never carries traffic, so mock-only setups still
/// reach the `Connected` state and run a full session.
pub struct VirtualBusDriver;

#[async_trait]
impl BusDriver for VirtualBusDriver {
    async fn open(&self) -> CanResult<Box<dyn BusHandle>> {
        Ok(Box::new(VirtualBusHandle))
    }
}

struct VirtualBusHandle;

#[async_trait]
impl BusHandle for VirtualBusHandle {
    async fn recv(&mut self, _timeout: Duration) -> CanResult<Option<Frame>> {
        // No traffic, ever. Return immediately so the dispatch loop paces on
        // its own process interval and the mock queue drains at full rate.
        tokio::task::yield_now().await;
        Ok(None)
    }

    async fn send(&mut self, _frame: &Frame) -> CanResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn virtual_bus_is_silent() {
        let driver = VirtualBusDriver;
        let mut handle = driver.open().await.unwrap();

        let frame = Frame::new(0x18FF1010, [0u8; 8]);
        handle.send(&frame).await.unwrap();
        let received = handle.recv(Duration::from_millis(100)).await.unwrap();
        assert!(received.is_none());
    }
}
