//! Scripted mock bus driver for tests.
//!
//! Supports plugging and unplugging the fake adapter, injecting inbound
//! frames, and recording everything sent. All transport tests use this
//! instead of real CAN hardware so the suite runs anywhere.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use wb_protocol::Frame;

use crate::driver::{BusDriver, BusHandle};
use crate::error::{CanError, CanResult};

/// Mock driver handle, cloneable so tests keep control after the port takes
/// its copy. Starts unplugged.
#[derive(Clone, Default)]
pub struct MockBusDriver {
    state: Arc<MockBusState>,
}

#[derive(Default)]
struct MockBusState {
    plugged: AtomicBool,
    /// Inbound frames returned by `recv` (FIFO order).
    rx: Mutex<VecDeque<Frame>>,
    /// All frames passed to `send` (for test assertions).
    sent: Mutex<Vec<Frame>>,
}

impl MockBusDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the adapter appear. The next `open` attempt succeeds.
    pub fn plug(&self) {
        self.state.plugged.store(true, Ordering::SeqCst);
    }

    /// Make the adapter disappear. Open handles report `DeviceLost`.
    pub fn unplug(&self) {
        self.state.plugged.store(false, Ordering::SeqCst);
    }

    /// Queue an inbound frame.
    pub fn inject(&self, frame: Frame) {
        self.state.rx.lock().unwrap().push_back(frame);
    }

    /// Copies of all frames sent so far.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.state.sent.lock().unwrap().clone()
    }

    /// The last sent frame, if any.
    pub fn last_sent(&self) -> Option<Frame> {
        self.state.sent.lock().unwrap().last().copied()
    }
}

#[async_trait]
impl BusDriver for MockBusDriver {
    async fn open(&self) -> CanResult<Box<dyn BusHandle>> {
        if !self.state.plugged.load(Ordering::SeqCst) {
            return Err(CanError::NoDevice);
        }
        Ok(Box::new(MockBusHandle {
            state: self.state.clone(),
        }))
    }
}

struct MockBusHandle {
    state: Arc<MockBusState>,
}

impl MockBusHandle {
    fn pop(&self) -> Option<Frame> {
        self.state.rx.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl BusHandle for MockBusHandle {
    async fn recv(&mut self, timeout: Duration) -> CanResult<Option<Frame>> {
        if !self.state.plugged.load(Ordering::SeqCst) {
            return Err(CanError::DeviceLost);
        }
        if let Some(frame) = self.pop() {
            return Ok(Some(frame));
        }
        tokio::time::sleep(timeout).await;
        if !self.state.plugged.load(Ordering::SeqCst) {
            return Err(CanError::DeviceLost);
        }
        Ok(self.pop())
    }

    async fn send(&mut self, frame: &Frame) -> CanResult<()> {
        if !self.state.plugged.load(Ordering::SeqCst) {
            return Err(CanError::DeviceLost);
        }
        self.state.sent.lock().unwrap().push(*frame);
        Ok(())
    }
}
