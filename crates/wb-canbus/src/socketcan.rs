//! SocketCAN driver (Linux only).

use std::time::Duration;

use async_trait::async_trait;
use socketcan::tokio::CanSocket;
use socketcan::{CanFrame, EmbeddedFrame, ExtendedId, Id};

use wb_protocol::Frame;

use crate::driver::{BusDriver, BusHandle};
use crate::error::{CanError, CanResult};

/// Driver for a SocketCAN channel such as "can0".
pub struct SocketCanDriver {
    channel: String,
}

impl SocketCanDriver {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl BusDriver for SocketCanDriver {
    async fn open(&self) -> CanResult<Box<dyn BusHandle>> {
        match CanSocket::open(&self.channel) {
            Ok(socket) => Ok(Box::new(SocketCanHandle { socket })),
            Err(e) if is_no_device(&e) => Err(CanError::NoDevice),
            Err(e) => Err(CanError::Interface(e.to_string())),
        }
    }
}

struct SocketCanHandle {
    socket: CanSocket,
}

#[async_trait]
impl BusHandle for SocketCanHandle {
    async fn recv(&mut self, timeout: Duration) -> CanResult<Option<Frame>> {
        match tokio::time::timeout(timeout, self.socket.read_frame()).await {
            Err(_) => Ok(None),
            Ok(Ok(CanFrame::Data(frame))) => {
                let Id::Extended(id) = frame.id() else {
                    // Standard-ID traffic is foreign to this bus.
                    return Ok(None);
                };
                let mut data = [0u8; 8];
                let len = frame.data().len().min(8);
                data[..len].copy_from_slice(&frame.data()[..len]);
                Ok(Some(Frame::new(id.as_raw(), data)))
            }
            // Remote/error frames carry no payload for us.
            Ok(Ok(_)) => Ok(None),
            Ok(Err(e)) if is_no_device(&e) => Err(CanError::DeviceLost),
            Ok(Err(e)) => Err(CanError::Interface(e.to_string())),
        }
    }

    async fn send(&mut self, frame: &Frame) -> CanResult<()> {
        let id = ExtendedId::new(frame.can_id).ok_or_else(|| {
            CanError::Interface(format!("CAN id 0x{:08X} exceeds 29 bits", frame.can_id))
        })?;
        let can_frame = CanFrame::new(id, &frame.data)
            .ok_or_else(|| CanError::Interface("cannot build CAN frame".into()))?;

        match self.socket.write_frame(can_frame).await {
            Ok(()) => Ok(()),
            Err(e) if is_no_device(&e) => Err(CanError::DeviceLost),
            Err(e) => Err(CanError::Interface(e.to_string())),
        }
    }
}

/// ENODEV: the adapter is unplugged. The default error case, not a fault.
fn is_no_device(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(19)
}
