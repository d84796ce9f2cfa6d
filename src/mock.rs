//! In-memory connector for tests.
//!
//! Every successful `connect` creates a duplex pipe, keeps one end for the
//! connection and hands the other end, the "device", to the test through a
//! channel.

use crate::error::{Result, RotelError};
use crate::model::RotelModelMeta;
use crate::protocol::{decode_frame, DecodeResult, Frame};
use crate::transport::{Connector, Link};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::sync::mpsc;

const PIPE_CAPACITY: usize = 4096;

pub(crate) struct MockConnector {
    devices: mpsc::UnboundedSender<DuplexStream>,
    fail_next: AtomicBool,
    connects: AtomicUsize,
}

impl MockConnector {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<DuplexStream>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            devices: tx,
            fail_next: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        });
        (connector, rx)
    }

    /// Make the next `connect` fail as if the port did not exist
    pub(crate) fn fail_next_connect(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of successful connects so far
    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, port: &str, _meta: &RotelModelMeta) -> Result<Link> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(RotelError::Connection {
                port: port.to_string(),
                reason: "No such file or directory".to_string(),
            });
        }
        let (ours, device) = tokio::io::duplex(PIPE_CAPACITY);
        self.connects.fetch_add(1, Ordering::SeqCst);
        // The test may not care about the device end
        let _ = self.devices.send(device);
        Ok(Link::from_stream(ours))
    }
}

/// Read one frame written by the connection to the device end
pub(crate) async fn read_frame(device: &mut DuplexStream) -> Frame {
    let mut buf = Vec::new();
    loop {
        match decode_frame(&buf) {
            DecodeResult::Frame(frame, consumed) => {
                assert_eq!(consumed, buf.len(), "more than one frame pending");
                return frame;
            }
            DecodeResult::Incomplete => {
                let byte = device.read_u8().await.expect("device end closed");
                buf.push(byte);
            }
            other => panic!("unexpected bytes from connection: {:?}", other),
        }
    }
}
