//! Physical link to the processor.
//!
//! A [`Connector`] opens the link and hands back independent read and write
//! halves. [`SerialConnector`] does this for an RS-232 port; tests plug in an
//! in-memory connector instead.

use crate::error::{Result, RotelError};
use crate::model::RotelModelMeta;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::SerialPortBuilderExt;

/// Read half of an open link
pub type LinkReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of an open link
pub type LinkWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An open link split into halves
pub struct Link {
    pub reader: LinkReader,
    pub writer: LinkWriter,
}

impl Link {
    /// Split any duplex byte stream into a link
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }
}

/// Opens links to a processor
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open the link named by `port` with the line settings of `meta`
    async fn connect(&self, port: &str, meta: &RotelModelMeta) -> Result<Link>;
}

/// Connector for RS-232 and USB serial adapters
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

#[async_trait]
impl Connector for SerialConnector {
    async fn connect(&self, port: &str, meta: &RotelModelMeta) -> Result<Link> {
        tracing::debug!(port = %port, baud_rate = meta.baud_rate, "Opening serial port");

        #[allow(unused_mut)]
        let mut stream = tokio_serial::new(port, meta.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %port, error = %e, "Failed to open serial port");
                RotelError::Connection {
                    port: port.to_string(),
                    reason: e.to_string(),
                }
            })?;

        #[cfg(unix)]
        {
            if let Err(e) = stream.set_exclusive(true) {
                tracing::warn!(port = %port, error = %e, "Could not lock serial port");
            }
        }

        tracing::info!(port = %port, baud_rate = meta.baud_rate, "Serial port opened");
        Ok(Link::from_stream(stream))
    }
}
