use crate::commands::{encode_command, encode_volume_direct};
use crate::error::{Result, RotelError};
use crate::messages::Message;
use crate::model::RotelModelMeta;
use crate::protocol::{decode_frame, DecodeResult};
use crate::transport::{Connector, LinkReader, LinkWriter};
use bytes::{Buf, BytesMut};
use futures_util::Stream;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

const READ_CHUNK: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Idle,
    Open,
    Closed,
}

struct ConnectionState {
    link: LinkState,
    writer: Option<LinkWriter>,
    /// Handed out once by `read_messages`
    reader: Option<LinkReader>,
}

/// One open/close cycle of the serial link.
///
/// A connection is opened at most once; after `close` it cannot be reused
/// and a fresh one has to be built.
pub struct Connection {
    port: String,
    meta: &'static RotelModelMeta,
    connector: Arc<dyn Connector>,
    state: Mutex<ConnectionState>,
    /// Cancelled by `close`; ends any stream handed out
    closed: CancellationToken,
}

impl Connection {
    pub fn new(port: impl Into<String>, meta: &'static RotelModelMeta, connector: Arc<dyn Connector>) -> Self {
        Self {
            port: port.into(),
            meta,
            connector,
            state: Mutex::new(ConnectionState {
                link: LinkState::Idle,
                writer: None,
                reader: None,
            }),
            closed: CancellationToken::new(),
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn meta(&self) -> &'static RotelModelMeta {
        self.meta
    }

    /// Open the link to the device
    pub async fn open(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.link {
            LinkState::Open => return Ok(()),
            LinkState::Closed => return Err(RotelError::ConnectionClosed),
            LinkState::Idle => {}
        }

        tracing::info!("Connecting to {}", self.port);
        let link = self.connector.connect(&self.port, self.meta).await?;
        state.writer = Some(link.writer);
        state.reader = Some(link.reader);
        state.link = LinkState::Open;
        Ok(())
    }

    /// Release the link.
    ///
    /// Safe to call at any time and more than once. A message stream taken
    /// earlier ends and drops its read half. The connection ends up closed
    /// even when shutting down the writer fails; that failure is returned so
    /// the caller can log it.
    pub async fn close(&self) -> Result<()> {
        self.closed.cancel();
        let mut state = self.state.lock().await;
        state.link = LinkState::Closed;
        state.reader = None;
        let Some(mut writer) = state.writer.take() else {
            return Ok(());
        };
        drop(state);

        tracing::debug!(port = %self.port, "Closing connection");
        writer.shutdown().await?;
        tracing::info!(port = %self.port, "Connection closed");
        Ok(())
    }

    /// Whether the link is open and usable for commands
    pub async fn is_open(&self) -> bool {
        self.state.lock().await.link == LinkState::Open
    }

    /// Send a named command
    pub async fn send_command(&self, name: &str) -> Result<()> {
        let bytes = encode_command(self.meta, name)?;
        tracing::debug!(port = %self.port, command = name, "Sending command");
        self.write(&bytes).await
    }

    /// Set the absolute volume of a zone
    pub async fn send_volume_direct(&self, zone: u8, level: u8) -> Result<()> {
        let bytes = encode_volume_direct(self.meta, zone, level)?;
        tracing::debug!(port = %self.port, zone, level, "Sending volume direct");
        self.write(&bytes).await
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.lock().await;
        let writer = state.writer.as_mut().ok_or(RotelError::NotConnected)?;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Take the stream of messages coming from the device.
    ///
    /// There is one stream per connection; asking again fails with
    /// [`RotelError::StreamTaken`].
    pub async fn read_messages(&self) -> Result<MessageStream> {
        let mut state = self.state.lock().await;
        if state.link != LinkState::Open {
            return Err(RotelError::NotConnected);
        }
        let reader = state.reader.take().ok_or(RotelError::StreamTaken)?;
        Ok(MessageStream {
            reader: Some(reader),
            buf: BytesMut::with_capacity(READ_CHUNK),
            meta: self.meta,
            port: self.port.clone(),
            closed: self.closed.clone(),
        })
    }
}

/// Messages decoded from the read half of a connection.
///
/// `next_message` can be dropped at any await point without losing data:
/// bytes of a partly received frame stay in the internal buffer. After the
/// first error, or once the connection is closed, the stream is spent and
/// the read half is released.
pub struct MessageStream {
    /// `None` once spent
    reader: Option<LinkReader>,
    buf: BytesMut,
    meta: &'static RotelModelMeta,
    port: String,
    closed: CancellationToken,
}

impl MessageStream {
    /// Wait for the next message; `None` once the stream is spent or the
    /// connection was closed
    pub async fn next_message(&mut self) -> Option<Result<Message>> {
        if self.reader.is_none() {
            return None;
        }
        let closed = self.closed.clone();
        let result = tokio::select! {
            biased;
            _ = closed.cancelled() => None,
            result = self.read_message() => Some(result),
        };
        if result.is_none() {
            tracing::debug!(port = %self.port, "Message stream ended by close");
        }
        if !matches!(result, Some(Ok(_))) {
            self.reader = None;
        }
        result
    }

    async fn read_message(&mut self) -> Result<Message> {
        loop {
            match decode_frame(&self.buf) {
                DecodeResult::Frame(frame, consumed) => {
                    self.buf.advance(consumed);
                    tracing::trace!(port = %self.port, message_type = frame.message_type, "Frame received");
                    return Message::decode(&frame, self.meta);
                }
                DecodeResult::Noise(skip) => {
                    tracing::trace!(port = %self.port, bytes = skip, "Skipping bytes outside a frame");
                    self.buf.advance(skip);
                }
                DecodeResult::Invalid { consumed, reason } => {
                    self.buf.advance(consumed);
                    return Err(RotelError::ProtocolDecode(reason));
                }
                DecodeResult::Incomplete => {
                    let Some(reader) = self.reader.as_mut() else {
                        return Err(RotelError::ConnectionClosed);
                    };
                    self.buf.reserve(READ_CHUNK);
                    if reader.read_buf(&mut self.buf).await? == 0 {
                        tracing::info!(port = %self.port, "Device closed the connection");
                        return Err(RotelError::ConnectionClosed);
                    }
                }
            }
        }
    }

    /// Adapt into a [`futures_util::Stream`]
    pub fn into_stream(self) -> impl Stream<Item = Result<Message>> + Send {
        futures_util::stream::unfold(self, |mut messages| async move {
            messages.next_message().await.map(|item| (item, messages))
        })
    }
}

/// Builds fresh connections to the same port
#[derive(Clone)]
pub struct ConnectionFactory {
    port: String,
    meta: &'static RotelModelMeta,
    connector: Arc<dyn Connector>,
}

impl ConnectionFactory {
    pub fn new(port: impl Into<String>, meta: &'static RotelModelMeta, connector: Arc<dyn Connector>) -> Self {
        Self {
            port: port.into(),
            meta,
            connector,
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn meta(&self) -> &'static RotelModelMeta {
        self.meta
    }

    /// A new, unopened connection
    pub fn make_conn(&self) -> Connection {
        Connection::new(self.port.clone(), self.meta, self.connector.clone())
    }
}
