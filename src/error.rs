use thiserror::Error;

/// Result type for Rotel operations
pub type Result<T> = std::result::Result<T, RotelError>;

/// Errors that can occur when talking to a Rotel processor
#[derive(Error, Debug)]
pub enum RotelError {
    /// The serial port could not be opened
    #[error("Could not open {port}: {reason}")]
    Connection {
        /// Serial port path
        port: String,
        /// Why the open failed
        reason: String,
    },

    /// Command issued before `open` or after `close`
    #[error("Not connected")]
    NotConnected,

    /// The connection was closed (by us or by the device)
    #[error("Connection closed")]
    ConnectionClosed,

    /// Malformed or out-of-range message content
    #[error("Protocol decode error: {0}")]
    ProtocolDecode(String),

    /// A decoded message type that the session does not handle
    #[error("Unknown message type 0x{0:02X}")]
    UnknownMessageVariant(u8),

    /// Command name not present in the command table
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Source name not present in the source map
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// Argument outside the range the device accepts
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The message stream of this connection is already being read
    #[error("Message stream already taken")]
    StreamTaken,

    /// A state subscriber fell behind and missed updates
    #[error("Subscriber lagged by {0} updates")]
    Lagged(u64),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The background reader task panicked or could not be joined
    #[error("Task error: {0}")]
    Task(String),
}
