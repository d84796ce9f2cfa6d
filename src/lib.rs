//! Rust library for controlling Rotel RSP-1570 and RSP-1572 surround processors
//!
//! This library talks to the processor over its RS-232 port and keeps a live
//! picture of the front panel. It supports:
//!
//! - Power, volume, mute and source control
//! - Any command of the processor's command table by name
//! - Front panel feedback (source, volume, mute, party mode, info text, icons)
//! - 12V trigger state and the RSP-1572 smart display
//! - User source aliases from a JSON configuration
//! - Reconnecting after the link goes bad
//! - Real-time state update subscriptions
//!
//! # Quick Start
//!
//! ```no_run
//! use rotel_rsp1570::{RotelConfig, RotelMediaPlayer, SerialConnector};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RotelConfig::from_json(r#"{
//!         "device": "/dev/ttyUSB0",
//!         "unique_id": "lounge_rsp1570",
//!         "source_aliases": {"VIDEO 1": "CATV", "TAPE": null}
//!     }"#)?;
//!
//!     let player = RotelMediaPlayer::from_config(&config, Arc::new(SerialConnector))?;
//!     player.start().await?;
//!
//!     player.turn_on().await?;
//!     player.select_source("CATV").await?;
//!
//!     // Subscribe to state updates
//!     let mut updates = player.subscribe();
//!     while let Ok(update) = updates.recv().await {
//!         println!("State update: {:?}", update.state());
//!         break; // Just show one update
//!     }
//!
//!     player.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Player**: Media player operations on top of a session
//! - **Session**: Read task, state reconciliation and reconnects
//! - **Connection**: One open/close cycle of the serial link
//! - **Transport**: Opening the serial port
//! - **Protocol**: Frame encoding and decoding
//! - **Messages**: Device messages and the command table

mod commands;
mod config;
mod connection;
mod display;
mod error;
mod messages;
#[cfg(test)]
mod mock;
mod model;
mod player;
mod protocol;
mod session;
mod source_map;
mod state;
mod subscription;
mod transport;

// Public exports
pub use commands::{command_names, encode_command, encode_volume_direct, lookup, CommandCode, MAX_ZONE};
pub use config::{ModelSpec, RotelConfig, DEFAULT_NAME};
pub use connection::{Connection, ConnectionFactory, MessageStream};
pub use display::{make_smart_display_lines, SmartDisplayBuffer, SMART_DISPLAY_LINES};
pub use error::{Result, RotelError};
pub use messages::{DisplayFields, FeedbackMessage, Message, SmartDisplayMessage, TriggerMessage, UnknownMessage};
pub use model::{ModelId, RotelModelMeta, SourceMeta, RSP1570, RSP1572};
pub use player::{mute_action, MuteAction, RotelMediaPlayer};
pub use protocol::{decode_frame, encode_frame, DecodeResult, Frame};
pub use session::Session;
pub use source_map::{SourceAliases, SourceEntry, SourceMap};
pub use state::{device_volume_to_level, level_to_device_volume, DeviceState, IconStates, PowerState};
pub use subscription::{StateReceiver, StateUpdate};
pub use transport::{Connector, Link, LinkReader, LinkWriter, SerialConnector};
