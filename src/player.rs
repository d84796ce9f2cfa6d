use crate::config::RotelConfig;
use crate::connection::ConnectionFactory;
use crate::error::{Result, RotelError};
use crate::session::Session;
use crate::source_map::SourceMap;
use crate::state::{level_to_device_volume, DeviceState, PowerState};
use crate::subscription::StateReceiver;
use crate::transport::Connector;
use serde_json::json;
use std::sync::Arc;

/// Zone addressed by absolute volume changes
const MAIN_ZONE: u8 = 1;

/// What to send for a mute request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteAction {
    Toggle,
    Unchanged,
}

/// Decide how to reach the requested mute state with a toggle-only command.
///
/// With the current state unknown a toggle is the best guess.
pub fn mute_action(current: Option<bool>, requested: bool) -> MuteAction {
    match current {
        Some(muted) if muted == requested => MuteAction::Unchanged,
        _ => MuteAction::Toggle,
    }
}

/// Media player controls for a Rotel processor
///
/// Wraps a [`Session`] with the user's source names and the higher level
/// operations a media player exposes.
pub struct RotelMediaPlayer {
    name: String,
    session: Session,
    source_map: SourceMap,
}

impl RotelMediaPlayer {
    pub fn new(name: impl Into<String>, session: Session, source_map: SourceMap) -> Self {
        Self {
            name: name.into(),
            session,
            source_map,
        }
    }

    /// Build a player from a validated configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rotel_rsp1570::{RotelConfig, RotelMediaPlayer, SerialConnector};
    /// use std::sync::Arc;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = RotelConfig::from_json(r#"{"device": "/dev/ttyUSB0", "unique_id": "rotel"}"#)?;
    ///     let player = RotelMediaPlayer::from_config(&config, Arc::new(SerialConnector))?;
    ///     player.start().await?;
    ///     player.turn_on().await?;
    ///     player.set_volume_level(0.3).await?;
    ///     player.shutdown().await;
    ///     Ok(())
    /// }
    /// ```
    pub fn from_config(config: &RotelConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        let source_map = config.source_map()?;
        let factory = ConnectionFactory::new(config.device.clone(), config.meta(), connector);
        let session = Session::new(config.unique_id.clone(), factory);
        Ok(Self::new(config.name.clone(), session, source_map))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_id(&self) -> &str {
        self.session.unique_id()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn start(&self) -> Result<()> {
        self.session.start().await
    }

    pub async fn shutdown(&self) {
        tracing::info!(unique_id = %self.unique_id(), "Cleaning up");
        self.session.shutdown().await;
    }

    pub async fn reconnect(&self) -> Result<()> {
        self.session.reconnect().await
    }

    pub async fn turn_on(&self) -> Result<()> {
        self.session.send_command("POWER_ON").await?;
        self.session.assume_power(PowerState::On);
        Ok(())
    }

    pub async fn turn_off(&self) -> Result<()> {
        self.session.send_command("POWER_OFF").await?;
        self.session.assume_power(PowerState::Off);
        Ok(())
    }

    /// Select a source by its user-facing name
    pub async fn select_source(&self, source: &str) -> Result<()> {
        let command = self
            .source_map
            .command_for(source)
            .ok_or_else(|| RotelError::UnknownSource(source.to_string()))?;
        self.session.send_command(command).await
    }

    pub async fn volume_up(&self) -> Result<()> {
        self.session.send_command("VOLUME_UP").await
    }

    pub async fn volume_down(&self) -> Result<()> {
        self.session.send_command("VOLUME_DOWN").await
    }

    /// Set the main zone volume, `level` in `0.0..=1.0`
    pub async fn set_volume_level(&self, level: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&level) {
            return Err(RotelError::InvalidParameter(format!(
                "volume level {} is outside 0..=1",
                level
            )));
        }
        let device_volume = level_to_device_volume(level, self.session.meta().max_volume);
        tracing::debug!(unique_id = %self.unique_id(), device_volume, "Set volume");
        self.session.send_volume_direct(MAIN_ZONE, device_volume).await
    }

    /// Mute (true) or unmute (false).
    ///
    /// Uses the toggle that acts on whatever zone the display shows rather
    /// than the main zone on/off commands.
    pub async fn mute_volume(&self, mute: bool) -> Result<()> {
        let current = self.session.state().is_volume_muted;
        match mute_action(current, mute) {
            MuteAction::Toggle => self.session.send_command("MUTE_TOGGLE").await,
            MuteAction::Unchanged => {
                tracing::debug!(unique_id = %self.unique_id(), mute, "Mute already in requested state");
                Ok(())
            }
        }
    }

    /// Send any command by name
    pub async fn send_command(&self, name: &str) -> Result<()> {
        self.session.send_command(name).await
    }

    /// Selectable source names, sorted
    pub fn source_list(&self) -> Vec<String> {
        self.source_map.source_list()
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    pub fn state(&self) -> DeviceState {
        self.session.state()
    }

    pub fn subscribe(&self) -> StateReceiver {
        self.session.subscribe()
    }

    /// Device specific attributes beyond the standard media player ones
    pub fn attributes(&self) -> serde_json::Value {
        let state = self.session.state();
        json!({
            "display_volume": state.device_volume,
            "party_mode_on": state.party_mode_on,
            "info": state.info,
            "icons": state.icons,
            "speaker_icons": state.speaker_icons,
            "state_icons": state.state_icons,
            "input_icons": state.input_icons,
            "sound_mode_icons": state.sound_mode_icons,
            "misc_icons": state.misc_icons,
            "triggers": state.triggers,
            "smart_display": state.smart_display,
        })
    }
}
