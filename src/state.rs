use crate::display::SmartDisplayBuffer;
use crate::error::{Result, RotelError};
use crate::messages::{FeedbackMessage, SmartDisplayMessage, TriggerMessage};
use crate::model::RotelModelMeta;
use serde::Serialize;
use std::collections::BTreeMap;

pub const SPEAKER_ICON_NAMES: [&str; 9] = ["CBL", "CBR", "SB", "SL", "SR", "SW", "FL", "C", "FR"];

pub const STATE_ICON_NAMES: [&str; 7] = [
    "Standby LED",
    "Zone",
    "Zone 2",
    "Zone 3",
    "Zone 4",
    "Display Mode0",
    "Display Mode1",
];

pub const SOUND_MODE_ICON_NAMES: [&str; 9] = [
    "Pro Logic",
    "II",
    "x",
    "Dolby Digital",
    "dts",
    "ES",
    "EX",
    "5.1",
    "7.1",
];

pub const INPUT_ICON_NAMES: [&str; 9] = ["HDMI", "Coaxial", "Optical", "A", "1", "2", "3", "4", "5"];

// Arrows next to the display; meaning unknown
pub const MISC_ICON_NAMES: [&str; 2] = ["<", ">"];

/// Icon name to lit/unlit; the key set never changes after construction
pub type IconStates = BTreeMap<String, bool>;

/// Power state as seen on the front panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    #[default]
    Off,
}

/// Everything the session knows about the processor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceState {
    pub power: PowerState,
    pub source: Option<String>,

    /// Raw volume as shown on the display
    pub device_volume: Option<u8>,

    /// `device_volume / max_volume`
    pub volume_level: Option<f64>,

    pub is_volume_muted: Option<bool>,
    pub party_mode_on: Option<bool>,
    pub info: Option<String>,

    /// All lit icons, in flag order
    pub icons: Option<Vec<String>>,

    pub speaker_icons: IconStates,
    pub state_icons: IconStates,
    pub sound_mode_icons: IconStates,
    pub input_icons: IconStates,
    pub misc_icons: IconStates,

    pub triggers: Option<Vec<String>>,
    pub smart_display: Option<SmartDisplayBuffer>,
}

fn init_icon_states(names: &[&str]) -> IconStates {
    names.iter().map(|name| (name.to_string(), false)).collect()
}

fn icon_states(message: &FeedbackMessage, names: &[&str]) -> IconStates {
    names
        .iter()
        .map(|name| (name.to_string(), message.icon(name).unwrap_or(false)))
        .collect()
}

impl DeviceState {
    pub fn new() -> Self {
        Self {
            power: PowerState::Off,
            source: None,
            device_volume: None,
            volume_level: None,
            is_volume_muted: None,
            party_mode_on: None,
            info: None,
            icons: None,
            speaker_icons: init_icon_states(&SPEAKER_ICON_NAMES),
            state_icons: init_icon_states(&STATE_ICON_NAMES),
            sound_mode_icons: init_icon_states(&SOUND_MODE_ICON_NAMES),
            input_icons: init_icon_states(&INPUT_ICON_NAMES),
            misc_icons: init_icon_states(&MISC_ICON_NAMES),
            triggers: None,
            smart_display: None,
        }
    }

    /// Fold a feedback message into the state.
    ///
    /// A volume above the model maximum is rejected before anything changes.
    pub fn apply_feedback(&mut self, message: &FeedbackMessage, meta: &RotelModelMeta) -> Result<()> {
        let fields = message.parse_display_lines();
        if let Some(volume) = fields.volume {
            if volume > meta.max_volume {
                return Err(RotelError::ProtocolDecode(format!(
                    "volume {} exceeds maximum {}",
                    volume, meta.max_volume
                )));
            }
        }

        self.power = if fields.is_on {
            PowerState::On
        } else {
            PowerState::Off
        };
        self.source = fields.source_name;
        self.device_volume = fields.volume;
        self.volume_level = device_volume_to_level(fields.volume, meta.max_volume);
        self.is_volume_muted = fields.mute_on;
        self.party_mode_on = fields.party_mode_on;
        self.info = fields.info;
        self.icons = Some(message.icons_that_are_on());
        self.speaker_icons = icon_states(message, &SPEAKER_ICON_NAMES);
        self.state_icons = icon_states(message, &STATE_ICON_NAMES);
        self.sound_mode_icons = icon_states(message, &SOUND_MODE_ICON_NAMES);
        self.input_icons = icon_states(message, &INPUT_ICON_NAMES);
        self.misc_icons = icon_states(message, &MISC_ICON_NAMES);
        Ok(())
    }

    pub fn apply_trigger(&mut self, message: &TriggerMessage) {
        self.triggers = Some(message.flags_to_list());
    }

    /// Merge smart display lines; an overflowing message leaves the buffer as it was
    pub fn apply_smart_display(&mut self, message: &SmartDisplayMessage) -> Result<()> {
        let mut buffer = self.smart_display.clone().unwrap_or_default();
        buffer.merge(message)?;
        self.smart_display = Some(buffer);
        Ok(())
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a raw device volume into a 0..=1 level; unknown stays unknown
pub fn device_volume_to_level(device_volume: Option<u8>, max_volume: u8) -> Option<f64> {
    device_volume.map(|v| f64::from(v) / f64::from(max_volume))
}

/// Convert a 0..=1 level into the nearest raw device volume
pub fn level_to_device_volume(level: f64, max_volume: u8) -> u8 {
    (level * f64::from(max_volume))
        .round()
        .clamp(0.0, f64::from(max_volume)) as u8
}
