//! Symbolic command table.
//!
//! Commands are addressed by name (`"POWER_ON"`, `"SOURCE_VIDEO_1"`, ...) and
//! encoded into a two-part key: the message type and the command byte.

use crate::error::{Result, RotelError};
use crate::model::RotelModelMeta;
use crate::protocol::{
    encode_frame, MSG_TYPE_MAIN_ZONE_COMMAND, MSG_TYPE_PRIMARY_COMMAND, MSG_TYPE_VOLUME_DIRECT,
};

/// Highest zone number accepted by volume direct
pub const MAX_ZONE: u8 = 4;

/// A named command and its wire key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandCode {
    pub name: &'static str,
    pub message_type: u8,
    pub key: u8,
}

const fn primary(name: &'static str, key: u8) -> CommandCode {
    CommandCode {
        name,
        message_type: MSG_TYPE_PRIMARY_COMMAND,
        key,
    }
}

const fn main_zone(name: &'static str, key: u8) -> CommandCode {
    CommandCode {
        name,
        message_type: MSG_TYPE_MAIN_ZONE_COMMAND,
        key,
    }
}

static COMMANDS: &[CommandCode] = &[
    primary("POWER_TOGGLE", 0x0A),
    primary("POWER_OFF", 0x4A),
    primary("POWER_ON", 0x4B),
    primary("VOLUME_UP", 0x0B),
    primary("VOLUME_DOWN", 0x0C),
    primary("MUTE_TOGGLE", 0x1E),
    primary("DISPLAY_REFRESH", 0xFF),
    primary("DIMMER", 0x52),
    primary("SOURCE_CD", 0x02),
    primary("SOURCE_TUNER", 0x03),
    primary("SOURCE_TAPE", 0x04),
    primary("SOURCE_VIDEO_1", 0x05),
    primary("SOURCE_VIDEO_2", 0x06),
    primary("SOURCE_VIDEO_3", 0x07),
    primary("SOURCE_VIDEO_4", 0x08),
    primary("SOURCE_VIDEO_5", 0x09),
    primary("SOURCE_USB", 0x8E),
    primary("SOURCE_MULTI_INPUT", 0x15),
    primary("RECORD_FUNCTION_SELECT", 0x17),
    primary("ZONE_2_TOGGLE", 0x23),
    primary("ZONE_3_TOGGLE", 0x24),
    primary("ZONE_4_TOGGLE", 0x25),
    primary("CENTER_TRIM", 0x4D),
    primary("SUBWOOFER_TRIM", 0x4E),
    primary("SURROUND_TRIM", 0x4F),
    primary("TONE_CONTROL_SELECT", 0x67),
    primary("DYNAMIC_RANGE", 0x16),
    main_zone("MUTE_ON", 0x6C),
    main_zone("MUTE_OFF", 0x6D),
    main_zone("PARTY_MODE_TOGGLE", 0x6E),
];

/// Look up a command by name
pub fn lookup(name: &str) -> Option<&'static CommandCode> {
    COMMANDS.iter().find(|c| c.name == name)
}

/// Names of every known command
pub fn command_names() -> impl Iterator<Item = &'static str> {
    COMMANDS.iter().map(|c| c.name)
}

/// Encode a named command for the given model
pub fn encode_command(meta: &RotelModelMeta, name: &str) -> Result<Vec<u8>> {
    let code = lookup(name).ok_or_else(|| RotelError::UnknownCommand(name.to_string()))?;
    Ok(encode_frame(meta.device_id, code.message_type, &[code.key]))
}

/// Encode an absolute volume command for a zone
pub fn encode_volume_direct(meta: &RotelModelMeta, zone: u8, level: u8) -> Result<Vec<u8>> {
    if !(1..=MAX_ZONE).contains(&zone) {
        return Err(RotelError::InvalidParameter(format!(
            "zone {} is not between 1 and {}",
            zone, MAX_ZONE
        )));
    }
    if level > meta.max_volume {
        return Err(RotelError::InvalidParameter(format!(
            "volume {} exceeds maximum {}",
            level, meta.max_volume
        )));
    }
    Ok(encode_frame(meta.device_id, MSG_TYPE_VOLUME_DIRECT, &[zone, level]))
}
