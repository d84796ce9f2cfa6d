//! Messages pushed by the processor.
//!
//! Every frame received from the device is turned into one [`Message`]. The
//! set of variants is closed; frame types that the active model does not
//! define end up in [`Message::Other`].

use crate::error::{Result, RotelError};
use crate::model::RotelModelMeta;
use crate::protocol::{Frame, MSG_TYPE_FEEDBACK, MSG_TYPE_SMART_DISPLAY, MSG_TYPE_TRIGGER};

/// Characters per front panel display line
pub const DISPLAY_LINE_WIDTH: usize = 21;

/// Number of icon flag bytes in a feedback message
pub const ICON_FLAG_BYTES: usize = 5;

const FEEDBACK_LEN: usize = 2 * DISPLAY_LINE_WIDTH + ICON_FLAG_BYTES;

/// Icon name, flag byte index and bit mask
static ICON_BITS: &[(&str, usize, u8)] = &[
    ("A", 0, 0x01),
    ("5", 0, 0x02),
    ("4", 0, 0x04),
    ("3", 0, 0x08),
    ("2", 0, 0x10),
    ("1", 0, 0x20),
    ("Coaxial", 0, 0x40),
    ("Optical", 0, 0x80),
    ("x", 1, 0x01),
    ("II", 1, 0x02),
    ("HDMI", 1, 0x04),
    ("EX", 1, 0x08),
    ("ES", 1, 0x10),
    ("dts", 1, 0x20),
    ("Pro Logic", 1, 0x40),
    ("Dolby Digital", 1, 0x80),
    ("Display Mode1", 2, 0x01),
    ("Display Mode0", 2, 0x02),
    ("Standby LED", 2, 0x04),
    ("SW", 2, 0x08),
    ("Zone 4", 2, 0x10),
    ("Zone 3", 2, 0x20),
    ("Zone 2", 2, 0x40),
    ("Zone", 2, 0x80),
    ("FR", 3, 0x01),
    ("C", 3, 0x02),
    ("FL", 3, 0x04),
    ("7.1", 3, 0x08),
    ("5.1", 3, 0x10),
    ("SB", 3, 0x20),
    ("SR", 3, 0x40),
    ("SL", 3, 0x80),
    (">", 4, 0x01),
    ("<", 4, 0x02),
    ("CBR", 4, 0x04),
    ("CBL", 4, 0x08),
];

/// Names of the 12V trigger outputs, lowest bit first
pub const TRIGGER_NAMES: [&str; 6] = ["1", "2", "3", "4", "5", "6"];

/// Characters per smart display line
pub const SMART_DISPLAY_LINE_WIDTH: usize = 21;

/// A decoded device message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Feedback(FeedbackMessage),
    Trigger(TriggerMessage),
    SmartDisplay(SmartDisplayMessage),
    Other(UnknownMessage),
}

impl Message {
    /// Decode a frame received from a device of the given model
    pub fn decode(frame: &Frame, meta: &RotelModelMeta) -> Result<Self> {
        if frame.device_id != meta.device_id {
            return Err(RotelError::ProtocolDecode(format!(
                "frame for device {:02X}, expected {:02X}",
                frame.device_id, meta.device_id
            )));
        }

        match frame.message_type {
            MSG_TYPE_FEEDBACK => FeedbackMessage::from_data(&frame.data).map(Message::Feedback),
            MSG_TYPE_TRIGGER => TriggerMessage::from_data(&frame.data).map(Message::Trigger),
            MSG_TYPE_SMART_DISPLAY if meta.supports_smart_display => {
                SmartDisplayMessage::from_data(&frame.data).map(Message::SmartDisplay)
            }
            message_type => Ok(Message::Other(UnknownMessage {
                message_type,
                data: frame.data.clone(),
            })),
        }
    }
}

/// Fields recovered from the front panel display text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayFields {
    pub is_on: bool,
    pub source_name: Option<String>,
    pub volume: Option<u8>,
    pub mute_on: Option<bool>,
    pub party_mode_on: Option<bool>,
    pub info: Option<String>,
}

/// Front panel snapshot: two display lines and the icon flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackMessage {
    pub lines: [String; 2],
    pub flags: [u8; ICON_FLAG_BYTES],
}

impl FeedbackMessage {
    pub fn new(line1: impl Into<String>, line2: impl Into<String>, flags: [u8; ICON_FLAG_BYTES]) -> Self {
        Self {
            lines: [line1.into(), line2.into()],
            flags,
        }
    }

    fn from_data(data: &[u8]) -> Result<Self> {
        if data.len() != FEEDBACK_LEN {
            return Err(RotelError::ProtocolDecode(format!(
                "feedback message has {} bytes, expected {}",
                data.len(),
                FEEDBACK_LEN
            )));
        }
        let (text, icon_bytes) = data.split_at(2 * DISPLAY_LINE_WIDTH);
        let (line1, line2) = text.split_at(DISPLAY_LINE_WIDTH);
        let mut flags = [0u8; ICON_FLAG_BYTES];
        flags.copy_from_slice(icon_bytes);
        Ok(Self::new(
            display_text(line1).trim_end(),
            display_text(line2).trim_end(),
            flags,
        ))
    }

    /// Payload bytes for this message, lines padded to the display width
    pub fn to_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(FEEDBACK_LEN);
        for line in &self.lines {
            data.extend(padded_line(line, DISPLAY_LINE_WIDTH));
        }
        data.extend_from_slice(&self.flags);
        data
    }

    /// Work out as much of the amplifier state as the display shows.
    ///
    /// Line 1 holds the source (columns 0-7), `pty` when party mode is on
    /// (columns 9-11) and either `VOL nn` or `MUTE ON` (columns 13-20).
    /// Line 2 is free text. A blank display means the unit is in standby.
    pub fn parse_display_lines(&self) -> DisplayFields {
        let line1: Vec<char> = self.lines[0].chars().collect();
        let line2 = self.lines[1].trim();

        if line1.iter().all(|c| c.is_whitespace()) && line2.is_empty() {
            return DisplayFields::default();
        }

        let column = |start: usize, end: usize| -> String {
            line1
                .iter()
                .skip(start)
                .take(end - start)
                .collect::<String>()
                .trim()
                .to_string()
        };

        let source = column(0, 8);
        let party = column(9, 12);
        let volume_field = column(13, 21);

        let (volume, mute_on) = if volume_field == "MUTE ON" {
            (None, Some(true))
        } else if let Some(rest) = volume_field.strip_prefix("VOL") {
            (rest.trim().parse::<u8>().ok(), Some(false))
        } else {
            (None, None)
        };

        DisplayFields {
            is_on: true,
            source_name: (!source.is_empty()).then_some(source),
            volume,
            mute_on,
            party_mode_on: Some(party == "pty"),
            info: (!line2.is_empty()).then(|| line2.to_string()),
        }
    }

    /// State of a named icon, `None` for names this message does not carry
    pub fn icon(&self, name: &str) -> Option<bool> {
        ICON_BITS
            .iter()
            .find(|(icon, _, _)| *icon == name)
            .map(|&(_, byte, mask)| self.flags[byte] & mask != 0)
    }

    /// Names of all lit icons in flag order
    pub fn icons_that_are_on(&self) -> Vec<String> {
        ICON_BITS
            .iter()
            .filter(|&&(_, byte, mask)| self.flags[byte] & mask != 0)
            .map(|(name, _, _)| name.to_string())
            .collect()
    }
}

/// Trigger output states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerMessage {
    pub flags: u8,
}

impl TriggerMessage {
    fn from_data(data: &[u8]) -> Result<Self> {
        match data {
            [flags] => Ok(Self { flags: *flags }),
            _ => Err(RotelError::ProtocolDecode(format!(
                "trigger message has {} bytes, expected 1",
                data.len()
            ))),
        }
    }

    /// Names of the triggers that are switched on
    pub fn flags_to_list(&self) -> Vec<String> {
        TRIGGER_NAMES
            .iter()
            .enumerate()
            .filter(|(bit, _)| self.flags & (1 << bit) != 0)
            .map(|(_, name)| name.to_string())
            .collect()
    }
}

/// A run of smart display lines starting at a 1-based line number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartDisplayMessage {
    pub lines: Vec<String>,
    pub start: usize,
}

impl SmartDisplayMessage {
    pub fn new(lines: Vec<String>, start: usize) -> Self {
        Self { lines, start }
    }

    fn from_data(data: &[u8]) -> Result<Self> {
        let Some((&start, text)) = data.split_first() else {
            return Err(RotelError::ProtocolDecode(
                "empty smart display message".to_string(),
            ));
        };
        if start == 0 {
            return Err(RotelError::ProtocolDecode(
                "smart display start line must be 1-based".to_string(),
            ));
        }
        if text.is_empty() || text.len() % SMART_DISPLAY_LINE_WIDTH != 0 {
            return Err(RotelError::ProtocolDecode(format!(
                "smart display text of {} bytes is not a whole number of lines",
                text.len()
            )));
        }
        let lines = text
            .chunks(SMART_DISPLAY_LINE_WIDTH)
            .map(|chunk| display_text(chunk).trim_end().to_string())
            .collect();
        Ok(Self::new(lines, usize::from(start)))
    }
}

/// A message type the session does not interpret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMessage {
    pub message_type: u8,
    pub data: Vec<u8>,
}

/// Display bytes are ASCII; anything else shows up as a blank
fn display_text(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { ' ' })
        .collect()
}

fn padded_line(line: &str, width: usize) -> impl Iterator<Item = u8> + '_ {
    line.bytes().chain(std::iter::repeat(b' ')).take(width)
}
