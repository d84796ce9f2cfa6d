use crate::error::{Result, RotelError};
use crate::messages::SmartDisplayMessage;
use serde::Serialize;

/// Lines on the RSP-1572 smart display
pub const SMART_DISPLAY_LINES: usize = 10;

/// Merge a smart display message into the previous lines.
///
/// Without previous lines the merge starts from a blank display. Lines the
/// message does not touch keep their previous text. A message that reaches
/// past the end of `prev` fails rather than truncating, since it means the
/// framing and the display have drifted apart.
pub fn make_smart_display_lines(
    prev: Option<&[String]>,
    message: &SmartDisplayMessage,
) -> Result<Vec<String>> {
    let mut lines = match prev {
        Some(prev) => prev.to_vec(),
        None => vec![String::new(); SMART_DISPLAY_LINES],
    };

    if message.start == 0 {
        return Err(RotelError::ProtocolDecode(
            "smart display start line must be 1-based".to_string(),
        ));
    }

    for (lineno, line) in (message.start..).zip(&message.lines) {
        let slot = lines.get_mut(lineno - 1).ok_or_else(|| {
            RotelError::ProtocolDecode(format!(
                "smart display line {} is outside a {}-line display",
                lineno,
                lines_len(prev)
            ))
        })?;
        *slot = line.clone();
    }

    Ok(lines)
}

fn lines_len(prev: Option<&[String]>) -> usize {
    prev.map_or(SMART_DISPLAY_LINES, <[String]>::len)
}

/// The ten smart display lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SmartDisplayBuffer {
    lines: Vec<String>,
}

impl SmartDisplayBuffer {
    /// A blank display
    pub fn new() -> Self {
        Self {
            lines: vec![String::new(); SMART_DISPLAY_LINES],
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Apply a partial update on top of the current lines
    pub fn merge(&mut self, message: &SmartDisplayMessage) -> Result<()> {
        self.lines = make_smart_display_lines(Some(self.lines.as_slice()), message)?;
        Ok(())
    }
}

impl Default for SmartDisplayBuffer {
    fn default() -> Self {
        Self::new()
    }
}
