//! Serial frame encoder/decoder.
//!
//! # Frame format
//!
//! ```text
//! 0xFE <count> <device_id> <message_type> [<data>...] <checksum>
//! ```
//!
//! - `count`: number of bytes in `device_id`, `message_type` and `data`
//! - `checksum`: sum of `count` through the last data byte, modulo 256
//!
//! Everything after the start byte is escaped so that the start byte never
//! appears inside a frame: `0xFE` becomes `0xFD 0x00` and `0xFD` becomes
//! `0xFD 0x01`.

use bytes::{BufMut, BytesMut};

/// Start-of-frame byte
pub const START: u8 = 0xFE;

/// Escape byte
pub const ESCAPE: u8 = 0xFD;

/// Command from the primary command set
pub const MSG_TYPE_PRIMARY_COMMAND: u8 = 0x10;

/// Command addressed to the main zone only
pub const MSG_TYPE_MAIN_ZONE_COMMAND: u8 = 0x14;

/// Absolute volume for a zone, `data = [zone, level]`
pub const MSG_TYPE_VOLUME_DIRECT: u8 = 0x30;

/// Front panel display and icon snapshot
pub const MSG_TYPE_FEEDBACK: u8 = 0x20;

/// 12V trigger outputs
pub const MSG_TYPE_TRIGGER: u8 = 0x21;

/// Partial update of the 10-line smart display
pub const MSG_TYPE_SMART_DISPLAY: u8 = 0x22;

/// A single frame with escaping and checksum removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub device_id: u8,
    pub message_type: u8,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(device_id: u8, message_type: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            device_id,
            message_type,
            data: data.into(),
        }
    }

    /// Encode this frame into wire bytes
    pub fn encode(&self) -> Vec<u8> {
        encode_frame(self.device_id, self.message_type, &self.data)
    }
}

/// Encode a frame into raw bytes ready for transmission.
///
/// `data` must be shorter than 254 bytes so that the count fits in one byte;
/// every message this crate sends is a handful of bytes.
pub fn encode_frame(device_id: u8, message_type: u8, data: &[u8]) -> Vec<u8> {
    debug_assert!(data.len() <= usize::from(u8::MAX) - 2);

    let mut body = BytesMut::with_capacity(data.len() + 4);
    body.put_u8((data.len() + 2) as u8);
    body.put_u8(device_id);
    body.put_u8(message_type);
    body.put_slice(data);
    body.put_u8(checksum(&body));

    let mut out = BytesMut::with_capacity(body.len() * 2 + 1);
    out.put_u8(START);
    for &b in body.iter() {
        match b {
            START => out.put_slice(&[ESCAPE, 0x00]),
            ESCAPE => out.put_slice(&[ESCAPE, 0x01]),
            _ => out.put_u8(b),
        }
    }
    out.to_vec()
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Result of attempting to decode a frame from a byte buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete frame and the number of bytes it used
    Frame(Frame, usize),

    /// Not enough bytes yet
    Incomplete,

    /// Bytes before the next start byte that can be dropped
    Noise(usize),

    /// A broken frame; `consumed` bytes should be dropped before retrying
    Invalid { consumed: usize, reason: String },
}

/// Attempt to decode one frame from the front of `buf`.
///
/// Bytes ahead of the first start byte are reported as [`DecodeResult::Noise`]
/// so the caller can drop them. A frame that is cut short by another start
/// byte, uses an unknown escape, or fails its checksum is
/// [`DecodeResult::Invalid`].
pub fn decode_frame(buf: &[u8]) -> DecodeResult {
    match buf.iter().position(|&b| b == START) {
        None if buf.is_empty() => return DecodeResult::Incomplete,
        None => return DecodeResult::Noise(buf.len()),
        Some(0) => {}
        Some(pos) => return DecodeResult::Noise(pos),
    }

    let mut body: Vec<u8> = Vec::new();
    let mut expected_len: Option<usize> = None;
    let mut i = 1;

    while i < buf.len() {
        let value = match buf[i] {
            START => {
                return DecodeResult::Invalid {
                    consumed: i,
                    reason: format!("frame truncated after {} bytes", i),
                };
            }
            ESCAPE => {
                let Some(&next) = buf.get(i + 1) else {
                    return DecodeResult::Incomplete;
                };
                i += 2;
                match next {
                    0x00 => START,
                    0x01 => ESCAPE,
                    other => {
                        return DecodeResult::Invalid {
                            consumed: i,
                            reason: format!("invalid escape sequence FD {:02X}", other),
                        };
                    }
                }
            }
            b => {
                i += 1;
                b
            }
        };
        body.push(value);

        if expected_len.is_none() {
            if value < 2 {
                return DecodeResult::Invalid {
                    consumed: i,
                    reason: format!("frame count {} is too small", value),
                };
            }
            // count byte + counted bytes + checksum
            expected_len = Some(usize::from(value) + 2);
        }

        if Some(body.len()) == expected_len {
            let (content, sum) = body.split_at(body.len() - 1);
            let computed = checksum(content);
            if computed != sum[0] {
                return DecodeResult::Invalid {
                    consumed: i,
                    reason: format!(
                        "checksum mismatch: expected {:02X}, got {:02X}",
                        computed, sum[0]
                    ),
                };
            }
            let frame = Frame {
                device_id: content[1],
                message_type: content[2],
                data: content[3..].to_vec(),
            };
            return DecodeResult::Frame(frame, i);
        }
    }

    DecodeResult::Incomplete
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_simple_command() {
        // count 3, device A3, type 10, key 4B, checksum 0x03+0xA3+0x10+0x4B = 0x101
        let bytes = encode_frame(0xA3, MSG_TYPE_PRIMARY_COMMAND, &[0x4B]);
        assert_eq!(bytes, vec![0xFE, 0x03, 0xA3, 0x10, 0x4B, 0x01]);
    }

    #[test]
    fn encode_escapes_reserved_bytes() {
        let bytes = encode_frame(0xA3, MSG_TYPE_PRIMARY_COMMAND, &[0xFE, 0xFD]);
        assert_eq!(bytes[0], START);
        assert_eq!(&bytes[4..8], &[ESCAPE, 0x00, ESCAPE, 0x01]);
        assert_eq!(bytes.iter().filter(|&&b| b == START).count(), 1);
    }

    #[test]
    fn decode_round_trips_escaped_frame() {
        let frame = Frame::new(0xA3, MSG_TYPE_FEEDBACK, vec![0xFE, 0x00, 0xFD, 0x41]);
        let bytes = frame.encode();
        assert_eq!(decode_frame(&bytes), DecodeResult::Frame(frame, bytes.len()));
    }

    #[test]
    fn decode_reports_leading_noise() {
        let mut buf = vec![0x00, 0x42];
        buf.extend(encode_frame(0xA3, MSG_TYPE_TRIGGER, &[0x01]));
        assert_eq!(decode_frame(&buf), DecodeResult::Noise(2));
        assert_eq!(decode_frame(&[0x11, 0x22]), DecodeResult::Noise(2));
    }

    #[test]
    fn decode_incomplete_until_checksum_arrives() {
        let bytes = encode_frame(0xA3, MSG_TYPE_TRIGGER, &[0x05]);
        for end in 0..bytes.len() {
            assert_eq!(decode_frame(&bytes[..end]), DecodeResult::Incomplete);
        }
        assert!(matches!(decode_frame(&bytes), DecodeResult::Frame(_, _)));
    }

    #[test]
    fn decode_incomplete_on_trailing_escape() {
        assert_eq!(decode_frame(&[START, 0x04, ESCAPE]), DecodeResult::Incomplete);
    }

    #[test]
    fn decode_rejects_checksum_mismatch() {
        let mut bytes = encode_frame(0xA3, MSG_TYPE_TRIGGER, &[0x05]);
        let last = bytes.len() - 1;
        bytes[last] = bytes[last].wrapping_add(1);
        match decode_frame(&bytes) {
            DecodeResult::Invalid { consumed, reason } => {
                assert_eq!(consumed, bytes.len());
                assert!(reason.contains("checksum"));
            }
            other => panic!("expected invalid frame, got {:?}", other),
        }
    }

    #[test]
    fn decode_rejects_frame_cut_by_start_byte() {
        let mut buf = vec![START, 0x05, 0xA3];
        buf.extend(encode_frame(0xA3, MSG_TYPE_TRIGGER, &[0x05]));
        assert!(matches!(
            decode_frame(&buf),
            DecodeResult::Invalid { consumed: 3, .. }
        ));
    }

    #[test]
    fn decode_rejects_bad_escape_and_small_count() {
        assert!(matches!(
            decode_frame(&[START, 0x03, ESCAPE, 0x07]),
            DecodeResult::Invalid { consumed: 4, .. }
        ));
        assert!(matches!(
            decode_frame(&[START, 0x01, 0xA3]),
            DecodeResult::Invalid { consumed: 2, .. }
        ));
    }

    #[test]
    fn decode_leaves_following_frame_in_place() {
        let first = encode_frame(0xA3, MSG_TYPE_TRIGGER, &[0x01]);
        let second = encode_frame(0xA3, MSG_TYPE_TRIGGER, &[0x02]);
        let mut buf = first.clone();
        buf.extend(&second);
        match decode_frame(&buf) {
            DecodeResult::Frame(frame, consumed) => {
                assert_eq!(frame.data, vec![0x01]);
                assert_eq!(consumed, first.len());
                assert!(matches!(
                    decode_frame(&buf[consumed..]),
                    DecodeResult::Frame(Frame { ref data, .. }, _) if data == &vec![0x02]
                ));
            }
            other => panic!("expected frame, got {:?}", other),
        }
    }
}
