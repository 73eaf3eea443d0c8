//! RNet wire frame codec.
//!
//! A frame on the wire is:
//!
//! ```text
//! 0xF0 | tgtCtrl tgtZone tgtKeypad | srcCtrl srcZone srcKeypad | msgType | body... | checksum | 0xF7
//! ```
//!
//! Body bytes `>= 0x80` collide with the reserved control values, so the
//! sender escapes them: the byte is replaced by `0xF1` followed by its
//! bitwise inverse. [`FrameReassembler`] reverses this while splitting the
//! incoming byte stream into frames.
//!
//! The checksum is the low 7 bits of the sum of all wire bytes from the start
//! delimiter through the body (escape markers included) plus the wire byte
//! count. It is recomputed on receipt but only ever logged on mismatch -- the
//! real hardware emits frames that trip the 7-bit mask, so rejecting them
//! would drop legitimate traffic.

use bytes::{BufMut, BytesMut};
use tracing::warn;

use crate::{Error, Result};

/// Start-of-frame delimiter.
pub const START_BYTE: u8 = 0xF0;
/// End-of-frame delimiter.
pub const END_BYTE: u8 = 0xF7;
/// Escape marker: the next byte must be bit-inverted before use.
pub const INVERT_BYTE: u8 = 0xF1;

/// Minimum wire size: delimiters, six address bytes, message type, checksum.
const MIN_FRAME_LEN: usize = 10;

// Reserved broadcast/wildcard addresses. These are passed through unchanged
// and never dereferenced as concrete zone indices.
pub const CONTROLLER_ALL_KEYPADS: u8 = 0x7F;
pub const CONTROLLER_ALL: u8 = 0x7E;
pub const CONTROLLER_ALL_DEVICES: u8 = 0x7D;
pub const KEYPAD_CONTROLLER: u8 = 0x7F;
pub const KEYPAD_ALL_IN_ZONE: u8 = 0x7D;
pub const KEYPAD_ALL_ON_SOURCE: u8 = 0x79;

/// Default source keypad id stamped on locally-built frames.
const KEYPAD_SELF: u8 = 0x70;

/// One delimited unit of wire traffic, with the escaping already undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub target_controller_id: u8,
    pub target_zone_id: u8,
    pub target_keypad_id: u8,
    pub source_controller_id: u8,
    pub source_zone_id: u8,
    pub source_keypad_id: u8,
    pub message_type: u8,
    pub body: Vec<u8>,
}

impl Frame {
    /// New outbound frame with the default address bytes.
    pub fn new(message_type: u8) -> Self {
        Self {
            target_controller_id: 0x00,
            target_zone_id: 0x00,
            target_keypad_id: KEYPAD_CONTROLLER,
            source_controller_id: 0x00,
            source_zone_id: 0x00,
            source_keypad_id: KEYPAD_SELF,
            message_type,
            body: Vec::new(),
        }
    }

    /// Serialize to wire bytes: delimiters, addresses, escaped body, checksum.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(MIN_FRAME_LEN + self.body.len() * 2);
        buf.put_u8(START_BYTE);
        buf.put_u8(self.target_controller_id);
        buf.put_u8(self.target_zone_id);
        buf.put_u8(self.target_keypad_id);
        buf.put_u8(self.source_controller_id);
        buf.put_u8(self.source_zone_id);
        buf.put_u8(self.source_keypad_id);
        buf.put_u8(self.message_type);
        for &b in &self.body {
            if b >= 0x80 {
                buf.put_u8(INVERT_BYTE);
                buf.put_u8(!b);
            } else {
                buf.put_u8(b);
            }
        }
        buf.put_u8(checksum(&buf));
        buf.put_u8(END_BYTE);
        buf.to_vec()
    }

    /// Parse an already-unescaped frame.
    ///
    /// The checksum byte is read but not enforced (see module docs).
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_FRAME_LEN {
            return Err(Error::MalformedFrame("frame shorter than minimum length"));
        }
        if data[0] != START_BYTE {
            return Err(Error::MalformedFrame("missing start delimiter"));
        }
        if data[data.len() - 1] != END_BYTE {
            return Err(Error::MalformedFrame("missing end delimiter"));
        }

        Ok(Self {
            target_controller_id: data[1],
            target_zone_id: data[2],
            target_keypad_id: data[3],
            source_controller_id: data[4],
            source_zone_id: data[5],
            source_keypad_id: data[6],
            message_type: data[7],
            body: data[8..data.len() - 2].to_vec(),
        })
    }
}

/// Low 7 bits of the byte sum plus the byte count.
///
/// The mask is applied unconditionally; a true sum overflowing 7 bits is not
/// an error here.
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum: u32 = bytes.iter().map(|&b| u32::from(b)).sum::<u32>() + bytes.len() as u32;
    (sum & 0x7F) as u8
}

/// Splits the incoming byte stream into frames, undoing the invert escaping.
///
/// Small state machine with three states: idle (no frame in progress),
/// in-frame (accumulating until the end delimiter), and invert-pending (next
/// byte is bit-inverted before any delimiter check). A start byte arriving
/// mid-frame drops the partial frame with a warning and begins a new one.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    /// Unescaped frame bytes; `None` while idle.
    frame: Option<Vec<u8>>,
    /// Bytes exactly as received for the current frame, for the checksum audit.
    raw: Vec<u8>,
    invert_next: bool,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of stream bytes, returning any completed frames.
    ///
    /// Frames shorter than the fixed header are logged and dropped; the
    /// reassembler itself never fails.
    pub fn extend(&mut self, data: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for &b in data {
            if let Some(frame) = self.push_byte(b) {
                frames.push(frame);
            }
        }
        frames
    }

    fn push_byte(&mut self, b: u8) -> Option<Frame> {
        if self.invert_next {
            self.invert_next = false;
            self.raw.push(b);
            return self.accept(!b);
        }

        if b == INVERT_BYTE {
            if self.frame.is_some() {
                self.raw.push(b);
                self.invert_next = true;
            } else {
                warn!("escape marker received outside a frame");
            }
            return None;
        }

        if self.frame.is_some() {
            self.raw.push(b);
        }
        self.accept(b)
    }

    /// Handle one unescaped byte value.
    fn accept(&mut self, v: u8) -> Option<Frame> {
        match v {
            START_BYTE => {
                if self.frame.is_some() {
                    warn!("start byte received mid-frame, dropping partial frame");
                }
                self.frame = Some(vec![START_BYTE]);
                self.raw = vec![START_BYTE];
                None
            }
            END_BYTE => match self.frame.take() {
                Some(mut frame) => {
                    frame.push(END_BYTE);
                    self.audit_checksum();
                    match Frame::decode(&frame) {
                        Ok(f) => Some(f),
                        Err(e) => {
                            warn!(error = %e, len = frame.len(), "dropping undersized frame");
                            None
                        }
                    }
                }
                None => {
                    warn!("end byte received without a frame in progress");
                    None
                }
            },
            _ => match &mut self.frame {
                Some(frame) => {
                    frame.push(v);
                    None
                }
                None => {
                    warn!(byte = v, "data byte received outside a frame");
                    None
                }
            },
        }
    }

    /// Recompute the sender checksum over the raw escaped bytes and warn on
    /// mismatch. Never rejects the frame.
    fn audit_checksum(&mut self) {
        let raw = std::mem::take(&mut self.raw);
        // raw = start byte .. escaped body, checksum, end byte.
        if raw.len() < MIN_FRAME_LEN {
            return;
        }
        let received = raw[raw.len() - 2];
        let expected = checksum(&raw[..raw.len() - 2]);
        if received != expected {
            warn!(received, expected, "frame checksum mismatch (tolerated)");
        }
    }
}
