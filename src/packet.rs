//! Typed packet model and classifier.
//!
//! Inbound traffic is decoded into the closed [`Packet`] enum by
//! [`classify`], keyed first on the frame's message type and then, for data
//! frames, on the *source path* -- a short byte sequence acting as a
//! hierarchical field selector (a menu address). Anything matching no rule
//! classifies as `None`; unknown frames are expected traffic, not errors.
//!
//! Outbound commands live in [`cmd`]: each builder returns a ready-to-encode
//! [`Frame`].

use bytes::{Buf, BufMut, BytesMut};

use crate::frame::{Frame, CONTROLLER_ALL, KEYPAD_ALL_ON_SOURCE};
use crate::param::{ExtraParam, ParamValue};

// Message types.
pub const MSG_DATA: u8 = 0x00;
pub const MSG_REQUEST_DATA: u8 = 0x01;
pub const MSG_HANDSHAKE: u8 = 0x02;
pub const MSG_DISPLAY_MESSAGE: u8 = 0x04;
pub const MSG_EVENT: u8 = 0x05;
pub const MSG_RENDERED_DISPLAY: u8 = 0x06;

// Event ids for zone commands.
const EVENT_SET_SOURCE: u16 = 0x00C1;
const EVENT_SET_POWER: u16 = 0x00DC;
const EVENT_SET_ALL_POWER: u16 = 0x00DD;
const EVENT_SET_VOLUME: u16 = 0x00DE;

/// Keypad key codes relayed as event packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeypadKey {
    SetupButton = 0x64,
    Previous = 0x67,
    Next = 0x68,
    Plus = 0x69,
    Minus = 0x6A,
    Source = 0x6B,
    Power = 0x6C,
    Stop = 0x6D,
    Pause = 0x6E,
    Favorite1 = 0x6F,
    Favorite2 = 0x70,
    Play = 0x73,
}

impl KeypadKey {
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0x64 => KeypadKey::SetupButton,
            0x67 => KeypadKey::Previous,
            0x68 => KeypadKey::Next,
            0x69 => KeypadKey::Plus,
            0x6A => KeypadKey::Minus,
            0x6B => KeypadKey::Source,
            0x6C => KeypadKey::Power,
            0x6D => KeypadKey::Stop,
            0x6E => KeypadKey::Pause,
            0x6F => KeypadKey::Favorite1,
            0x70 => KeypadKey::Favorite2,
            0x73 => KeypadKey::Play,
            _ => return None,
        })
    }

    pub fn code(self) -> u16 {
        u16::from(self as u8)
    }
}

/// What a rendered display message is rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderType {
    SourceName,
    Volume,
}

pub const RENDER_SOURCE_NAME: u8 = 0x01;
pub const RENDER_VOLUME: u8 = 0x02;

/// Display text alignment for [`cmd::display_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TextAlign {
    Left = 0x00,
    Centered = 0x01,
}

// ============================================================================
// Inbound packets
// ============================================================================

/// Acknowledgement exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub controller_id: u8,
    pub handshake_type: u8,
}

/// Bulk zone snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneInfo {
    pub controller_id: u8,
    pub zone_id: u8,
    pub power: bool,
    pub source_id: u8,
    pub volume: u8,
    pub bass: i16,
    pub treble: i16,
    pub loudness: bool,
    pub balance: i16,
    pub party_mode: i16,
    pub do_not_disturb: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZonePower {
    pub controller_id: u8,
    pub zone_id: u8,
    pub power: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSource {
    pub controller_id: u8,
    pub zone_id: u8,
    pub source_id: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneVolume {
    pub controller_id: u8,
    pub zone_id: u8,
    pub volume: u8,
}

/// Single auxiliary parameter report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneParameter {
    pub controller_id: u8,
    pub zone_id: u8,
    pub param: ExtraParam,
    pub value: ParamValue,
}

/// Key press relayed from a keypad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypadEvent {
    pub controller_id: u8,
    pub zone_id: u8,
    pub key: KeypadKey,
}

/// Device-pushed display update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRender {
    pub controller_id: u8,
    pub zone_id: u8,
    pub render: RenderType,
    pub flash_time: u16,
    pub value: u16,
}

impl DisplayRender {
    pub fn low_value(&self) -> u8 {
        (self.value & 0x00FF) as u8
    }

    pub fn high_value(&self) -> u8 {
        (self.value >> 8) as u8
    }
}

/// Closed set of recognized inbound packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Handshake(Handshake),
    ZoneInfo(ZoneInfo),
    ZonePower(ZonePower),
    ZoneSource(ZoneSource),
    ZoneVolume(ZoneVolume),
    ZoneParameter(ZoneParameter),
    KeypadEvent(KeypadEvent),
    DisplayRender(DisplayRender),
}

impl Packet {
    /// Whether the device expects a handshake acknowledgement for this
    /// packet. The controller reads this but deliberately never replies; the
    /// hardware keeps talking without the ack.
    pub fn requires_handshake(&self) -> bool {
        matches!(self, Packet::Handshake(_) | Packet::ZoneParameter(_))
    }
}

// ============================================================================
// Body codecs
// ============================================================================

/// Parsed body of a data (0x00) frame.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DataBody {
    target_path: Vec<u8>,
    source_path: Vec<u8>,
    packet_number: u16,
    packet_count: u16,
    data: Vec<u8>,
}

/// Parsed body of an event (0x05) frame.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EventBody {
    target_path: Vec<u8>,
    source_path: Vec<u8>,
    event_id: u16,
    event_timestamp: u16,
    event_data: u16,
    event_priority: u8,
}

fn take_path(buf: &mut &[u8]) -> Option<Vec<u8>> {
    if buf.remaining() < 1 {
        return None;
    }
    let len = usize::from(buf.get_u8());
    if buf.remaining() < len {
        return None;
    }
    let path = buf[..len].to_vec();
    buf.advance(len);
    Some(path)
}

fn parse_data_body(mut buf: &[u8]) -> Option<DataBody> {
    let target_path = take_path(&mut buf)?;
    let source_path = take_path(&mut buf)?;
    if buf.remaining() < 6 {
        return None;
    }
    let packet_number = buf.get_u16_le();
    let packet_count = buf.get_u16_le();
    let data_len = usize::from(buf.get_u16_le());
    if buf.remaining() < data_len {
        return None;
    }
    Some(DataBody {
        target_path,
        source_path,
        packet_number,
        packet_count,
        data: buf[..data_len].to_vec(),
    })
}

fn parse_event_body(mut buf: &[u8]) -> Option<EventBody> {
    let target_path = take_path(&mut buf)?;
    let source_path = take_path(&mut buf)?;
    if buf.remaining() < 7 {
        return None;
    }
    Some(EventBody {
        target_path,
        source_path,
        event_id: buf.get_u16_le(),
        event_timestamp: buf.get_u16_le(),
        event_data: buf.get_u16_le(),
        event_priority: buf.get_u8(),
    })
}

fn put_path(buf: &mut BytesMut, path: &[u8]) {
    buf.put_u8(path.len() as u8);
    buf.put_slice(path);
}

fn encode_data_body(target_path: &[u8], source_path: &[u8], data: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(8 + target_path.len() + source_path.len() + data.len());
    put_path(&mut buf, target_path);
    put_path(&mut buf, source_path);
    buf.put_u16_le(0); // packet number
    buf.put_u16_le(1); // packet count
    buf.put_u16_le(data.len() as u16);
    buf.put_slice(data);
    buf.to_vec()
}

fn encode_event_body(
    target_path: &[u8],
    source_path: &[u8],
    event_id: u16,
    event_timestamp: u16,
    event_data: u16,
) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(9 + target_path.len() + source_path.len());
    put_path(&mut buf, target_path);
    put_path(&mut buf, source_path);
    buf.put_u16_le(event_id);
    buf.put_u16_le(event_timestamp);
    buf.put_u16_le(event_data);
    buf.put_u8(0x01); // event priority
    buf.to_vec()
}

// ============================================================================
// Classifier
// ============================================================================

/// Identify which packet variant a decoded frame represents.
///
/// Pure function; returns `None` for every message-type/path combination
/// outside the known table, never an error.
pub fn classify(frame: &Frame) -> Option<Packet> {
    match frame.message_type {
        MSG_DATA => classify_data(frame),
        MSG_HANDSHAKE => Some(Packet::Handshake(Handshake {
            controller_id: frame.source_controller_id,
            handshake_type: *frame.body.first()?,
        })),
        MSG_EVENT => classify_event(frame),
        MSG_RENDERED_DISPLAY => classify_render(frame),
        _ => None,
    }
}

fn classify_data(frame: &Frame) -> Option<Packet> {
    let body = parse_data_body(&frame.body)?;
    // Zone reports always fit one frame; multi-packet payloads carry menu
    // screens and other traffic this bridge does not consume.
    if body.packet_number != 0 || body.packet_count > 1 {
        return None;
    }
    let path = &body.source_path;
    let controller_id = frame.source_controller_id;

    // Zone run-mode reports: [root menu, run mode, zone, field].
    if path.len() == 4 && path[0] == 0x02 && path[1] == 0x00 {
        let zone_id = path[2];
        return match path[3] {
            0x07 => {
                let d = &body.data;
                if d.len() < 11 {
                    return None;
                }
                Some(Packet::ZoneInfo(ZoneInfo {
                    controller_id,
                    zone_id,
                    power: d[0] == 0x01,
                    source_id: d[1],
                    volume: d[2].saturating_mul(2),
                    bass: i16::from(d[3]) - 10,
                    treble: i16::from(d[4]) - 10,
                    loudness: d[5] == 0x01,
                    balance: i16::from(d[6]) - 10,
                    party_mode: i16::from(d[9]),
                    do_not_disturb: d[10] == 0x01,
                }))
            }
            0x06 => Some(Packet::ZonePower(ZonePower {
                controller_id,
                zone_id,
                power: *body.data.first()? == 0x01,
            })),
            0x02 => Some(Packet::ZoneSource(ZoneSource {
                controller_id,
                zone_id,
                source_id: *body.data.first()?,
            })),
            0x01 => Some(Packet::ZoneVolume(ZoneVolume {
                controller_id,
                zone_id,
                volume: body.data.first()?.saturating_mul(2),
            })),
            _ => None,
        };
    }

    // User parameter report: [root menu, run mode, zone, parameters, id].
    if path.len() == 5 && path[0] == 0x02 && path[1] == 0x00 && path[3] == 0x00 {
        let param = ExtraParam::from_id(path[4])?;
        return Some(Packet::ZoneParameter(ZoneParameter {
            controller_id,
            zone_id: path[2],
            param,
            value: param.decode_wire(*body.data.first()?),
        }));
    }

    None
}

fn classify_event(frame: &Frame) -> Option<Packet> {
    let body = parse_event_body(&frame.body)?;
    if body.source_path != [0x04, 0x03] {
        return None;
    }
    let key = KeypadKey::from_code(body.event_id)?;
    Some(Packet::KeypadEvent(KeypadEvent {
        controller_id: frame.source_controller_id,
        zone_id: frame.source_zone_id,
        key,
    }))
}

fn classify_render(frame: &Frame) -> Option<Packet> {
    let mut buf: &[u8] = &frame.body;
    if buf.remaining() < 5 {
        return None;
    }
    let render = match buf.get_u8() {
        RENDER_SOURCE_NAME => RenderType::SourceName,
        RENDER_VOLUME => RenderType::Volume,
        _ => return None,
    };
    Some(Packet::DisplayRender(DisplayRender {
        controller_id: frame.target_controller_id,
        zone_id: frame.target_zone_id,
        render,
        flash_time: buf.get_u16_le(),
        value: buf.get_u16_le(),
    }))
}

// ============================================================================
// Outbound command builders
// ============================================================================

/// Builders for outbound command frames.
pub mod cmd {
    use super::*;

    /// Event frame aimed at one zone's run-mode menu.
    fn zone_event(
        controller_id: u8,
        zone_id: u8,
        event_id: u16,
        event_timestamp: u16,
        event_data: u16,
    ) -> Frame {
        let mut frame = Frame::new(MSG_EVENT);
        frame.target_controller_id = controller_id;
        frame.source_zone_id = zone_id;
        frame.body = encode_event_body(&[0x02, 0x00], &[], event_id, event_timestamp, event_data);
        frame
    }

    /// Power one zone on or off.
    pub fn set_power(controller_id: u8, zone_id: u8, on: bool) -> Frame {
        zone_event(
            controller_id,
            zone_id,
            EVENT_SET_POWER,
            u16::from(on) << 8,
            u16::from(zone_id),
        )
    }

    /// Set one zone's volume (sent at half scale).
    pub fn set_volume(controller_id: u8, zone_id: u8, volume: u8) -> Frame {
        zone_event(
            controller_id,
            zone_id,
            EVENT_SET_VOLUME,
            u16::from(volume / 2),
            u16::from(zone_id),
        )
    }

    /// Select one zone's input source.
    pub fn set_source(controller_id: u8, zone_id: u8, source_id: u8) -> Frame {
        zone_event(
            controller_id,
            zone_id,
            EVENT_SET_SOURCE,
            u16::from(source_id),
            u16::from(zone_id),
        )
    }

    /// Power every zone on every controller on or off.
    pub fn set_all_power(on: bool) -> Frame {
        let mut frame = Frame::new(MSG_EVENT);
        frame.target_controller_id = CONTROLLER_ALL;
        frame.body = encode_event_body(&[0x02, 0x00], &[], EVENT_SET_ALL_POWER, u16::from(on) << 8, 0);
        frame
    }

    /// Relay a keypad key press to a zone.
    pub fn keypad_event(controller_id: u8, zone_id: u8, key: KeypadKey) -> Frame {
        zone_event(controller_id, zone_id, key.code(), 0, 0)
    }

    /// Set one auxiliary parameter.
    pub fn set_parameter(
        controller_id: u8,
        zone_id: u8,
        param: ExtraParam,
        value: ParamValue,
    ) -> Frame {
        let mut frame = Frame::new(MSG_DATA);
        frame.target_controller_id = controller_id;
        frame.body = encode_data_body(
            &[0x02, 0x00, zone_id, 0x00, param.id()],
            &[],
            &[param.encode_wire(value)],
        );
        frame
    }

    /// Request frame for the given target path.
    fn request(controller_id: u8, target_path: &[u8]) -> Frame {
        let mut frame = Frame::new(MSG_REQUEST_DATA);
        frame.target_controller_id = controller_id;
        let mut body = BytesMut::with_capacity(target_path.len() + 3);
        put_path(&mut body, target_path);
        put_path(&mut body, &[]);
        body.put_u8(0x00); // request type: data
        frame.body = body.to_vec();
        frame
    }

    /// Ask a zone for its full info snapshot.
    pub fn request_zone_info(controller_id: u8, zone_id: u8) -> Frame {
        request(controller_id, &[0x02, 0x00, zone_id, 0x07])
    }

    /// Ask a zone for one auxiliary parameter.
    pub fn request_parameter(controller_id: u8, zone_id: u8, param: ExtraParam) -> Frame {
        request(controller_id, &[0x02, 0x00, zone_id, 0x00, param.id()])
    }

    /// Acknowledgement frame.
    pub fn handshake(controller_id: u8, handshake_type: u8) -> Frame {
        let mut frame = Frame::new(MSG_HANDSHAKE);
        frame.target_controller_id = controller_id;
        frame.body = vec![handshake_type];
        frame
    }

    /// Show a message on a zone's keypad display.
    pub fn display_message(
        controller_id: u8,
        zone_id: u8,
        align: TextAlign,
        flash_time: u16,
        text: &str,
    ) -> Frame {
        let mut frame = Frame::new(MSG_DISPLAY_MESSAGE);
        frame.target_controller_id = controller_id;
        frame.target_zone_id = zone_id;
        let mut body = BytesMut::with_capacity(3 + text.len());
        body.put_u8(align as u8);
        body.put_u16_le(flash_time);
        body.put_slice(text.as_bytes());
        frame.body = body.to_vec();
        frame
    }

    /// Broadcast descriptive text to every keypad watching a source.
    pub fn source_descriptive_text(source_id: u8, flash_time: u16, text: &str) -> Frame {
        let mut frame = Frame::new(MSG_RENDERED_DISPLAY);
        frame.target_controller_id = CONTROLLER_ALL;
        frame.target_keypad_id = KEYPAD_ALL_ON_SOURCE;
        frame.source_zone_id = source_id;
        let mut body = BytesMut::with_capacity(3 + text.len());
        body.put_u8(RENDER_SOURCE_NAME);
        body.put_u16_le(flash_time);
        body.put_slice(text.as_bytes());
        frame.body = body.to_vec();
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Inbound-style data frame with the given source path and data bytes.
    fn data_frame(controller_id: u8, source_path: &[u8], data: &[u8]) -> Frame {
        let mut frame = Frame::new(MSG_DATA);
        frame.source_controller_id = controller_id;
        frame.body = encode_data_body(&[], source_path, data);
        frame
    }

    fn keypad_frame(controller_id: u8, zone_id: u8, event_id: u16) -> Frame {
        let mut frame = Frame::new(MSG_EVENT);
        frame.source_controller_id = controller_id;
        frame.source_zone_id = zone_id;
        frame.body = encode_event_body(&[0x02, 0x00], &[0x04, 0x03], event_id, 0, 0);
        frame
    }

    #[test]
    fn classifies_zone_info() {
        let data = [0x01, 0x02, 25, 13, 7, 0x01, 10, 0x01, 0x00, 0x02, 0x01];
        let frame = data_frame(0, &[0x02, 0x00, 0x04, 0x07], &data);
        match classify(&frame) {
            Some(Packet::ZoneInfo(info)) => {
                assert_eq!(info.controller_id, 0);
                assert_eq!(info.zone_id, 4);
                assert!(info.power);
                assert_eq!(info.source_id, 2);
                assert_eq!(info.volume, 50);
                assert_eq!(info.bass, 3);
                assert_eq!(info.treble, -3);
                assert!(info.loudness);
                assert_eq!(info.balance, 0);
                assert_eq!(info.party_mode, 2);
                assert!(info.do_not_disturb);
            }
            other => panic!("expected ZoneInfo, got {other:?}"),
        }
    }

    #[test]
    fn classifies_single_field_reports() {
        let frame = data_frame(1, &[0x02, 0x00, 0x00, 0x06], &[0x01]);
        assert!(matches!(
            classify(&frame),
            Some(Packet::ZonePower(ZonePower { controller_id: 1, zone_id: 0, power: true }))
        ));

        let frame = data_frame(0, &[0x02, 0x00, 0x03, 0x02], &[0x05]);
        assert!(matches!(
            classify(&frame),
            Some(Packet::ZoneSource(ZoneSource { zone_id: 3, source_id: 5, .. }))
        ));

        let frame = data_frame(0, &[0x02, 0x00, 0x01, 0x01], &[30]);
        assert!(matches!(
            classify(&frame),
            Some(Packet::ZoneVolume(ZoneVolume { zone_id: 1, volume: 60, .. }))
        ));
    }

    #[test]
    fn classifies_zone_parameter() {
        let frame = data_frame(0, &[0x02, 0x00, 0x02, 0x00, 0x00], &[3]);
        match classify(&frame) {
            Some(Packet::ZoneParameter(p)) => {
                assert_eq!(p.zone_id, 2);
                assert_eq!(p.param, ExtraParam::Bass);
                assert_eq!(p.value, ParamValue::Int(-7));
                assert!(Packet::ZoneParameter(p).requires_handshake());
            }
            other => panic!("expected ZoneParameter, got {other:?}"),
        }
    }

    #[test]
    fn classifies_keypad_event() {
        let frame = keypad_frame(0, 2, 0x6C);
        assert!(matches!(
            classify(&frame),
            Some(Packet::KeypadEvent(KeypadEvent { zone_id: 2, key: KeypadKey::Power, .. }))
        ));
    }

    #[test]
    fn classifies_handshake_and_render() {
        let mut frame = Frame::new(MSG_HANDSHAKE);
        frame.source_controller_id = 1;
        frame.body = vec![0x02];
        let packet = classify(&frame).unwrap();
        assert!(packet.requires_handshake());
        assert!(matches!(
            packet,
            Packet::Handshake(Handshake { controller_id: 1, handshake_type: 2 })
        ));

        let mut frame = Frame::new(MSG_RENDERED_DISPLAY);
        frame.target_controller_id = 0;
        frame.target_zone_id = 1;
        frame.body = vec![RENDER_VOLUME, 0x00, 0x00, 20, 0x00];
        match classify(&frame) {
            Some(Packet::DisplayRender(r)) => {
                assert_eq!(r.render, RenderType::Volume);
                assert_eq!(r.low_value(), 20);
                assert_eq!(r.high_value(), 0);
            }
            other => panic!("expected DisplayRender, got {other:?}"),
        }
    }

    #[test]
    fn unknown_frames_classify_as_none() {
        // Unknown message type.
        let frame = Frame::new(0x37);
        assert_eq!(classify(&frame), None);

        // Known type, unknown path.
        let frame = data_frame(0, &[0x02, 0x01, 0x00, 0x07], &[0; 11]);
        assert_eq!(classify(&frame), None);
        let frame = data_frame(0, &[0x02, 0x00, 0x00], &[0x01]);
        assert_eq!(classify(&frame), None);

        // Parameter path with an out-of-range parameter id.
        let frame = data_frame(0, &[0x02, 0x00, 0x00, 0x00, 0x09], &[0x01]);
        assert_eq!(classify(&frame), None);

        // Keypad event with an unknown key code.
        let frame = keypad_frame(0, 0, 0x0042);
        assert_eq!(classify(&frame), None);

        // Rendered display with an unknown render type.
        let mut frame = Frame::new(MSG_RENDERED_DISPLAY);
        frame.body = vec![0x7A, 0, 0, 0, 0];
        assert_eq!(classify(&frame), None);

        // Truncated bodies never panic.
        let mut frame = Frame::new(MSG_DATA);
        frame.body = vec![0x04, 0x02];
        assert_eq!(classify(&frame), None);
        let mut frame = Frame::new(MSG_HANDSHAKE);
        frame.body = vec![];
        assert_eq!(classify(&frame), None);
    }

    #[test]
    fn set_power_builder_layout() {
        let frame = cmd::set_power(0x01, 0x04, true);
        assert_eq!(frame.message_type, MSG_EVENT);
        assert_eq!(frame.target_controller_id, 0x01);
        assert_eq!(frame.source_zone_id, 0x04);
        let body = parse_event_body(&frame.body).unwrap();
        assert_eq!(body.target_path, vec![0x02, 0x00]);
        assert_eq!(body.event_id, EVENT_SET_POWER);
        assert_eq!(body.event_timestamp, 0x0100);
        assert_eq!(body.event_data, 0x0004);
        assert_eq!(body.event_priority, 0x01);
    }

    #[test]
    fn volume_and_source_builders_layout() {
        let body = parse_event_body(&cmd::set_volume(0, 2, 50).body).unwrap();
        assert_eq!(body.event_id, EVENT_SET_VOLUME);
        assert_eq!(body.event_timestamp, 25);
        assert_eq!(body.event_data, 2);

        let body = parse_event_body(&cmd::set_source(0, 2, 3).body).unwrap();
        assert_eq!(body.event_id, EVENT_SET_SOURCE);
        assert_eq!(body.event_timestamp, 3);

        let frame = cmd::set_all_power(false);
        assert_eq!(frame.target_controller_id, CONTROLLER_ALL);
        let body = parse_event_body(&frame.body).unwrap();
        assert_eq!(body.event_id, EVENT_SET_ALL_POWER);
        assert_eq!(body.event_timestamp, 0);
    }

    #[test]
    fn parameter_builder_round_trips_through_classifier() {
        let frame = cmd::set_parameter(0, 5, ExtraParam::Treble, ParamValue::Int(-4));
        let body = parse_data_body(&frame.body).unwrap();
        assert_eq!(body.target_path, vec![0x02, 0x00, 0x05, 0x00, 0x01]);
        assert_eq!(body.data, vec![6]);

        // A device report with the same path/data decodes to the same value.
        let mut report = Frame::new(MSG_DATA);
        report.body = encode_data_body(&[], &body.target_path, &body.data);
        match classify(&report) {
            Some(Packet::ZoneParameter(p)) => assert_eq!(p.value, ParamValue::Int(-4)),
            other => panic!("expected ZoneParameter, got {other:?}"),
        }
    }

    #[test]
    fn request_builder_layout() {
        let frame = cmd::request_zone_info(0x01, 0x02);
        assert_eq!(frame.message_type, MSG_REQUEST_DATA);
        assert_eq!(frame.body, vec![0x04, 0x02, 0x00, 0x02, 0x07, 0x00, 0x00]);

        let frame = cmd::request_parameter(0, 1, ExtraParam::TurnOnVolume);
        assert_eq!(frame.body, vec![0x05, 0x02, 0x00, 0x01, 0x00, 0x04, 0x00, 0x00]);
    }

    #[test]
    fn descriptive_text_builder_layout() {
        let frame = cmd::source_descriptive_text(3, 10, "CD");
        assert_eq!(frame.message_type, MSG_RENDERED_DISPLAY);
        assert_eq!(frame.target_controller_id, CONTROLLER_ALL);
        assert_eq!(frame.target_keypad_id, KEYPAD_ALL_ON_SOURCE);
        assert_eq!(frame.source_zone_id, 3);
        assert_eq!(frame.body, vec![RENDER_SOURCE_NAME, 10, 0, b'C', b'D']);
    }
}
