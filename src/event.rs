//! Change events delivered to the embedding application.

use crate::param::{ExtraParam, ParamValue};
use crate::source::SourceType;

/// Who triggered a state change.
///
/// Every mutation carries its origin so the controller can suppress echo:
/// device-originated changes update state and emit events but never generate
/// outbound commands back at the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Requested through the public API.
    Local,
    /// Reported by the hardware.
    Device,
}

impl Origin {
    pub fn is_device(self) -> bool {
        matches!(self, Origin::Device)
    }
}

/// State change notification, sent on the bridge's event channel.
///
/// Zone-level events carry the `(controller_id, zone_id)` address; source
/// events carry the source id.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    ZoneName {
        controller_id: u8,
        zone_id: u8,
        name: String,
    },
    Power {
        controller_id: u8,
        zone_id: u8,
        on: bool,
        origin: Origin,
    },
    Volume {
        controller_id: u8,
        zone_id: u8,
        volume: u8,
        origin: Origin,
    },
    MaxVolume {
        controller_id: u8,
        zone_id: u8,
        max_volume: u8,
    },
    Mute {
        controller_id: u8,
        zone_id: u8,
        muted: bool,
    },
    ZoneSource {
        controller_id: u8,
        zone_id: u8,
        source_id: u8,
        origin: Origin,
    },
    Parameter {
        controller_id: u8,
        zone_id: u8,
        param: ExtraParam,
        value: ParamValue,
        origin: Origin,
    },
    NewZone {
        controller_id: u8,
        zone_id: u8,
    },
    ZoneDeleted {
        controller_id: u8,
        zone_id: u8,
    },
    SourceName {
        source_id: u8,
        name: String,
        old_name: String,
    },
    SourceType {
        source_id: u8,
        kind: SourceType,
    },
    MediaMetadata {
        source_id: u8,
        title: Option<String>,
        artist: Option<String>,
        artwork_url: Option<String>,
    },
    MediaPlaying {
        source_id: u8,
        playing: bool,
    },
    DescriptiveText {
        source_id: u8,
        text: Option<String>,
        flash_time: u16,
    },
    NewSource {
        source_id: u8,
    },
    SourceDeleted {
        source_id: u8,
    },
    /// A zone-info snapshot finished applying (`zone` set), or a single
    /// device-side field report was applied (`zone` empty).
    Update {
        zone: Option<(u8, u8)>,
    },
    Connected,
    Disconnected,
    Error {
        message: String,
    },
}
