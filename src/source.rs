//! Per-source state container.
//!
//! Same shape as [`crate::zone::Zone`]: compare-and-set mutators buffering
//! [`SourceChange`] records for the controller to drain. Sources also carry
//! media metadata and descriptive text pushed in by smart-source
//! integrations.

use crate::event::Origin;
use crate::packet::KeypadKey;

/// Kind of equipment behind a source input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SourceType {
    Generic = 0,
    GoogleCast = 1,
    Sonos = 2,
}

impl SourceType {
    pub fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            0 => SourceType::Generic,
            1 => SourceType::GoogleCast,
            2 => SourceType::Sonos,
            _ => return None,
        })
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Network-controlled sources are driven over IP; keypad-style transport
    /// commands are never sent to them.
    pub fn network_controlled(self) -> bool {
        !matches!(self, SourceType::Generic)
    }
}

/// Transport control operation aimed at a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    Next,
    Prev,
    Stop,
    Play,
    Pause,
    VolumeUp,
    VolumeDown,
}

impl ControlOp {
    /// Keypad key that carries this operation on the wire.
    pub fn keypad_key(self) -> KeypadKey {
        match self {
            ControlOp::Next => KeypadKey::Next,
            ControlOp::Prev => KeypadKey::Previous,
            ControlOp::Stop => KeypadKey::Stop,
            ControlOp::Play => KeypadKey::Play,
            ControlOp::Pause => KeypadKey::Pause,
            ControlOp::VolumeUp => KeypadKey::Plus,
            ControlOp::VolumeDown => KeypadKey::Minus,
        }
    }
}

/// One accepted source mutation, drained by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceChange {
    Name { name: String, old_name: String },
    Kind(SourceType),
    MediaMetadata,
    MediaPlaying(bool),
    DescriptiveText {
        text: Option<String>,
        flash_time: u16,
        origin: Origin,
    },
    Control { op: ControlOp, origin: Origin },
    OverrideName(bool),
}

#[derive(Debug)]
pub struct Source {
    source_id: u8,
    name: String,
    kind: SourceType,
    descriptive_text: Option<String>,
    flash_time: u16,
    text_from_device: bool,
    override_name: bool,
    title: Option<String>,
    artist: Option<String>,
    artwork_url: Option<String>,
    playing: bool,
    changes: Vec<SourceChange>,
}

impl Source {
    pub fn new(source_id: u8, name: impl Into<String>, kind: SourceType) -> Self {
        Self {
            source_id,
            name: name.into(),
            kind,
            descriptive_text: None,
            flash_time: 0,
            text_from_device: false,
            override_name: false,
            title: None,
            artist: None,
            artwork_url: None,
            playing: false,
            changes: Vec::new(),
        }
    }

    pub fn source_id(&self) -> u8 {
        self.source_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SourceType {
        self.kind
    }

    /// Locally-set descriptive text, if any. Text that came from the device
    /// is display echo and is never re-sent.
    pub fn local_descriptive_text(&self) -> Option<&str> {
        if self.text_from_device {
            None
        } else {
            self.descriptive_text.as_deref()
        }
    }

    pub fn flash_time(&self) -> u16 {
        self.flash_time
    }

    pub fn override_name(&self) -> bool {
        self.override_name
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    pub fn artwork_url(&self) -> Option<&str> {
        self.artwork_url.as_deref()
    }

    pub fn playing(&self) -> bool {
        self.playing
    }

    /// Drain the buffered change records.
    pub fn take_changes(&mut self) -> Vec<SourceChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.name == name {
            return;
        }
        let old_name = std::mem::replace(&mut self.name, name.clone());
        self.changes.push(SourceChange::Name { name, old_name });
    }

    pub fn set_kind(&mut self, kind: SourceType) {
        if self.kind == kind {
            return;
        }
        self.kind = kind;
        self.changes.push(SourceChange::Kind(kind));
    }

    pub fn set_override_name(&mut self, override_name: bool) {
        if self.override_name == override_name {
            return;
        }
        self.override_name = override_name;
        self.changes.push(SourceChange::OverrideName(override_name));
    }

    pub fn set_media_metadata(
        &mut self,
        title: Option<String>,
        artist: Option<String>,
        artwork_url: Option<String>,
    ) {
        if self.title == title && self.artist == artist && self.artwork_url == artwork_url {
            return;
        }
        self.title = title;
        self.artist = artist;
        self.artwork_url = artwork_url;
        self.changes.push(SourceChange::MediaMetadata);
    }

    pub fn set_media_playing(&mut self, playing: bool) {
        if self.playing == playing {
            return;
        }
        self.playing = playing;
        self.changes.push(SourceChange::MediaPlaying(playing));
    }

    pub fn set_descriptive_text(&mut self, text: Option<String>, flash_time: u16, origin: Origin) {
        self.descriptive_text = text.clone();
        self.flash_time = flash_time;
        self.text_from_device = origin.is_device();
        self.changes.push(SourceChange::DescriptiveText {
            text,
            flash_time,
            origin,
        });
    }

    /// Route a transport control at this source. Play/Pause/Stop also settle
    /// the playing flag.
    pub fn control(&mut self, op: ControlOp, origin: Origin) {
        self.changes.push(SourceChange::Control { op, origin });
        match op {
            ControlOp::Play => self.set_media_playing(true),
            ControlOp::Pause | ControlOp::Stop => self.set_media_playing(false),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_change_keeps_old_name() {
        let mut source = Source::new(1, "Source 1", SourceType::Generic);
        source.set_name("CD Player");
        assert_eq!(source.name(), "CD Player");
        assert_eq!(
            source.take_changes(),
            vec![SourceChange::Name {
                name: "CD Player".into(),
                old_name: "Source 1".into(),
            }]
        );

        source.set_name("CD Player");
        assert!(source.take_changes().is_empty());
    }

    #[test]
    fn control_settles_playing_flag() {
        let mut source = Source::new(0, "Cast", SourceType::GoogleCast);
        source.control(ControlOp::Play, Origin::Device);
        assert!(source.playing());
        assert_eq!(
            source.take_changes(),
            vec![
                SourceChange::Control { op: ControlOp::Play, origin: Origin::Device },
                SourceChange::MediaPlaying(true),
            ]
        );

        source.control(ControlOp::Next, Origin::Device);
        assert!(source.playing());
        source.control(ControlOp::Stop, Origin::Local);
        assert!(!source.playing());
    }

    #[test]
    fn device_text_is_not_local() {
        let mut source = Source::new(2, "Tuner", SourceType::Generic);
        source.set_descriptive_text(Some("98.5 FM".into()), 0, Origin::Device);
        assert_eq!(source.local_descriptive_text(), None);

        source.set_descriptive_text(Some("Now Playing".into()), 30, Origin::Local);
        assert_eq!(source.local_descriptive_text(), Some("Now Playing"));
        assert_eq!(source.flash_time(), 30);
    }

    #[test]
    fn network_controlled_types() {
        assert!(!SourceType::Generic.network_controlled());
        assert!(SourceType::GoogleCast.network_controlled());
        assert!(SourceType::Sonos.network_controlled());
        for kind in [SourceType::Generic, SourceType::GoogleCast, SourceType::Sonos] {
            assert_eq!(SourceType::from_id(kind.id()), Some(kind));
        }
        assert_eq!(SourceType::from_id(3), None);
    }
}
