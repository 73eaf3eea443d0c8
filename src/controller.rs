//! Top-level device aggregate.
//!
//! `Controller` owns everything below the transport: the sparse zone grid,
//! the source array, the outbound queue, the stream reassembler, and the
//! connection lifecycle. It is single-writer state -- the bridge runner is
//! the only task that touches it -- so there is no locking anywhere in here.
//!
//! The core rule is echo suppression: every mutation flows through a zone or
//! source change buffer tagged with its [`Origin`], and only local-origin
//! changes are translated back into outbound commands. Device-originated
//! changes update state and emit events, nothing more.

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::config::{ZoneConfig, ZoneEntry, ZoneStore, DEFAULT_MAX_VOLUME};
use crate::event::{ChangeEvent, Origin};
use crate::frame::{Frame, FrameReassembler};
use crate::packet::{self, cmd, KeypadKey, Packet, RenderType, TextAlign};
use crate::param::{ExtraParam, ParamValue};
use crate::queue::PacketQueue;
use crate::source::{ControlOp, Source, SourceChange, SourceType};
use crate::zone::{Zone, ZoneChange};
use crate::{Error, Result};

/// Connection lifecycle state. Independent of the `connected` flag: a
/// transport error moves here to `Error` and stays there through the
/// subsequent close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Read-only copy of one zone's state.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSnapshot {
    pub controller_id: u8,
    pub zone_id: u8,
    pub name: String,
    pub power: bool,
    pub volume: u8,
    pub max_volume: u8,
    pub muted: bool,
    pub source_id: u8,
    pub parameters: [ParamValue; 9],
}

/// Read-only copy of one source's state.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSnapshot {
    pub source_id: u8,
    pub name: String,
    pub kind: SourceType,
    pub playing: bool,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub artwork_url: Option<String>,
}

pub struct Controller {
    zones: Vec<Vec<Option<Zone>>>,
    sources: Vec<Option<Source>>,
    queue: PacketQueue,
    reassembler: FrameReassembler,
    state: ConnectionState,
    connected: bool,
    auto_update: bool,
    all_muted: bool,
    store: Box<dyn ZoneStore>,
    events: mpsc::UnboundedSender<ChangeEvent>,
    /// Zone-info requeries the runner should fire after the requery delay.
    /// `None` means every zone.
    requeries: Vec<Option<(u8, u8)>>,
}

impl Controller {
    /// Build a controller, restoring zones from the store. Restored zones
    /// emit no events and queue no requests; the connect-time sweep covers
    /// them. Load failures are tolerated with an empty grid.
    pub fn new(store: Box<dyn ZoneStore>) -> (Self, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let mut controller = Self {
            zones: Vec::new(),
            sources: Vec::new(),
            queue: PacketQueue::new(),
            reassembler: FrameReassembler::new(),
            state: ConnectionState::Disconnected,
            connected: false,
            auto_update: false,
            all_muted: false,
            store,
            events,
            requeries: Vec::new(),
        };
        controller.restore_zones();
        (controller, event_rx)
    }

    fn restore_zones(&mut self) {
        let config = match self.store.load() {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "failed to load zone configuration, starting empty");
                ZoneConfig::default()
            }
        };
        for (controller_id, row) in config.zones.iter().enumerate() {
            for (zone_id, entry) in row.iter().enumerate() {
                let Some(entry) = entry else { continue };
                let mut zone = Zone::new(controller_id as u8, zone_id as u8);
                zone.set_name(&entry.name);
                if let Some(maxvol) = entry.maxvol {
                    if let Err(e) = zone.set_max_volume(maxvol) {
                        warn!(controller_id, zone_id, error = %e, "ignoring stored max volume");
                    }
                }
                zone.take_changes();
                self.insert_zone(zone);
            }
        }
        // Write-back normalizes the stored shape.
        self.save_zones();
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn begin_connect(&mut self) {
        info!("connecting to device");
        self.state = ConnectionState::Connecting;
    }

    /// Transport came up: mark connected, announce, and sweep every known
    /// zone for its current state.
    pub fn on_transport_open(&mut self) {
        info!("device connection established");
        self.connected = true;
        self.state = ConnectionState::Connected;
        self.emit(ChangeEvent::Connected);
        self.request_update(None);
    }

    /// Transport failure. Marks the error state and reports it; the
    /// connected flag is left to the close that follows.
    pub fn on_transport_error(&mut self, message: String) {
        warn!(message = %message, "device connection error");
        self.state = ConnectionState::Error;
        self.emit(ChangeEvent::Error { message });
    }

    /// Transport went down. An earlier error is preserved: the state stays
    /// `Error` and no `Disconnected` event fires for the same outage.
    pub fn on_transport_close(&mut self) {
        self.connected = false;
        self.queue.clear();
        if self.state != ConnectionState::Error {
            info!("device connection closed");
            self.state = ConnectionState::Disconnected;
            self.emit(ChangeEvent::Disconnected);
        }
    }

    // ========================================================================
    // Outbound plumbing
    // ========================================================================

    /// Queue a frame for dispatch. Dropped silently while disconnected.
    fn send(&mut self, frame: Frame) {
        if !self.connected {
            debug!(message_type = frame.message_type, "dropping frame while disconnected");
            return;
        }
        self.queue.push(frame);
    }

    /// Pop the next outbound frame as wire bytes. The runner paces calls.
    pub fn next_outbound(&mut self) -> Option<Vec<u8>> {
        let frame = self.queue.pop()?;
        trace!(message_type = frame.message_type, "dispatching frame");
        Some(frame.encode())
    }

    pub fn has_outbound(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Drain the pending requery requests for the runner to schedule.
    pub fn take_requeries(&mut self) -> Vec<Option<(u8, u8)>> {
        std::mem::take(&mut self.requeries)
    }

    /// Queue a zone-info request for one zone, or for every zone.
    pub fn request_update(&mut self, zone: Option<(u8, u8)>) {
        match zone {
            Some((controller_id, zone_id)) => {
                self.send(cmd::request_zone_info(controller_id, zone_id));
            }
            None => {
                let all: Vec<(u8, u8)> = self
                    .zone_ids()
                    .collect();
                for (controller_id, zone_id) in all {
                    self.send(cmd::request_zone_info(controller_id, zone_id));
                }
            }
        }
    }

    pub fn set_auto_update(&mut self, enabled: bool) {
        if self.auto_update != enabled {
            info!(enabled, "auto update");
            self.auto_update = enabled;
        }
    }

    pub fn auto_update(&self) -> bool {
        self.auto_update
    }

    // ========================================================================
    // Zone management
    // ========================================================================

    fn insert_zone(&mut self, zone: Zone) {
        let c = usize::from(zone.controller_id());
        let z = usize::from(zone.zone_id());
        if self.zones.len() <= c {
            self.zones.resize_with(c + 1, Vec::new);
        }
        if self.zones[c].len() <= z {
            self.zones[c].resize_with(z + 1, || None);
        }
        self.zones[c][z] = Some(zone);
    }

    pub fn zone(&self, controller_id: u8, zone_id: u8) -> Option<&Zone> {
        self.zones
            .get(usize::from(controller_id))?
            .get(usize::from(zone_id))?
            .as_ref()
    }

    fn zone_mut(&mut self, controller_id: u8, zone_id: u8) -> Result<&mut Zone> {
        self.zones
            .get_mut(usize::from(controller_id))
            .and_then(|row| row.get_mut(usize::from(zone_id)))
            .and_then(|slot| slot.as_mut())
            .ok_or(Error::UnknownZone { controller_id, zone_id })
    }

    fn zone_ids(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.zones.iter().enumerate().flat_map(|(c, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, slot)| slot.is_some())
                .map(move |(z, _)| (c as u8, z as u8))
        })
    }

    /// Create a zone and ask the device for its state. Creating an existing
    /// zone just renames it.
    pub fn create_zone(&mut self, controller_id: u8, zone_id: u8, name: &str) -> Result<()> {
        if self.zone(controller_id, zone_id).is_some() {
            return self.set_zone_name(controller_id, zone_id, name);
        }
        let mut zone = Zone::new(controller_id, zone_id);
        zone.set_name(name);
        zone.take_changes();
        self.insert_zone(zone);
        self.save_zones();
        self.send(cmd::request_zone_info(controller_id, zone_id));
        self.emit(ChangeEvent::NewZone { controller_id, zone_id });
        Ok(())
    }

    /// Delete a zone and compact trailing empty slots.
    pub fn delete_zone(&mut self, controller_id: u8, zone_id: u8) -> Result<()> {
        let c = usize::from(controller_id);
        let z = usize::from(zone_id);
        let slot = self
            .zones
            .get_mut(c)
            .and_then(|row| row.get_mut(z))
            .ok_or(Error::UnknownZone { controller_id, zone_id })?;
        if slot.take().is_none() {
            return Err(Error::UnknownZone { controller_id, zone_id });
        }
        while self.zones[c].last().is_some_and(|slot| slot.is_none()) {
            self.zones[c].pop();
        }
        while self.zones.last().is_some_and(|row| row.is_empty()) {
            self.zones.pop();
        }
        self.save_zones();
        self.emit(ChangeEvent::ZoneDeleted { controller_id, zone_id });
        Ok(())
    }

    pub fn find_zone_by_name(&self, name: &str) -> Option<(u8, u8)> {
        self.zone_ids()
            .find(|&(c, z)| self.zone(c, z).is_some_and(|zone| zone.name() == name))
    }

    pub fn zone_snapshot(&self, controller_id: u8, zone_id: u8) -> Option<ZoneSnapshot> {
        let zone = self.zone(controller_id, zone_id)?;
        let mut parameters = [ParamValue::Int(0); 9];
        for param in ExtraParam::ALL {
            parameters[usize::from(param.id())] = zone.parameter(param);
        }
        Some(ZoneSnapshot {
            controller_id,
            zone_id,
            name: zone.name().to_owned(),
            power: zone.power(),
            volume: zone.volume(),
            max_volume: zone.max_volume(),
            muted: zone.muted(),
            source_id: zone.source_id(),
            parameters,
        })
    }

    pub fn list_zones(&self) -> Vec<ZoneSnapshot> {
        self.zone_ids()
            .collect::<Vec<_>>()
            .into_iter()
            .filter_map(|(c, z)| self.zone_snapshot(c, z))
            .collect()
    }

    fn save_zones(&mut self) {
        let zones = self
            .zones
            .iter()
            .map(|row| {
                row.iter()
                    .map(|slot| {
                        slot.as_ref().map(|zone| ZoneEntry {
                            name: zone.name().to_owned(),
                            maxvol: (zone.max_volume() < DEFAULT_MAX_VOLUME)
                                .then(|| zone.max_volume()),
                        })
                    })
                    .collect()
            })
            .collect();
        if let Err(e) = self.store.save(&ZoneConfig { zones }) {
            warn!(error = %e, "failed to persist zone configuration");
        }
    }

    // ========================================================================
    // Zone commands (public surface, local origin)
    // ========================================================================

    pub fn set_zone_name(&mut self, controller_id: u8, zone_id: u8, name: &str) -> Result<()> {
        self.zone_mut(controller_id, zone_id)?.set_name(name);
        self.flush_zone_changes(controller_id, zone_id);
        Ok(())
    }

    pub fn set_power(&mut self, controller_id: u8, zone_id: u8, on: bool) -> Result<()> {
        self.zone_mut(controller_id, zone_id)?
            .set_power(on, Origin::Local);
        self.flush_zone_changes(controller_id, zone_id);
        Ok(())
    }

    pub fn set_volume(&mut self, controller_id: u8, zone_id: u8, volume: u8) -> Result<()> {
        self.zone_mut(controller_id, zone_id)?
            .set_volume(volume, Origin::Local)?;
        self.flush_zone_changes(controller_id, zone_id);
        Ok(())
    }

    pub fn set_max_volume(&mut self, controller_id: u8, zone_id: u8, max_volume: u8) -> Result<()> {
        self.zone_mut(controller_id, zone_id)?
            .set_max_volume(max_volume)?;
        self.flush_zone_changes(controller_id, zone_id);
        Ok(())
    }

    pub fn set_mute(&mut self, controller_id: u8, zone_id: u8, muted: bool) -> Result<()> {
        self.zone_mut(controller_id, zone_id)?.set_mute(muted);
        self.flush_zone_changes(controller_id, zone_id);
        Ok(())
    }

    pub fn set_zone_source(&mut self, controller_id: u8, zone_id: u8, source_id: u8) -> Result<()> {
        self.zone_mut(controller_id, zone_id)?
            .set_source(source_id, Origin::Local);
        self.flush_zone_changes(controller_id, zone_id);
        Ok(())
    }

    pub fn set_parameter(
        &mut self,
        controller_id: u8,
        zone_id: u8,
        param: ExtraParam,
        value: ParamValue,
    ) -> Result<()> {
        self.zone_mut(controller_id, zone_id)?
            .set_parameter(param, value, Origin::Local)?;
        self.flush_zone_changes(controller_id, zone_id);
        Ok(())
    }

    /// Broadcast power to every zone on every controller. Zone state is
    /// updated without per-zone commands (the broadcast covers the wire) and
    /// a full requery is scheduled to pick up what the hardware actually did.
    pub fn set_all_power(&mut self, on: bool) {
        self.send(cmd::set_all_power(on));
        let all: Vec<(u8, u8)> = self.zone_ids().collect();
        for (c, z) in all {
            if let Ok(zone) = self.zone_mut(c, z) {
                zone.set_power(on, Origin::Device);
            }
            self.flush_zone_changes(c, z);
        }
        self.requeries.push(None);
    }

    /// Mute or unmute every powered zone.
    pub fn set_all_mute(&mut self, muted: bool) {
        self.all_muted = muted;
        let powered: Vec<(u8, u8)> = self
            .zone_ids()
            .filter(|&(c, z)| self.zone(c, z).is_some_and(|zone| zone.power()))
            .collect();
        for (c, z) in powered {
            if let Ok(zone) = self.zone_mut(c, z) {
                zone.set_mute(muted);
            }
            self.flush_zone_changes(c, z);
        }
    }

    pub fn all_muted(&self) -> bool {
        self.all_muted
    }

    /// Show a message on a zone's keypad display.
    pub fn display_message(
        &mut self,
        controller_id: u8,
        zone_id: u8,
        align: TextAlign,
        flash_time: u16,
        text: &str,
    ) -> Result<()> {
        // Validate the address even though the frame targets the keypad.
        self.zone_mut(controller_id, zone_id)?;
        self.send(cmd::display_message(controller_id, zone_id, align, flash_time, text));
        Ok(())
    }

    // ========================================================================
    // Source management and commands
    // ========================================================================

    pub fn source(&self, source_id: u8) -> Option<&Source> {
        self.sources.get(usize::from(source_id))?.as_ref()
    }

    fn source_mut(&mut self, source_id: u8) -> Result<&mut Source> {
        self.sources
            .get_mut(usize::from(source_id))
            .and_then(|slot| slot.as_mut())
            .ok_or(Error::UnknownSource(source_id))
    }

    pub fn create_source(&mut self, source_id: u8, name: &str, kind: SourceType) -> Result<()> {
        let s = usize::from(source_id);
        if self.sources.len() <= s {
            self.sources.resize_with(s + 1, || None);
        }
        if self.sources[s].is_some() {
            self.set_source_name(source_id, name)?;
            return self.set_source_type(source_id, kind);
        }
        self.sources[s] = Some(Source::new(source_id, name, kind));
        self.emit(ChangeEvent::NewSource { source_id });
        Ok(())
    }

    /// Look a source up, provisioning a generic one with a placeholder name
    /// when the device references an id nothing declared.
    fn ensure_source(&mut self, source_id: u8) {
        if self.source(source_id).is_none() {
            debug!(source_id, "auto-provisioning source reported by device");
            // create_source on a fresh slot cannot fail.
            let _ = self.create_source(source_id, &format!("Source {source_id}"), SourceType::Generic);
        }
    }

    /// Delete a source and compact trailing empty slots.
    pub fn delete_source(&mut self, source_id: u8) -> Result<()> {
        let slot = self
            .sources
            .get_mut(usize::from(source_id))
            .ok_or(Error::UnknownSource(source_id))?;
        if slot.take().is_none() {
            return Err(Error::UnknownSource(source_id));
        }
        while self.sources.last().is_some_and(|slot| slot.is_none()) {
            self.sources.pop();
        }
        self.emit(ChangeEvent::SourceDeleted { source_id });
        Ok(())
    }

    pub fn list_sources(&self) -> Vec<SourceSnapshot> {
        self.sources
            .iter()
            .flatten()
            .map(|source| SourceSnapshot {
                source_id: source.source_id(),
                name: source.name().to_owned(),
                kind: source.kind(),
                playing: source.playing(),
                title: source.title().map(str::to_owned),
                artist: source.artist().map(str::to_owned),
                artwork_url: source.artwork_url().map(str::to_owned),
            })
            .collect()
    }

    pub fn set_source_name(&mut self, source_id: u8, name: &str) -> Result<()> {
        self.source_mut(source_id)?.set_name(name);
        self.flush_source_changes(source_id);
        Ok(())
    }

    pub fn set_source_type(&mut self, source_id: u8, kind: SourceType) -> Result<()> {
        self.source_mut(source_id)?.set_kind(kind);
        self.flush_source_changes(source_id);
        Ok(())
    }

    pub fn set_source_override_name(&mut self, source_id: u8, override_name: bool) -> Result<()> {
        self.source_mut(source_id)?.set_override_name(override_name);
        self.flush_source_changes(source_id);
        Ok(())
    }

    pub fn set_descriptive_text(
        &mut self,
        source_id: u8,
        text: Option<String>,
        flash_time: u16,
    ) -> Result<()> {
        self.source_mut(source_id)?
            .set_descriptive_text(text, flash_time, Origin::Local);
        self.flush_source_changes(source_id);
        Ok(())
    }

    pub fn set_media_metadata(
        &mut self,
        source_id: u8,
        title: Option<String>,
        artist: Option<String>,
        artwork_url: Option<String>,
    ) -> Result<()> {
        self.source_mut(source_id)?
            .set_media_metadata(title, artist, artwork_url);
        self.flush_source_changes(source_id);
        Ok(())
    }

    pub fn set_media_playing(&mut self, source_id: u8, playing: bool) -> Result<()> {
        self.source_mut(source_id)?.set_media_playing(playing);
        self.flush_source_changes(source_id);
        Ok(())
    }

    pub fn source_control(&mut self, source_id: u8, op: ControlOp) -> Result<()> {
        self.source_mut(source_id)?.control(op, Origin::Local);
        self.flush_source_changes(source_id);
        Ok(())
    }

    // ========================================================================
    // Inbound path
    // ========================================================================

    /// Feed raw transport bytes through the reassembler and apply every
    /// recognized packet. Unrecognized frames are logged and dropped.
    pub fn handle_bytes(&mut self, data: &[u8]) {
        for frame in self.reassembler.extend(data) {
            match packet::classify(&frame) {
                Some(packet) => {
                    trace!(?packet, "received packet");
                    if packet.requires_handshake() {
                        // The device keeps talking without the ack.
                        trace!("packet expects a handshake acknowledgement, not sending one");
                    }
                    self.apply_packet(packet);
                }
                None => {
                    debug!(
                        message_type = frame.message_type,
                        body_len = frame.body.len(),
                        "ignoring unrecognized frame"
                    );
                }
            }
        }
    }

    fn apply_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Handshake(h) => {
                debug!(controller_id = h.controller_id, handshake_type = h.handshake_type, "handshake received");
            }
            Packet::ZoneInfo(info) => {
                let (c, z) = (info.controller_id, info.zone_id);
                self.ensure_source(info.source_id);
                let Ok(zone) = self.zone_mut(c, z) else {
                    debug!(controller_id = c, zone_id = z, "zone info for unknown zone");
                    return;
                };
                zone.set_power(info.power, Origin::Device);
                zone.set_source(info.source_id, Origin::Device);
                if let Err(e) = zone.set_volume(info.volume.min(100), Origin::Device) {
                    warn!(error = %e, "zone info volume rejected");
                }
                let params = [
                    (ExtraParam::Bass, ParamValue::Int(info.bass)),
                    (ExtraParam::Treble, ParamValue::Int(info.treble)),
                    (ExtraParam::Loudness, ParamValue::Bool(info.loudness)),
                    (ExtraParam::Balance, ParamValue::Int(info.balance)),
                    (ExtraParam::PartyMode, ParamValue::Int(info.party_mode)),
                    (ExtraParam::DoNotDisturb, ParamValue::Bool(info.do_not_disturb)),
                ];
                for (param, value) in params {
                    if let Err(e) = self
                        .zone_mut(c, z)
                        .and_then(|zone| zone.set_parameter(param, value, Origin::Device))
                    {
                        warn!(?param, error = %e, "zone info parameter rejected");
                    }
                }
                self.flush_zone_changes(c, z);
                self.emit(ChangeEvent::Update { zone: Some((c, z)) });
            }
            Packet::ZonePower(p) => {
                let (c, z) = (p.controller_id, p.zone_id);
                if let Ok(zone) = self.zone_mut(c, z) {
                    zone.set_power(p.power, Origin::Device);
                    self.flush_zone_changes(c, z);
                    // A bare power report carries no other state; pull the
                    // rest once the zone has settled.
                    self.requeries.push(Some((c, z)));
                    self.emit(ChangeEvent::Update { zone: None });
                }
            }
            Packet::ZoneSource(s) => {
                let (c, z) = (s.controller_id, s.zone_id);
                self.ensure_source(s.source_id);
                if let Ok(zone) = self.zone_mut(c, z) {
                    zone.set_source(s.source_id, Origin::Device);
                    self.flush_zone_changes(c, z);
                    self.emit(ChangeEvent::Update { zone: None });
                }
            }
            Packet::ZoneVolume(v) => {
                let (c, z) = (v.controller_id, v.zone_id);
                if let Ok(zone) = self.zone_mut(c, z) {
                    if let Err(e) = zone.set_volume(v.volume.min(100), Origin::Device) {
                        warn!(error = %e, "volume report rejected");
                    }
                    self.flush_zone_changes(c, z);
                    self.emit(ChangeEvent::Update { zone: None });
                }
            }
            Packet::ZoneParameter(p) => {
                let (c, z) = (p.controller_id, p.zone_id);
                if let Ok(zone) = self.zone_mut(c, z) {
                    if let Err(e) = zone.set_parameter(p.param, p.value, Origin::Device) {
                        warn!(param = ?p.param, error = %e, "parameter report rejected");
                    }
                    self.flush_zone_changes(c, z);
                    self.emit(ChangeEvent::Update { zone: None });
                }
            }
            Packet::KeypadEvent(k) => self.apply_keypad_event(k.controller_id, k.zone_id, k.key),
            Packet::DisplayRender(r) => {
                let (c, z) = (r.controller_id, r.zone_id);
                match r.render {
                    RenderType::SourceName => {
                        let source_id = r.high_value();
                        self.ensure_source(source_id);
                        if let Ok(zone) = self.zone_mut(c, z) {
                            zone.set_source(source_id, Origin::Device);
                            self.flush_zone_changes(c, z);
                            self.emit(ChangeEvent::Update { zone: None });
                        }
                    }
                    RenderType::Volume => {
                        if let Ok(zone) = self.zone_mut(c, z) {
                            let volume = r.low_value().saturating_mul(2).min(100);
                            if let Err(e) = zone.set_volume(volume, Origin::Device) {
                                warn!(error = %e, "display volume rejected");
                            }
                            self.flush_zone_changes(c, z);
                            self.emit(ChangeEvent::Update { zone: None });
                        }
                    }
                }
            }
        }
    }

    /// Keypad keys: power toggles the zone, transport keys are routed to the
    /// zone's current source as device-originated control.
    fn apply_keypad_event(&mut self, controller_id: u8, zone_id: u8, key: KeypadKey) {
        let Ok(zone) = self.zone_mut(controller_id, zone_id) else {
            debug!(controller_id, zone_id, ?key, "keypad event for unknown zone");
            return;
        };
        if key == KeypadKey::Power {
            let on = !zone.power();
            zone.set_power(on, Origin::Device);
            self.flush_zone_changes(controller_id, zone_id);
            self.requeries.push(Some((controller_id, zone_id)));
            return;
        }
        let Some(op) = control_op_for_key(key) else {
            debug!(?key, "unhandled keypad key");
            return;
        };
        let source_id = zone.source_id();
        self.ensure_source(source_id);
        if let Ok(source) = self.source_mut(source_id) {
            source.control(op, Origin::Device);
            self.flush_source_changes(source_id);
        }
    }

    // ========================================================================
    // Change flushing (echo suppression lives here)
    // ========================================================================

    /// Drain a zone's change buffer: local-origin changes become outbound
    /// commands, everything becomes events, names and caps are persisted.
    fn flush_zone_changes(&mut self, controller_id: u8, zone_id: u8) {
        let Ok(zone) = self.zone_mut(controller_id, zone_id) else {
            return;
        };
        let changes = zone.take_changes();
        for change in changes {
            match change {
                ZoneChange::Name(name) => {
                    self.save_zones();
                    self.emit(ChangeEvent::ZoneName { controller_id, zone_id, name });
                }
                ZoneChange::Power { on, origin } => {
                    if !origin.is_device() {
                        self.send(cmd::set_power(controller_id, zone_id, on));
                        if on {
                            self.requeries.push(Some((controller_id, zone_id)));
                        }
                    }
                    if on {
                        let source_id =
                            self.zone(controller_id, zone_id).map(|zone| zone.source_id());
                        if let Some(source_id) = source_id {
                            self.resend_source_text(source_id);
                        }
                    }
                    self.emit(ChangeEvent::Power { controller_id, zone_id, on, origin });
                }
                ZoneChange::Volume { volume, origin } => {
                    if !origin.is_device() {
                        self.send(cmd::set_volume(controller_id, zone_id, volume));
                    }
                    self.emit(ChangeEvent::Volume { controller_id, zone_id, volume, origin });
                }
                ZoneChange::MaxVolume(max_volume) => {
                    self.save_zones();
                    self.emit(ChangeEvent::MaxVolume { controller_id, zone_id, max_volume });
                }
                ZoneChange::Mute(muted) => {
                    // Mute is local bookkeeping; its volume records carry the
                    // wire traffic.
                    self.emit(ChangeEvent::Mute { controller_id, zone_id, muted });
                }
                ZoneChange::Source { source_id, origin } => {
                    self.ensure_source(source_id);
                    if !origin.is_device() {
                        self.send(cmd::set_source(controller_id, zone_id, source_id));
                    }
                    self.resend_source_text(source_id);
                    self.emit(ChangeEvent::ZoneSource { controller_id, zone_id, source_id, origin });
                }
                ZoneChange::Parameter { param, value, origin } => {
                    if !origin.is_device() {
                        self.send(cmd::set_parameter(controller_id, zone_id, param, value));
                    }
                    self.emit(ChangeEvent::Parameter { controller_id, zone_id, param, value, origin });
                }
            }
        }
    }

    /// Drain a source's change buffer.
    fn flush_source_changes(&mut self, source_id: u8) {
        let Ok(source) = self.source_mut(source_id) else {
            return;
        };
        let changes = source.take_changes();
        for change in changes {
            match change {
                SourceChange::Name { name, old_name } => {
                    if self.source(source_id).is_some_and(Source::override_name) {
                        self.send(cmd::source_descriptive_text(source_id, 0, &name));
                    }
                    self.emit(ChangeEvent::SourceName { source_id, name, old_name });
                }
                SourceChange::Kind(kind) => {
                    self.emit(ChangeEvent::SourceType { source_id, kind });
                }
                SourceChange::MediaMetadata => {
                    if let Some(source) = self.source(source_id) {
                        self.emit(ChangeEvent::MediaMetadata {
                            source_id,
                            title: source.title().map(str::to_owned),
                            artist: source.artist().map(str::to_owned),
                            artwork_url: source.artwork_url().map(str::to_owned),
                        });
                    }
                }
                SourceChange::MediaPlaying(playing) => {
                    self.emit(ChangeEvent::MediaPlaying { source_id, playing });
                }
                SourceChange::DescriptiveText { text, flash_time, origin } => {
                    if !origin.is_device() {
                        match &text {
                            Some(text) => {
                                self.send(cmd::source_descriptive_text(source_id, flash_time, text));
                            }
                            // Clearing local text falls back to the name
                            // broadcast when override is on.
                            None => self.resend_source_text(source_id),
                        }
                    }
                    self.emit(ChangeEvent::DescriptiveText { source_id, text, flash_time });
                }
                SourceChange::Control { op, origin } => {
                    self.apply_source_control(source_id, op, origin);
                }
                SourceChange::OverrideName(enabled) => {
                    if enabled {
                        self.resend_source_text(source_id);
                    }
                }
            }
        }
    }

    /// Local control of a non-network source goes out as a keypad event on a
    /// zone currently tuned to it; device-originated control already happened
    /// on the hardware side.
    fn apply_source_control(&mut self, source_id: u8, op: ControlOp, origin: Origin) {
        if origin.is_device() {
            return;
        }
        if self.source(source_id).is_some_and(|s| s.kind().network_controlled()) {
            // Network sources are driven over IP by the embedder.
            return;
        }
        let target = self
            .zone_ids()
            .find(|&(c, z)| self.zone(c, z).is_some_and(|zone| zone.source_id() == source_id));
        match target {
            Some((c, z)) => self.send(cmd::keypad_event(c, z, op.keypad_key())),
            None => debug!(source_id, ?op, "no zone tuned to source, dropping control"),
        }
    }

    /// Push a source's display text at the keypads: local descriptive text
    /// first, the source name when override is on, otherwise nothing.
    fn resend_source_text(&mut self, source_id: u8) {
        let Some(source) = self.source(source_id) else {
            return;
        };
        let frame = if let Some(text) = source.local_descriptive_text() {
            Some(cmd::source_descriptive_text(source_id, source.flash_time(), text))
        } else if source.override_name() {
            Some(cmd::source_descriptive_text(source_id, 0, source.name()))
        } else {
            None
        };
        if let Some(frame) = frame {
            self.send(frame);
        }
    }

    fn emit(&self, event: ChangeEvent) {
        // The receiver dropping just means nobody is listening.
        let _ = self.events.send(event);
    }
}

fn control_op_for_key(key: KeypadKey) -> Option<ControlOp> {
    Some(match key {
        KeypadKey::Next => ControlOp::Next,
        KeypadKey::Previous => ControlOp::Prev,
        KeypadKey::Plus => ControlOp::VolumeUp,
        KeypadKey::Minus => ControlOp::VolumeDown,
        KeypadKey::Stop => ControlOp::Stop,
        KeypadKey::Pause => ControlOp::Pause,
        KeypadKey::Play => ControlOp::Play,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStore;
    use crate::packet::MSG_EVENT;

    fn connected_controller() -> (Controller, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (mut controller, events) = Controller::new(Box::new(MemoryStore::new()));
        controller.begin_connect();
        controller.on_transport_open();
        (controller, events)
    }

    fn drain_outbound(controller: &mut Controller) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while let Some(bytes) = controller.next_outbound() {
            frames.push(bytes);
        }
        frames
    }

    fn drain_events(events: &mut mpsc::UnboundedReceiver<ChangeEvent>) -> Vec<ChangeEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Wire bytes for a device-side zone info report.
    fn zone_info_bytes(controller_id: u8, zone_id: u8, data: [u8; 11]) -> Vec<u8> {
        let mut frame = Frame::new(packet::MSG_DATA);
        frame.source_controller_id = controller_id;
        let mut body = vec![0x00];
        body.push(4);
        body.extend_from_slice(&[0x02, 0x00, zone_id, 0x07]);
        body.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 11, 0x00]);
        body.extend_from_slice(&data);
        frame.body = body;
        frame.encode()
    }

    #[test]
    fn local_commands_reach_the_wire() {
        let (mut controller, mut events) = connected_controller();
        controller.create_zone(0, 1, "Kitchen").unwrap();
        drain_outbound(&mut controller);
        drain_events(&mut events);

        controller.set_power(0, 1, true).unwrap();
        controller.set_volume(0, 1, 40).unwrap();

        let frames = drain_outbound(&mut controller);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], cmd::set_power(0, 1, true).encode());
        assert_eq!(frames[1], cmd::set_volume(0, 1, 40).encode());

        let evs = drain_events(&mut events);
        assert!(evs.contains(&ChangeEvent::Power {
            controller_id: 0,
            zone_id: 1,
            on: true,
            origin: Origin::Local,
        }));
        // Power-on schedules a follow-up state pull.
        assert_eq!(controller.take_requeries(), vec![Some((0, 1))]);
    }

    #[test]
    fn device_reports_are_not_echoed() {
        let (mut controller, mut events) = connected_controller();
        controller.create_zone(0, 1, "Kitchen").unwrap();
        drain_outbound(&mut controller);
        drain_events(&mut events);

        // Device reports volume 30 (wire 15).
        let mut frame = Frame::new(packet::MSG_DATA);
        frame.body = vec![0x00, 4, 0x02, 0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 1, 0x00, 15];
        controller.handle_bytes(&frame.encode());

        assert_eq!(controller.zone(0, 1).unwrap().volume(), 30);
        assert!(drain_outbound(&mut controller).is_empty());
        let evs = drain_events(&mut events);
        assert!(evs.contains(&ChangeEvent::Volume {
            controller_id: 0,
            zone_id: 1,
            volume: 30,
            origin: Origin::Device,
        }));
        assert!(evs.contains(&ChangeEvent::Update { zone: None }));
    }

    #[test]
    fn device_volume_above_cap_is_corrected_on_the_wire() {
        let (mut controller, _events) = connected_controller();
        controller.create_zone(0, 0, "Den").unwrap();
        controller.set_max_volume(0, 0, 50).unwrap();
        drain_outbound(&mut controller);

        // Device claims wire 40 = volume 80: clamp to 50 and push the
        // correction back out.
        let mut frame = Frame::new(packet::MSG_DATA);
        frame.body = vec![0x00, 4, 0x02, 0x00, 0x00, 0x01, 0x00, 0x00, 0x01, 0x00, 1, 0x00, 40];
        controller.handle_bytes(&frame.encode());

        assert_eq!(controller.zone(0, 0).unwrap().volume(), 50);
        let frames = drain_outbound(&mut controller);
        assert_eq!(frames, vec![cmd::set_volume(0, 0, 50).encode()]);
    }

    #[test]
    fn zone_info_snapshot_applies_end_to_end() {
        let (mut controller, mut events) = connected_controller();
        controller.create_zone(0, 0, "Living Room").unwrap();
        drain_outbound(&mut controller);
        drain_events(&mut events);

        // power on, source 2, wire volume 25, flat levels, all else off.
        let bytes = zone_info_bytes(0, 0, [1, 2, 25, 10, 10, 0, 10, 1, 0, 0, 0]);
        controller.handle_bytes(&bytes);

        let snapshot = controller.zone_snapshot(0, 0).unwrap();
        assert_eq!(snapshot.name, "Living Room");
        assert!(snapshot.power);
        assert_eq!(snapshot.volume, 50);
        assert_eq!(snapshot.source_id, 2);
        assert_eq!(snapshot.parameters[usize::from(ExtraParam::Bass.id())], ParamValue::Int(0));

        let evs = drain_events(&mut events);
        assert!(evs.contains(&ChangeEvent::Update { zone: Some((0, 0)) }));
        assert!(evs.contains(&ChangeEvent::NewSource { source_id: 2 }));
        // Everything was device-originated: nothing goes back out.
        assert!(drain_outbound(&mut controller).is_empty());
    }

    #[test]
    fn keypad_power_key_toggles_zone() {
        let (mut controller, _events) = connected_controller();
        controller.create_zone(0, 2, "Patio").unwrap();
        drain_outbound(&mut controller);

        let mut frame = Frame::new(MSG_EVENT);
        frame.source_zone_id = 2;
        frame.body = vec![2, 0x02, 0x00, 2, 0x04, 0x03, 0x6C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
        controller.handle_bytes(&frame.encode());

        assert!(controller.zone(0, 2).unwrap().power());
        // Toggle came from the device; no power command goes out.
        assert!(drain_outbound(&mut controller).is_empty());
        assert_eq!(controller.take_requeries(), vec![Some((0, 2))]);
    }

    #[test]
    fn transport_error_is_preserved_through_close() {
        let (mut controller, mut events) = connected_controller();
        drain_events(&mut events);

        controller.on_transport_error("connection reset".into());
        assert_eq!(controller.state(), ConnectionState::Error);
        // The error alone does not flip the connected flag.
        assert!(controller.connected());

        controller.on_transport_close();
        assert_eq!(controller.state(), ConnectionState::Error);
        assert!(!controller.connected());

        let evs = drain_events(&mut events);
        assert!(evs.iter().any(|e| matches!(e, ChangeEvent::Error { .. })));
        assert!(!evs.contains(&ChangeEvent::Disconnected));

        // A clean close without a prior error does disconnect.
        let (mut controller, mut events) = connected_controller();
        drain_events(&mut events);
        controller.on_transport_close();
        assert_eq!(controller.state(), ConnectionState::Disconnected);
        assert!(drain_events(&mut events).contains(&ChangeEvent::Disconnected));
    }

    #[test]
    fn sends_are_dropped_while_disconnected() {
        let (mut controller, _events) = Controller::new(Box::new(MemoryStore::new()));
        controller.create_zone(0, 0, "Office").unwrap();
        assert!(!controller.has_outbound());

        controller.set_power(0, 0, true).unwrap();
        assert!(drain_outbound(&mut controller).is_empty());
        // State still moved; only the wire write was skipped.
        assert!(controller.zone(0, 0).unwrap().power());
    }

    #[test]
    fn zone_config_round_trips_through_store() {
        let store = MemoryStore::new();
        {
            let (mut controller, _events) = Controller::new(Box::new(store.clone()));
            controller.create_zone(0, 0, "Living Room").unwrap();
            controller.create_zone(0, 2, "Kitchen").unwrap();
            controller.set_max_volume(0, 2, 70).unwrap();
        }

        let (controller, _events) = Controller::new(Box::new(store));
        assert_eq!(controller.zone(0, 0).unwrap().name(), "Living Room");
        assert!(controller.zone(0, 1).is_none());
        let kitchen = controller.zone(0, 2).unwrap();
        assert_eq!(kitchen.name(), "Kitchen");
        assert_eq!(kitchen.max_volume(), 70);
    }

    #[test]
    fn delete_compacts_trailing_slots() {
        let (mut controller, _events) = connected_controller();
        controller.create_zone(0, 0, "A").unwrap();
        controller.create_zone(0, 3, "B").unwrap();
        controller.delete_zone(0, 3).unwrap();
        assert_eq!(controller.list_zones().len(), 1);
        assert!(matches!(
            controller.delete_zone(0, 3),
            Err(Error::UnknownZone { controller_id: 0, zone_id: 3 })
        ));

        controller.create_source(4, "Tape", SourceType::Generic).unwrap();
        controller.delete_source(4).unwrap();
        assert!(controller.source(4).is_none());
        assert!(matches!(controller.delete_source(4), Err(Error::UnknownSource(4))));
    }

    #[test]
    fn set_all_power_broadcasts_once_and_schedules_requery() {
        let (mut controller, _events) = connected_controller();
        controller.create_zone(0, 0, "A").unwrap();
        controller.create_zone(0, 1, "B").unwrap();
        drain_outbound(&mut controller);
        controller.take_requeries();

        controller.set_all_power(true);
        let frames = drain_outbound(&mut controller);
        assert_eq!(frames, vec![cmd::set_all_power(true).encode()]);
        assert!(controller.zone(0, 0).unwrap().power());
        assert!(controller.zone(0, 1).unwrap().power());
        assert_eq!(controller.take_requeries(), vec![None]);
    }

    #[test]
    fn set_all_mute_targets_powered_zones() {
        let (mut controller, _events) = connected_controller();
        controller.create_zone(0, 0, "A").unwrap();
        controller.create_zone(0, 1, "B").unwrap();
        controller.set_power(0, 0, true).unwrap();
        controller.set_volume(0, 0, 40).unwrap();
        drain_outbound(&mut controller);

        controller.set_all_mute(true);
        assert!(controller.all_muted());
        assert!(controller.zone(0, 0).unwrap().muted());
        assert!(!controller.zone(0, 1).unwrap().muted());
        // The mute rides the wire as a volume-zero command.
        let frames = drain_outbound(&mut controller);
        assert_eq!(frames, vec![cmd::set_volume(0, 0, 0).encode()]);
    }

    #[test]
    fn local_source_text_reaches_keypads_and_resends_on_power_on() {
        let (mut controller, _events) = connected_controller();
        controller.create_zone(0, 0, "Den").unwrap();
        controller.create_source(1, "Tuner", SourceType::Generic).unwrap();
        controller.set_zone_source(0, 0, 1).unwrap();
        drain_outbound(&mut controller);

        controller.set_descriptive_text(1, Some("98.5 FM".into()), 10).unwrap();
        let frames = drain_outbound(&mut controller);
        assert_eq!(frames, vec![cmd::source_descriptive_text(1, 10, "98.5 FM").encode()]);

        // Power-on re-sends the text after the power command.
        controller.set_power(0, 0, true).unwrap();
        let frames = drain_outbound(&mut controller);
        assert_eq!(
            frames,
            vec![
                cmd::set_power(0, 0, true).encode(),
                cmd::source_descriptive_text(1, 10, "98.5 FM").encode(),
            ]
        );
    }

    #[test]
    fn override_name_broadcasts_source_name() {
        let (mut controller, _events) = connected_controller();
        controller.create_source(3, "Turntable", SourceType::Generic).unwrap();
        drain_outbound(&mut controller);

        controller.set_source_override_name(3, true).unwrap();
        let frames = drain_outbound(&mut controller);
        assert_eq!(frames, vec![cmd::source_descriptive_text(3, 0, "Turntable").encode()]);

        // Renames keep the keypads current while override is on.
        controller.set_source_name(3, "Vinyl").unwrap();
        let frames = drain_outbound(&mut controller);
        assert_eq!(frames, vec![cmd::source_descriptive_text(3, 0, "Vinyl").encode()]);
    }

    #[test]
    fn network_sources_never_emit_keypad_control() {
        let (mut controller, _events) = connected_controller();
        controller.create_zone(0, 0, "Den").unwrap();
        controller.create_source(1, "Cast", SourceType::GoogleCast).unwrap();
        controller.create_source(2, "CD", SourceType::Generic).unwrap();
        controller.set_zone_source(0, 0, 2).unwrap();
        drain_outbound(&mut controller);

        controller.source_control(1, ControlOp::Play).unwrap();
        assert!(drain_outbound(&mut controller).is_empty());

        controller.source_control(2, ControlOp::Next).unwrap();
        let frames = drain_outbound(&mut controller);
        assert_eq!(frames, vec![cmd::keypad_event(0, 0, KeypadKey::Next).encode()]);
    }
}
