//! Async bridge runner.
//!
//! [`Bridge::run`] is a single task owning the [`Controller`] and the
//! transport, driven by one `select!` loop: transport events in, paced frames
//! out, commands from any number of [`BridgeHandle`] clones, plus the
//! deferred requery timers and the optional auto-update sweep. All timers
//! re-check the connected flag when they fire, so a timer outliving the
//! connection is a no-op rather than a bug.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior, Sleep};
use tracing::{debug, info};

use crate::config::ZoneStore;
use crate::controller::{Controller, SourceSnapshot, ZoneSnapshot};
use crate::event::ChangeEvent;
use crate::packet::TextAlign;
use crate::param::{ExtraParam, ParamValue};
use crate::source::{ControlOp, SourceType};
use crate::transport::{TransportEvent, TransportLink};
use crate::{Error, Result};

/// Minimum spacing between outbound frames. The hardware drops frames that
/// arrive faster than it can parse them.
pub const SEND_INTERVAL: Duration = Duration::from_millis(200);
/// Spacing of the optional full zone-info sweep.
pub const AUTO_UPDATE_INTERVAL: Duration = Duration::from_secs(30);
/// Delay before the post-power-on zone-info requery.
pub const REQUERY_DELAY: Duration = Duration::from_secs(1);

/// One request from a handle to the runner.
#[derive(Debug)]
pub enum BridgeCommand {
    CreateZone {
        controller_id: u8,
        zone_id: u8,
        name: String,
        reply: oneshot::Sender<Result<()>>,
    },
    DeleteZone {
        controller_id: u8,
        zone_id: u8,
        reply: oneshot::Sender<Result<()>>,
    },
    SetZoneName {
        controller_id: u8,
        zone_id: u8,
        name: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SetPower {
        controller_id: u8,
        zone_id: u8,
        on: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    SetVolume {
        controller_id: u8,
        zone_id: u8,
        volume: u8,
        reply: oneshot::Sender<Result<()>>,
    },
    SetMaxVolume {
        controller_id: u8,
        zone_id: u8,
        max_volume: u8,
        reply: oneshot::Sender<Result<()>>,
    },
    SetMute {
        controller_id: u8,
        zone_id: u8,
        muted: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    SetZoneSource {
        controller_id: u8,
        zone_id: u8,
        source_id: u8,
        reply: oneshot::Sender<Result<()>>,
    },
    SetParameter {
        controller_id: u8,
        zone_id: u8,
        param: ExtraParam,
        value: ParamValue,
        reply: oneshot::Sender<Result<()>>,
    },
    DisplayMessage {
        controller_id: u8,
        zone_id: u8,
        align: TextAlign,
        flash_time: u16,
        text: String,
        reply: oneshot::Sender<Result<()>>,
    },
    CreateSource {
        source_id: u8,
        name: String,
        kind: SourceType,
        reply: oneshot::Sender<Result<()>>,
    },
    DeleteSource {
        source_id: u8,
        reply: oneshot::Sender<Result<()>>,
    },
    SetSourceName {
        source_id: u8,
        name: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SetSourceType {
        source_id: u8,
        kind: SourceType,
        reply: oneshot::Sender<Result<()>>,
    },
    SetSourceOverrideName {
        source_id: u8,
        override_name: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    SetDescriptiveText {
        source_id: u8,
        text: Option<String>,
        flash_time: u16,
        reply: oneshot::Sender<Result<()>>,
    },
    SetMediaMetadata {
        source_id: u8,
        title: Option<String>,
        artist: Option<String>,
        artwork_url: Option<String>,
        reply: oneshot::Sender<Result<()>>,
    },
    SetMediaPlaying {
        source_id: u8,
        playing: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    SourceControl {
        source_id: u8,
        op: ControlOp,
        reply: oneshot::Sender<Result<()>>,
    },
    SetAllPower {
        on: bool,
    },
    SetAllMute {
        muted: bool,
    },
    SetAutoUpdate {
        enabled: bool,
    },
    GetZone {
        controller_id: u8,
        zone_id: u8,
        reply: oneshot::Sender<Option<ZoneSnapshot>>,
    },
    FindZoneByName {
        name: String,
        reply: oneshot::Sender<Option<(u8, u8)>>,
    },
    ListZones {
        reply: oneshot::Sender<Vec<ZoneSnapshot>>,
    },
    ListSources {
        reply: oneshot::Sender<Vec<SourceSnapshot>>,
    },
    Disconnect,
}

/// Cloneable client of a running bridge.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    tx: mpsc::UnboundedSender<BridgeCommand>,
}

impl BridgeHandle {
    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<()>>) -> BridgeCommand,
    ) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(make(tx)).map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    async fn query<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> BridgeCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(make(tx)).map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)
    }

    fn fire(&self, command: BridgeCommand) -> Result<()> {
        self.tx.send(command).map_err(|_| Error::ConnectionClosed)
    }

    pub async fn create_zone(&self, controller_id: u8, zone_id: u8, name: &str) -> Result<()> {
        let name = name.to_owned();
        self.request(|reply| BridgeCommand::CreateZone { controller_id, zone_id, name, reply })
            .await
    }

    pub async fn delete_zone(&self, controller_id: u8, zone_id: u8) -> Result<()> {
        self.request(|reply| BridgeCommand::DeleteZone { controller_id, zone_id, reply })
            .await
    }

    pub async fn set_zone_name(&self, controller_id: u8, zone_id: u8, name: &str) -> Result<()> {
        let name = name.to_owned();
        self.request(|reply| BridgeCommand::SetZoneName { controller_id, zone_id, name, reply })
            .await
    }

    pub async fn set_power(&self, controller_id: u8, zone_id: u8, on: bool) -> Result<()> {
        self.request(|reply| BridgeCommand::SetPower { controller_id, zone_id, on, reply })
            .await
    }

    pub async fn set_volume(&self, controller_id: u8, zone_id: u8, volume: u8) -> Result<()> {
        self.request(|reply| BridgeCommand::SetVolume { controller_id, zone_id, volume, reply })
            .await
    }

    pub async fn set_max_volume(
        &self,
        controller_id: u8,
        zone_id: u8,
        max_volume: u8,
    ) -> Result<()> {
        self.request(|reply| BridgeCommand::SetMaxVolume { controller_id, zone_id, max_volume, reply })
            .await
    }

    pub async fn set_mute(&self, controller_id: u8, zone_id: u8, muted: bool) -> Result<()> {
        self.request(|reply| BridgeCommand::SetMute { controller_id, zone_id, muted, reply })
            .await
    }

    pub async fn set_zone_source(
        &self,
        controller_id: u8,
        zone_id: u8,
        source_id: u8,
    ) -> Result<()> {
        self.request(|reply| BridgeCommand::SetZoneSource { controller_id, zone_id, source_id, reply })
            .await
    }

    pub async fn set_parameter(
        &self,
        controller_id: u8,
        zone_id: u8,
        param: ExtraParam,
        value: ParamValue,
    ) -> Result<()> {
        self.request(|reply| BridgeCommand::SetParameter { controller_id, zone_id, param, value, reply })
            .await
    }

    pub async fn display_message(
        &self,
        controller_id: u8,
        zone_id: u8,
        align: TextAlign,
        flash_time: u16,
        text: &str,
    ) -> Result<()> {
        let text = text.to_owned();
        self.request(|reply| BridgeCommand::DisplayMessage {
            controller_id,
            zone_id,
            align,
            flash_time,
            text,
            reply,
        })
        .await
    }

    pub async fn create_source(&self, source_id: u8, name: &str, kind: SourceType) -> Result<()> {
        let name = name.to_owned();
        self.request(|reply| BridgeCommand::CreateSource { source_id, name, kind, reply })
            .await
    }

    pub async fn delete_source(&self, source_id: u8) -> Result<()> {
        self.request(|reply| BridgeCommand::DeleteSource { source_id, reply })
            .await
    }

    pub async fn set_source_name(&self, source_id: u8, name: &str) -> Result<()> {
        let name = name.to_owned();
        self.request(|reply| BridgeCommand::SetSourceName { source_id, name, reply })
            .await
    }

    pub async fn set_source_type(&self, source_id: u8, kind: SourceType) -> Result<()> {
        self.request(|reply| BridgeCommand::SetSourceType { source_id, kind, reply })
            .await
    }

    pub async fn set_source_override_name(&self, source_id: u8, override_name: bool) -> Result<()> {
        self.request(|reply| BridgeCommand::SetSourceOverrideName { source_id, override_name, reply })
            .await
    }

    pub async fn set_descriptive_text(
        &self,
        source_id: u8,
        text: Option<String>,
        flash_time: u16,
    ) -> Result<()> {
        self.request(|reply| BridgeCommand::SetDescriptiveText { source_id, text, flash_time, reply })
            .await
    }

    pub async fn set_media_metadata(
        &self,
        source_id: u8,
        title: Option<String>,
        artist: Option<String>,
        artwork_url: Option<String>,
    ) -> Result<()> {
        self.request(|reply| BridgeCommand::SetMediaMetadata {
            source_id,
            title,
            artist,
            artwork_url,
            reply,
        })
        .await
    }

    pub async fn set_media_playing(&self, source_id: u8, playing: bool) -> Result<()> {
        self.request(|reply| BridgeCommand::SetMediaPlaying { source_id, playing, reply })
            .await
    }

    pub async fn source_control(&self, source_id: u8, op: ControlOp) -> Result<()> {
        self.request(|reply| BridgeCommand::SourceControl { source_id, op, reply })
            .await
    }

    pub fn set_all_power(&self, on: bool) -> Result<()> {
        self.fire(BridgeCommand::SetAllPower { on })
    }

    pub fn set_all_mute(&self, muted: bool) -> Result<()> {
        self.fire(BridgeCommand::SetAllMute { muted })
    }

    pub fn set_auto_update(&self, enabled: bool) -> Result<()> {
        self.fire(BridgeCommand::SetAutoUpdate { enabled })
    }

    /// Stop the runner. Pending queue contents are dropped.
    pub fn disconnect(&self) -> Result<()> {
        self.fire(BridgeCommand::Disconnect)
    }

    pub async fn zone(&self, controller_id: u8, zone_id: u8) -> Result<Option<ZoneSnapshot>> {
        self.query(|reply| BridgeCommand::GetZone { controller_id, zone_id, reply })
            .await
    }

    pub async fn find_zone_by_name(&self, name: &str) -> Result<Option<(u8, u8)>> {
        let name = name.to_owned();
        self.query(|reply| BridgeCommand::FindZoneByName { name, reply }).await
    }

    pub async fn list_zones(&self) -> Result<Vec<ZoneSnapshot>> {
        self.query(|reply| BridgeCommand::ListZones { reply }).await
    }

    pub async fn list_sources(&self) -> Result<Vec<SourceSnapshot>> {
        self.query(|reply| BridgeCommand::ListSources { reply }).await
    }
}

/// The runner. Construct with [`Bridge::new`], then spawn [`Bridge::run`].
pub struct Bridge {
    controller: Controller,
    link: TransportLink,
    command_rx: mpsc::UnboundedReceiver<BridgeCommand>,
    /// In-flight pacing sleep; `None` means the next frame may go now.
    pacing: Option<Pin<Box<Sleep>>>,
    /// Deferred zone-info requeries: fire-at instant plus target
    /// (`None` = all zones).
    requeries: Vec<(Instant, Option<(u8, u8)>)>,
    transport_gone: bool,
}

impl Bridge {
    pub fn new(
        link: TransportLink,
        store: Box<dyn ZoneStore>,
    ) -> (Self, BridgeHandle, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (mut controller, events) = Controller::new(store);
        controller.begin_connect();
        let (tx, command_rx) = mpsc::unbounded_channel();
        let bridge = Self {
            controller,
            link,
            command_rx,
            pacing: None,
            requeries: Vec::new(),
            transport_gone: false,
        };
        (bridge, BridgeHandle { tx }, events)
    }

    pub async fn run(mut self) {
        let mut auto_update = time::interval_at(
            Instant::now() + AUTO_UPDATE_INTERVAL,
            AUTO_UPDATE_INTERVAL,
        );
        auto_update.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            self.pump_outbound().await;
            let next_requery = self.requeries.iter().map(|&(at, _)| at).min();

            tokio::select! {
                _ = armed_sleep(&mut self.pacing) => {
                    self.pacing = None;
                }
                event = self.link.rx.recv(), if !self.transport_gone => match event {
                    Some(TransportEvent::Opened) => self.controller.on_transport_open(),
                    Some(TransportEvent::Data(data)) => self.controller.handle_bytes(&data),
                    Some(TransportEvent::Error(message)) => {
                        self.controller.on_transport_error(message);
                    }
                    Some(TransportEvent::Closed) => self.controller.on_transport_close(),
                    None => {
                        self.transport_gone = true;
                        self.controller.on_transport_close();
                    }
                },
                command = self.command_rx.recv() => match command {
                    Some(command) => {
                        if self.apply_command(command) {
                            break;
                        }
                    }
                    // Every handle dropped: nothing can reach us anymore.
                    None => break,
                },
                _ = auto_update.tick() => {
                    if self.controller.auto_update() && self.controller.connected() {
                        debug!("auto update sweep");
                        self.controller.request_update(None);
                    }
                }
                _ = sleep_until_opt(next_requery) => self.fire_due_requeries(),
            }

            self.collect_requeries();
        }
        debug!("bridge runner stopped");
    }

    /// Send at most one queued frame, then arm the pacing sleep.
    async fn pump_outbound(&mut self) {
        if self.pacing.is_some() {
            return;
        }
        let Some(bytes) = self.controller.next_outbound() else {
            return;
        };
        if self.link.tx.send(bytes).await.is_err() {
            debug!("transport writer gone, dropping frame");
        }
        self.pacing = Some(Box::pin(time::sleep(SEND_INTERVAL)));
    }

    fn collect_requeries(&mut self) {
        for zone in self.controller.take_requeries() {
            self.requeries.push((Instant::now() + REQUERY_DELAY, zone));
        }
    }

    fn fire_due_requeries(&mut self) {
        let now = Instant::now();
        let mut due = Vec::new();
        self.requeries.retain(|&(at, zone)| {
            if at <= now {
                due.push(zone);
                false
            } else {
                true
            }
        });
        for zone in due {
            if self.controller.connected() {
                self.controller.request_update(zone);
            }
        }
    }

    /// Apply one command; returns true when the runner should stop.
    fn apply_command(&mut self, command: BridgeCommand) -> bool {
        match command {
            BridgeCommand::CreateZone { controller_id, zone_id, name, reply } => {
                let _ = reply.send(self.controller.create_zone(controller_id, zone_id, &name));
            }
            BridgeCommand::DeleteZone { controller_id, zone_id, reply } => {
                let _ = reply.send(self.controller.delete_zone(controller_id, zone_id));
            }
            BridgeCommand::SetZoneName { controller_id, zone_id, name, reply } => {
                let _ = reply.send(self.controller.set_zone_name(controller_id, zone_id, &name));
            }
            BridgeCommand::SetPower { controller_id, zone_id, on, reply } => {
                let _ = reply.send(self.controller.set_power(controller_id, zone_id, on));
            }
            BridgeCommand::SetVolume { controller_id, zone_id, volume, reply } => {
                let _ = reply.send(self.controller.set_volume(controller_id, zone_id, volume));
            }
            BridgeCommand::SetMaxVolume { controller_id, zone_id, max_volume, reply } => {
                let _ = reply.send(self.controller.set_max_volume(controller_id, zone_id, max_volume));
            }
            BridgeCommand::SetMute { controller_id, zone_id, muted, reply } => {
                let _ = reply.send(self.controller.set_mute(controller_id, zone_id, muted));
            }
            BridgeCommand::SetZoneSource { controller_id, zone_id, source_id, reply } => {
                let _ = reply.send(self.controller.set_zone_source(controller_id, zone_id, source_id));
            }
            BridgeCommand::SetParameter { controller_id, zone_id, param, value, reply } => {
                let _ = reply.send(self.controller.set_parameter(controller_id, zone_id, param, value));
            }
            BridgeCommand::DisplayMessage { controller_id, zone_id, align, flash_time, text, reply } => {
                let _ = reply.send(self.controller.display_message(
                    controller_id,
                    zone_id,
                    align,
                    flash_time,
                    &text,
                ));
            }
            BridgeCommand::CreateSource { source_id, name, kind, reply } => {
                let _ = reply.send(self.controller.create_source(source_id, &name, kind));
            }
            BridgeCommand::DeleteSource { source_id, reply } => {
                let _ = reply.send(self.controller.delete_source(source_id));
            }
            BridgeCommand::SetSourceName { source_id, name, reply } => {
                let _ = reply.send(self.controller.set_source_name(source_id, &name));
            }
            BridgeCommand::SetSourceType { source_id, kind, reply } => {
                let _ = reply.send(self.controller.set_source_type(source_id, kind));
            }
            BridgeCommand::SetSourceOverrideName { source_id, override_name, reply } => {
                let _ = reply.send(self.controller.set_source_override_name(source_id, override_name));
            }
            BridgeCommand::SetDescriptiveText { source_id, text, flash_time, reply } => {
                let _ = reply.send(self.controller.set_descriptive_text(source_id, text, flash_time));
            }
            BridgeCommand::SetMediaMetadata { source_id, title, artist, artwork_url, reply } => {
                let _ = reply.send(self.controller.set_media_metadata(source_id, title, artist, artwork_url));
            }
            BridgeCommand::SetMediaPlaying { source_id, playing, reply } => {
                let _ = reply.send(self.controller.set_media_playing(source_id, playing));
            }
            BridgeCommand::SourceControl { source_id, op, reply } => {
                let _ = reply.send(self.controller.source_control(source_id, op));
            }
            BridgeCommand::SetAllPower { on } => self.controller.set_all_power(on),
            BridgeCommand::SetAllMute { muted } => self.controller.set_all_mute(muted),
            BridgeCommand::SetAutoUpdate { enabled } => self.controller.set_auto_update(enabled),
            BridgeCommand::GetZone { controller_id, zone_id, reply } => {
                let _ = reply.send(self.controller.zone_snapshot(controller_id, zone_id));
            }
            BridgeCommand::FindZoneByName { name, reply } => {
                let _ = reply.send(self.controller.find_zone_by_name(&name));
            }
            BridgeCommand::ListZones { reply } => {
                let _ = reply.send(self.controller.list_zones());
            }
            BridgeCommand::ListSources { reply } => {
                let _ = reply.send(self.controller.list_sources());
            }
            BridgeCommand::Disconnect => {
                info!("disconnect requested");
                self.controller.on_transport_close();
                return true;
            }
        }
        false
    }
}

/// Await the armed pacing sleep, or hang forever when none is armed.
async fn armed_sleep(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStore;
    use crate::packet::cmd;

    async fn started_bridge() -> (
        BridgeHandle,
        mpsc::UnboundedReceiver<ChangeEvent>,
        mpsc::Sender<TransportEvent>,
        mpsc::Receiver<Vec<u8>>,
    ) {
        let (link, event_tx, wire) = TransportLink::pair();
        let (bridge, handle, mut events) = Bridge::new(link, Box::new(MemoryStore::new()));
        tokio::spawn(bridge.run());

        event_tx.send(TransportEvent::Opened).await.unwrap();
        // Wait for the runner to acknowledge the connection before issuing
        // commands, so nothing races the Opened event.
        loop {
            match events.recv().await {
                Some(ChangeEvent::Connected) => break,
                Some(_) => continue,
                None => panic!("runner stopped before connecting"),
            }
        }
        (handle, events, event_tx, wire)
    }

    #[tokio::test(start_paused = true)]
    async fn outbound_frames_are_paced() {
        let (handle, _events, _event_tx, mut wire) = started_bridge().await;
        let start = Instant::now();

        handle.create_zone(0, 0, "Den").await.unwrap();
        handle
            .set_parameter(0, 0, ExtraParam::Bass, ParamValue::Int(5))
            .await
            .unwrap();
        handle
            .set_parameter(0, 0, ExtraParam::Treble, ParamValue::Int(-5))
            .await
            .unwrap();

        assert_eq!(wire.recv().await.unwrap(), cmd::request_zone_info(0, 0).encode());
        assert!(start.elapsed() < SEND_INTERVAL);

        assert_eq!(
            wire.recv().await.unwrap(),
            cmd::set_parameter(0, 0, ExtraParam::Bass, ParamValue::Int(5)).encode()
        );
        assert!(start.elapsed() >= SEND_INTERVAL);
        assert!(start.elapsed() < SEND_INTERVAL * 2);

        assert_eq!(
            wire.recv().await.unwrap(),
            cmd::set_parameter(0, 0, ExtraParam::Treble, ParamValue::Int(-5)).encode()
        );
        assert!(start.elapsed() >= SEND_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn power_on_requeries_after_delay() {
        let (handle, _events, _event_tx, mut wire) = started_bridge().await;
        handle.create_zone(0, 0, "Den").await.unwrap();
        assert_eq!(wire.recv().await.unwrap(), cmd::request_zone_info(0, 0).encode());

        let start = Instant::now();
        handle.set_power(0, 0, true).await.unwrap();
        assert_eq!(wire.recv().await.unwrap(), cmd::set_power(0, 0, true).encode());
        assert!(start.elapsed() < REQUERY_DELAY);

        // The deferred state pull fires once the zone has settled.
        assert_eq!(wire.recv().await.unwrap(), cmd::request_zone_info(0, 0).encode());
        assert!(start.elapsed() >= REQUERY_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_update_sweeps_on_interval() {
        let (handle, _events, _event_tx, mut wire) = started_bridge().await;
        handle.create_zone(0, 0, "Den").await.unwrap();
        assert_eq!(wire.recv().await.unwrap(), cmd::request_zone_info(0, 0).encode());

        let start = Instant::now();
        handle.set_auto_update(true).unwrap();
        assert_eq!(wire.recv().await.unwrap(), cmd::request_zone_info(0, 0).encode());
        assert!(start.elapsed() >= AUTO_UPDATE_INTERVAL - SEND_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_transport_drops_sends() {
        let (handle, mut events, event_tx, mut wire) = started_bridge().await;
        handle.create_zone(0, 0, "Den").await.unwrap();
        assert_eq!(wire.recv().await.unwrap(), cmd::request_zone_info(0, 0).encode());

        event_tx.send(TransportEvent::Closed).await.unwrap();
        loop {
            match events.recv().await {
                Some(ChangeEvent::Disconnected) => break,
                Some(_) => continue,
                None => panic!("runner stopped unexpectedly"),
            }
        }

        // State still moves, but nothing reaches the wire.
        handle.set_power(0, 0, true).await.unwrap();
        let zone = handle.zone(0, 0).await.unwrap().unwrap();
        assert!(zone.power);

        time::sleep(Duration::from_secs(2)).await;
        assert!(wire.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_stops_the_runner() {
        let (handle, _events, _event_tx, mut wire) = started_bridge().await;
        handle.create_zone(0, 0, "Den").await.unwrap();
        assert_eq!(wire.recv().await.unwrap(), cmd::request_zone_info(0, 0).encode());

        handle.disconnect().unwrap();
        assert!(matches!(
            handle.set_power(0, 0, true).await,
            Err(Error::ConnectionClosed)
        ));
    }
}
