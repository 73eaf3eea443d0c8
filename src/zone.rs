//! Per-zone state machine.
//!
//! A `Zone` is a plain state container with validated compare-and-set
//! mutators. It never talks to the wire: each accepted mutation is recorded
//! as a [`ZoneChange`] carrying its [`Origin`], and the controller drains the
//! buffer to decide what becomes an outbound command, an event, or a
//! persistence write.
//!
//! Mute is local bookkeeping. The hardware has no mute concept; muting
//! snapshots the volume and drives it to zero through an internal path that
//! skips the usual mute-clearing side effect of a volume change.

use crate::config::DEFAULT_MAX_VOLUME;
use crate::event::Origin;
use crate::param::{ExtraParam, ParamValue};
use crate::{Error, Result};

/// One accepted zone mutation, drained by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneChange {
    Name(String),
    Power { on: bool, origin: Origin },
    Volume { volume: u8, origin: Origin },
    MaxVolume(u8),
    Mute(bool),
    Source { source_id: u8, origin: Origin },
    Parameter {
        param: ExtraParam,
        value: ParamValue,
        origin: Origin,
    },
}

#[derive(Debug)]
pub struct Zone {
    controller_id: u8,
    zone_id: u8,
    name: String,
    power: bool,
    volume: u8,
    max_volume: u8,
    muted: bool,
    pre_mute_volume: u8,
    source_id: u8,
    parameters: [ParamValue; 9],
    changes: Vec<ZoneChange>,
}

impl Zone {
    pub fn new(controller_id: u8, zone_id: u8) -> Self {
        let mut parameters = [ParamValue::Int(0); 9];
        for param in ExtraParam::ALL {
            parameters[usize::from(param.id())] = param.default_value();
        }
        Self {
            controller_id,
            zone_id,
            name: String::new(),
            power: false,
            volume: 0,
            max_volume: DEFAULT_MAX_VOLUME,
            muted: false,
            pre_mute_volume: 0,
            source_id: 0,
            parameters,
            changes: Vec::new(),
        }
    }

    pub fn controller_id(&self) -> u8 {
        self.controller_id
    }

    pub fn zone_id(&self) -> u8 {
        self.zone_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn power(&self) -> bool {
        self.power
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn max_volume(&self) -> u8 {
        self.max_volume
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn source_id(&self) -> u8 {
        self.source_id
    }

    pub fn parameter(&self, param: ExtraParam) -> ParamValue {
        self.parameters[usize::from(param.id())]
    }

    /// Drain the buffered change records.
    pub fn take_changes(&mut self) -> Vec<ZoneChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.changes.push(ZoneChange::Name(self.name.clone()));
    }

    /// Flip zone power. Any flip on a muted zone clears mute without
    /// restoring the pre-mute volume.
    pub fn set_power(&mut self, on: bool, origin: Origin) {
        if self.power == on {
            return;
        }
        if self.muted {
            self.muted = false;
            self.changes.push(ZoneChange::Mute(false));
        }
        self.power = on;
        self.changes.push(ZoneChange::Power { on, origin });
    }

    pub fn set_volume(&mut self, volume: u8, origin: Origin) -> Result<()> {
        if volume > 100 {
            return Err(Error::InvalidVolume(volume));
        }
        self.apply_volume(volume, origin, false);
        Ok(())
    }

    /// Core volume path. A change clears mute unless it *is* the mute
    /// (`for_mute`); a value over the cap is clamped, and the clamped write
    /// is forced to local origin so the correction reaches the hardware.
    fn apply_volume(&mut self, requested: u8, origin: Origin, for_mute: bool) {
        if self.volume == requested {
            return;
        }
        if self.muted && !for_mute {
            self.muted = false;
            self.changes.push(ZoneChange::Mute(false));
        }
        let (volume, origin) = if requested > self.max_volume {
            (self.max_volume, Origin::Local)
        } else {
            (requested, origin)
        };
        if volume != self.volume {
            self.volume = volume;
            self.changes.push(ZoneChange::Volume { volume, origin });
        }
    }

    /// Set the volume cap, re-clamping the current (and pre-mute) volume.
    pub fn set_max_volume(&mut self, max_volume: u8) -> Result<()> {
        if max_volume > 100 {
            return Err(Error::InvalidVolume(max_volume));
        }
        if self.max_volume == max_volume {
            return Ok(());
        }
        self.max_volume = max_volume;
        self.changes.push(ZoneChange::MaxVolume(max_volume));
        self.pre_mute_volume = self.pre_mute_volume.min(max_volume);
        if self.volume > max_volume {
            self.apply_volume(max_volume, Origin::Local, self.muted);
        }
        Ok(())
    }

    /// Mute snapshots the volume and drives it to zero; unmute restores the
    /// snapshot. Both go through the internal volume path.
    pub fn set_mute(&mut self, muted: bool) {
        if self.muted == muted {
            return;
        }
        if muted {
            self.pre_mute_volume = self.volume;
            self.muted = true;
            self.apply_volume(0, Origin::Local, true);
        } else {
            self.muted = false;
            self.apply_volume(self.pre_mute_volume, Origin::Local, true);
        }
        self.changes.push(ZoneChange::Mute(muted));
    }

    pub fn set_source(&mut self, source_id: u8, origin: Origin) {
        if self.source_id == source_id {
            return;
        }
        self.source_id = source_id;
        self.changes.push(ZoneChange::Source { source_id, origin });
    }

    /// Set an auxiliary parameter. Out-of-range or mistyped values are
    /// rejected whole: no state change, no record.
    pub fn set_parameter(
        &mut self,
        param: ExtraParam,
        value: ParamValue,
        origin: Origin,
    ) -> Result<()> {
        if !param.validate(value) {
            return Err(Error::InvalidParameter(param));
        }
        let slot = &mut self.parameters[usize::from(param.id())];
        if *slot == value {
            return Ok(());
        }
        *slot = value;
        self.changes.push(ZoneChange::Parameter { param, value, origin });
        Ok(())
    }
}
