//! The nine auxiliary per-zone parameters.
//!
//! Each parameter has a wire id (0-8), a legal range, and its own wire
//! encoding: the signed levels ride the wire with a +10 offset, turn-on
//! volume at half scale, the two mode selectors pass through, and the rest
//! are booleans.

/// Auxiliary zone parameter, discriminant = wire id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExtraParam {
    /// Bass level, -10..=10.
    Bass = 0,
    /// Treble level, -10..=10.
    Treble = 1,
    /// Loudness compensation on/off.
    Loudness = 2,
    /// Left/right balance, -10..=10.
    Balance = 3,
    /// Volume applied when the zone powers on, 0..=100.
    TurnOnVolume = 4,
    /// Keypad backlight color selector, 0..=2.
    BackgroundColor = 5,
    /// Do-not-disturb on/off.
    DoNotDisturb = 6,
    /// Party mode selector, 0..=2.
    PartyMode = 7,
    /// Front AV input enable on/off.
    FrontAvEnable = 8,
}

/// Value of an auxiliary parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamValue {
    Int(i16),
    Bool(bool),
}

impl ExtraParam {
    pub const ALL: [ExtraParam; 9] = [
        ExtraParam::Bass,
        ExtraParam::Treble,
        ExtraParam::Loudness,
        ExtraParam::Balance,
        ExtraParam::TurnOnVolume,
        ExtraParam::BackgroundColor,
        ExtraParam::DoNotDisturb,
        ExtraParam::PartyMode,
        ExtraParam::FrontAvEnable,
    ];

    /// Parameter for a wire id, `None` for ids outside 0-8.
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    /// Wire id of this parameter.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Initial value for a freshly created zone.
    pub fn default_value(self) -> ParamValue {
        match self {
            ExtraParam::Loudness | ExtraParam::DoNotDisturb | ExtraParam::FrontAvEnable => {
                ParamValue::Bool(false)
            }
            _ => ParamValue::Int(0),
        }
    }

    /// Whether `value` is the right shape and inside this parameter's range.
    pub fn validate(self, value: ParamValue) -> bool {
        match (self, value) {
            (ExtraParam::Bass | ExtraParam::Treble | ExtraParam::Balance, ParamValue::Int(v)) => {
                (-10..=10).contains(&v)
            }
            (ExtraParam::TurnOnVolume, ParamValue::Int(v)) => (0..=100).contains(&v),
            (ExtraParam::BackgroundColor | ExtraParam::PartyMode, ParamValue::Int(v)) => {
                (0..=2).contains(&v)
            }
            (
                ExtraParam::Loudness | ExtraParam::DoNotDisturb | ExtraParam::FrontAvEnable,
                ParamValue::Bool(_),
            ) => true,
            _ => false,
        }
    }

    /// Decode the single data byte of a parameter report.
    pub fn decode_wire(self, byte: u8) -> ParamValue {
        match self {
            ExtraParam::Bass | ExtraParam::Treble | ExtraParam::Balance => {
                ParamValue::Int(i16::from(byte) - 10)
            }
            ExtraParam::TurnOnVolume => ParamValue::Int(i16::from(byte) * 2),
            ExtraParam::BackgroundColor | ExtraParam::PartyMode => ParamValue::Int(i16::from(byte)),
            _ => ParamValue::Bool(byte == 0x01),
        }
    }

    /// Encode a (validated) value into its wire byte.
    pub fn encode_wire(self, value: ParamValue) -> u8 {
        match (self, value) {
            (ExtraParam::Bass | ExtraParam::Treble | ExtraParam::Balance, ParamValue::Int(v)) => {
                (v + 10) as u8
            }
            (ExtraParam::TurnOnVolume, ParamValue::Int(v)) => (v / 2) as u8,
            (ExtraParam::BackgroundColor | ExtraParam::PartyMode, ParamValue::Int(v)) => v as u8,
            (_, ParamValue::Bool(b)) => u8::from(b),
            // Mistyped values are rejected by validate() before encoding.
            (_, ParamValue::Int(_)) => 0,
        }
    }
}
