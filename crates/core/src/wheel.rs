//! Wheel command encoding and status decoding.
//!
//! Every command rides report 0x10 as a fixed 6-byte frame
//! `[leading, 0x80, 0x56, opcode, p1, p2]`. The leading byte comes from
//! the protocol variant established at open time. Discovered opcodes
//! (before the permanence bit):
//!
//! | opcode | meaning                                          |
//! |--------|--------------------------------------------------|
//! | 1      | free spinning                                    |
//! | 2      | click-to-click                                   |
//! | 3      | free spinning once the wheel moves (soft)        |
//! | 4      | click-to-click once the wheel moves (soft)       |
//! | 5      | click-to-click, free above given rotation speeds |
//! | 7      | mode change via two distinct buttons             |
//! | 8      | mode toggle via one button                       |
//!
//! Opcode bit 0x80 makes the setting the power-up default; opcodes 3 and
//! 4 never take it. Status queries use `[leading, 0x81, sub, 0, 0, 0]`
//! with sub 0x08 (mode) or 0x0D (battery).

use std::fmt;

use tracing::debug;

use crate::channel::ReportChannel;
use crate::device::{Generation, ProtocolVariant};
use crate::error::{Error, Result};

/// Report id carrying every wheel command and status frame.
pub const WHEEL_REPORT_ID: u32 = 0x10;
/// Fixed length of command and status frames.
pub const FRAME_LEN: usize = 6;

/// Set-command marker, frame bytes 1 and 2.
const SET_MARKER: [u8; 2] = [0x80, 0x56];
/// Query marker, frame byte 1.
const QUERY_MARKER: u8 = 0x81;
/// Permanence bit folded into the opcode byte.
const PERMANENT_BIT: u8 = 0x80;

/// Status sub-commands.
const SUB_MODE: u8 = 0x08;
const SUB_BATTERY: u8 = 0x0D;

/// Frame initiating receiver re-pairing. Sent verbatim, without the
/// leading-byte substitution.
pub const RECONNECT_FRAME: [u8; FRAME_LEN] = [0xFF, 0x80, 0xB2, 1, 0, 0];
/// How long the mouse is given to complete re-pairing, in milliseconds.
pub const RECONNECT_WAIT_MS: i32 = 60_000;

/// Wheel behaviour set-commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelMode {
    /// Free-spinning.
    Free,
    /// Click-to-click.
    Click,
    /// Mode change via button: `up` switches to free, `down` to click.
    /// Equal buttons mean one toggle button for both directions.
    Manual { up: u8, down: u8 },
    /// Click-to-click, switching to free when the wheel is rotated at
    /// the given speeds (clicks per second, 0 = previously set).
    Auto { up: u8, down: u8 },
    /// Free spinning once the wheel moves; raw parameter bytes.
    SoftFree { p1: u8, p2: u8 },
    /// Click-to-click once the wheel moves; raw parameter bytes.
    SoftClick { p1: u8, p2: u8 },
}

/// Whether a mode change survives a power cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permanence {
    /// Becomes the default after power-up.
    Permanent,
    /// Lost on power-down.
    Temporary,
}

impl WheelMode {
    fn base_opcode(&self) -> u8 {
        match self {
            Self::Free => 1,
            Self::Click => 2,
            Self::SoftFree { .. } => 3,
            Self::SoftClick { .. } => 4,
            Self::Auto { .. } => 5,
            Self::Manual { up, down } if up != down => 7,
            Self::Manual { .. } => 8,
        }
    }

    /// The soft modes are inherently temporary; their opcodes never take
    /// the permanence bit.
    fn is_soft(&self) -> bool {
        matches!(self, Self::SoftFree { .. } | Self::SoftClick { .. })
    }
}

/// Encode a set-command frame.
pub fn encode(
    variant: ProtocolVariant,
    mode: WheelMode,
    permanence: Permanence,
) -> [u8; FRAME_LEN] {
    let mut opcode = mode.base_opcode();
    if permanence == Permanence::Permanent && !mode.is_soft() {
        opcode |= PERMANENT_BIT;
    }

    let (p1, p2) = match mode {
        WheelMode::Free | WheelMode::Click => (0, 0),
        WheelMode::Auto { up, down } => (up, down),
        WheelMode::SoftFree { p1, p2 } | WheelMode::SoftClick { p1, p2 } => (p1, p2),
        WheelMode::Manual { up, down } if up == down => (up, 0),
        WheelMode::Manual { up, down } => match variant.generation {
            // Two nibbles in one byte vs. one byte per button.
            Generation::Generation1 => ((up << 4) | down, 0),
            Generation::Generation2 => (up, down),
        },
    };

    [variant.leading, SET_MARKER[0], SET_MARKER[1], opcode, p1, p2]
}

/// Apply a wheel mode.
pub fn set_mode(
    channel: &dyn ReportChannel,
    variant: ProtocolVariant,
    mode: WheelMode,
    permanence: Permanence,
) -> Result<()> {
    let frame = encode(variant, mode, permanence);
    debug!(?mode, ?permanence, frame = format_args!("{frame:02X?}"), "set wheel mode");
    channel.send(WHEEL_REPORT_ID, &frame)
}

/// Start receiver re-pairing. The caller prints the pairing instructions
/// and then drains the channel for [`RECONNECT_WAIT_MS`].
pub fn reconnect(channel: &dyn ReportChannel) -> Result<()> {
    channel.send(WHEEL_REPORT_ID, &RECONNECT_FRAME)
}

/// Send a status query and read the 6-byte answer back.
fn status_query(
    channel: &dyn ReportChannel,
    variant: ProtocolVariant,
    sub: u8,
) -> Result<[u8; FRAME_LEN]> {
    let req = [variant.leading, QUERY_MARKER, sub, 0, 0, 0];
    channel.send(WHEEL_REPORT_ID, &req)?;
    let resp = channel.query(WHEEL_REPORT_ID, FRAME_LEN)?;
    let mut frame = [0u8; FRAME_LEN];
    frame.copy_from_slice(&resp[..FRAME_LEN]);
    Ok(frame)
}

/// Check the three echoed header bytes against what the firmware should
/// have produced.
fn expect_echo(frame: &[u8; FRAME_LEN], expected: [u8; 3]) -> Result<()> {
    if frame[..3] != expected {
        return Err(Error::BadAnswer {
            got: [frame[0], frame[1], frame[2]],
        });
    }
    Ok(())
}

/// Decoded answer to a mode query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeReport {
    FreeSpinning,
    ClickToClick,
    /// Generation2 parameter echo: automatic switching with its speeds.
    AutoSwitch { up: u8, down: u8 },
    /// Generation2 parameter echo: button-driven switching.
    ManualSwitch { up: u8, down: u8 },
}

impl fmt::Display for ModeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FreeSpinning => write!(f, "free spinning"),
            Self::ClickToClick => write!(f, "click-by-click"),
            Self::AutoSwitch { up, down } => {
                write!(f, "automatic switching (up={up}, down={down})")
            }
            Self::ManualSwitch { up, down } => {
                write!(f, "manual switching (buttons {up}, {down})")
            }
        }
    }
}

/// Query the current wheel mode.
///
/// Generation1 firmware echoes the query header and reports the mode bit;
/// Generation2 echoes the last applied set command.
pub fn query_mode(channel: &dyn ReportChannel, variant: ProtocolVariant) -> Result<ModeReport> {
    let frame = status_query(channel, variant, SUB_MODE)?;
    match variant.generation {
        Generation::Generation1 => {
            expect_echo(&frame, [variant.leading, QUERY_MARKER, SUB_MODE])?;
            Ok(if frame[5] & 1 == 1 {
                ModeReport::ClickToClick
            } else {
                ModeReport::FreeSpinning
            })
        }
        Generation::Generation2 => {
            expect_echo(&frame, [1, SET_MARKER[0], SET_MARKER[1]])?;
            match frame[3] & !PERMANENT_BIT {
                1 | 3 => Ok(ModeReport::FreeSpinning),
                2 | 4 => Ok(ModeReport::ClickToClick),
                5 => Ok(ModeReport::AutoSwitch {
                    up: frame[4],
                    down: frame[5],
                }),
                7 => Ok(ModeReport::ManualSwitch {
                    up: frame[4],
                    down: frame[5],
                }),
                8 => Ok(ModeReport::ManualSwitch {
                    up: frame[4],
                    down: frame[4],
                }),
                _ => Err(Error::BadAnswer {
                    got: [frame[3], frame[4], frame[5]],
                }),
            }
        }
    }
}

/// Charging state reported alongside the battery level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryState {
    OnBattery,
    Charging,
    FullyCharged,
    Other(u8),
}

impl BatteryState {
    fn from_byte(b: u8) -> Self {
        match b {
            0x30 => Self::OnBattery,
            0x50 => Self::Charging,
            0x90 => Self::FullyCharged,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for BatteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnBattery => write!(f, "running on battery"),
            Self::Charging => write!(f, "charging"),
            Self::FullyCharged => write!(f, "fully charged"),
            Self::Other(code) => write!(f, "status {code:02x}"),
        }
    }
}

/// Decoded answer to a battery query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryReport {
    pub percent: u8,
    pub state: BatteryState,
}

impl fmt::Display for BatteryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "battery level {}%, {}", self.percent, self.state)
    }
}

/// Query the battery level and charging state.
///
/// Both generations echo the query header here — only the mode query has
/// a set command to echo.
pub fn query_battery(
    channel: &dyn ReportChannel,
    variant: ProtocolVariant,
) -> Result<BatteryReport> {
    let frame = status_query(channel, variant, SUB_BATTERY)?;
    expect_echo(&frame, [variant.leading, QUERY_MARKER, SUB_BATTERY])?;
    Ok(BatteryReport {
        percent: frame[3],
        state: BatteryState::from_byte(frame[4]),
    })
}
