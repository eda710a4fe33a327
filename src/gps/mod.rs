//! Device position from the local positioning daemon.

pub mod error;
pub mod gpsd;

use serde::{Deserialize, Serialize};

pub use self::error::GpsError;
pub use self::gpsd::GpsdClient;

/// Quality of the current GPS fix as reported by the daemon's `mode` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixQuality {
    NoFix,
    Fix2d,
    Fix3d,
}

impl FixQuality {
    /// Map a gpsd `mode` (0 = unknown, 1 = no fix, 2 = 2D, 3 = 3D) to a fix quality.
    pub fn from_mode(mode: u8) -> Self {
        match mode {
            2 => Self::Fix2d,
            3 => Self::Fix3d,
            _ => Self::NoFix,
        }
    }

    /// Whether the position is good enough to put on the map (at least a 2D fix).
    pub fn has_fix(self) -> bool {
        self >= Self::Fix2d
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Fix3d => "3d_gps.png",
            Self::Fix2d => "2d_gps.png",
            Self::NoFix => "no_gps.png",
        }
    }

    pub fn tooltip(self) -> &'static str {
        match self {
            Self::Fix3d => "3D Fix",
            Self::Fix2d => "2D Fix",
            Self::NoFix => "No Fix",
        }
    }
}

/// A single reading from the positioning daemon. Overwritten on every poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Course over ground in degrees, when the receiver reports one.
    pub heading: Option<f64>,
    pub fix: FixQuality,
}

impl Position {
    /// A reading with no usable coordinates.
    pub fn no_fix() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            heading: None,
            fix: FixQuality::NoFix,
        }
    }
}

/// A source of device positions, polled by the coordinator.
#[allow(async_fn_in_trait)]
pub trait PositionSource {
    /// Open the connection to the daemon. Called once before the first poll.
    async fn connect(&mut self) -> Result<(), GpsError>;

    /// Fetch the most recent position known to the daemon.
    async fn get_current(&mut self) -> Result<Position, GpsError>;
}
