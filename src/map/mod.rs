//! The locally hosted map view and the push channel feeding it.
//!
//! The tracker never talks to the browser directly. Every update is POSTed to the local map
//! server (see [`relay`]), which fans it out to subscribed pages as Server-Sent Events
//! (see [`server`]). Delivery is at-most-once: the next poll supersedes a lost message.

pub mod error;
pub mod relay;
pub mod server;

use serde::{Deserialize, Serialize};

use crate::gps::FixQuality;
use crate::signal::SignalQuality;

pub use self::error::RelayError;
pub use self::relay::{BrowserMapView, HttpMapClient, MapRelay, MapView, ReadinessProbe};
pub use self::server::MapServerConfig;

pub const UPDATE_LOCATION_PATH: &str = "/update_location";
pub const UPDATE_TRACKED_LOCATION_PATH: &str = "/update_tracked_location";
pub const CLEAR_LOCATION_PATH: &str = "/clear_location";
pub const HIDE_MARKER_PATH: &str = "/hide_marker";
pub const UPDATE_SIGNAL_PATH: &str = "/update_signal";
pub const UPDATE_FIX_PATH: &str = "/update_fix";
pub const EVENTS_PATH: &str = "/events";

/// Device location body for [`UPDATE_LOCATION_PATH`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceLocation {
    pub lat: f64,
    pub lon: f64,
    pub heading: Option<f64>,
}

/// Collar location body for [`UPDATE_TRACKED_LOCATION_PATH`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedLocation {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalUpdate {
    pub level: SignalQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixUpdate {
    pub fix: FixQuality,
}

/// Everything the map page can be told.
///
/// Serialized with a `type` tag on the push channel, e.g.
/// `{"type":"update_location","lat":47.6,"lon":-122.3,"heading":90.0}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapEvent {
    UpdateLocation(DeviceLocation),
    UpdateTrackedLocation(TrackedLocation),
    /// Remove the device marker after the fix was lost.
    ClearLocation,
    /// Remove the collar marker when tracking stops.
    HideMarker,
    UpdateSignal(SignalUpdate),
    UpdateFix(FixUpdate),
}

impl MapEvent {
    /// The map server endpoint that accepts this event.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::UpdateLocation(_) => UPDATE_LOCATION_PATH,
            Self::UpdateTrackedLocation(_) => UPDATE_TRACKED_LOCATION_PATH,
            Self::ClearLocation => CLEAR_LOCATION_PATH,
            Self::HideMarker => HIDE_MARKER_PATH,
            Self::UpdateSignal(_) => UPDATE_SIGNAL_PATH,
            Self::UpdateFix(_) => UPDATE_FIX_PATH,
        }
    }
}
