use crate::gps::FixQuality;
use crate::signal::SignalQuality;
use crate::state_machine::tracking::TrackingMode;

/// The indicator state shown to the user: fix icon, signal icon and the tracking toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusView {
    pub fix: FixQuality,
    /// `None` until the first modem reading arrives.
    pub signal: Option<SignalQuality>,
    pub mode: TrackingMode,
}

impl StatusView {
    pub fn new() -> Self {
        Self {
            fix: FixQuality::NoFix,
            signal: None,
            mode: TrackingMode::Idle,
        }
    }

    /// Returns `true` if the indicator changed.
    pub fn set_fix(&mut self, fix: FixQuality) -> bool {
        std::mem::replace(&mut self.fix, fix) != fix
    }

    /// Returns `true` if the indicator changed.
    pub fn set_signal(&mut self, signal: SignalQuality) -> bool {
        self.signal.replace(signal) != Some(signal)
    }

    /// Returns `true` if the indicator changed.
    pub fn set_mode(&mut self, mode: TrackingMode) -> bool {
        std::mem::replace(&mut self.mode, mode) != mode
    }
}

impl Default for StatusView {
    fn default() -> Self {
        Self::new()
    }
}
