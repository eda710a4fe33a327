use std::collections::VecDeque;
use std::time::Duration;

use super::StateMachine;
use crate::collar::CollarLocation;
use crate::config::Cadence;
use crate::timer::TimerKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    Idle,
    Tracking,
}

impl TrackingMode {
    /// Label of the control that switches away from this mode.
    pub fn toggle_label(self) -> &'static str {
        match self {
            Self::Idle => "Start Tracking",
            Self::Tracking => "Stop Tracking",
        }
    }
}

/// Lost mode as last requested from the collar service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LostModeState {
    pub enabled: bool,
}

/// Why a location fetch was requested. Only scheduled fetches re-arm the fetch timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    Scheduled,
    LostModeConfirmed,
}

/// The idle/tracking mode controller.
///
/// Entering tracking turns on the collar's lost mode and starts two tracking-only cadences: a
/// lost mode check (the vendor may silently clear the flag) and a location fetch. Leaving
/// tracking turns lost mode off, cancels both and hides the collar marker.
pub struct TrackingMachine {
    mode: TrackingMode,
    lost_mode: LostModeState,
    displayed: Option<CollarLocation>,
    first_check: Duration,
    check_interval: Duration,
    fetch_interval: Duration,
    pending: VecDeque<TrackingOutput>,
}

impl TrackingMachine {
    pub fn new(cadence: &Cadence) -> Self {
        Self {
            mode: TrackingMode::Idle,
            lost_mode: LostModeState::default(),
            displayed: None,
            first_check: cadence.lost_mode_first_check,
            check_interval: cadence.lost_mode_check,
            fetch_interval: cadence.collar_fetch,
            pending: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    pub fn lost_mode(&self) -> LostModeState {
        self.lost_mode
    }

    /// The collar location currently shown on the map.
    pub fn displayed_location(&self) -> Option<CollarLocation> {
        self.displayed
    }

    fn is_tracking(&self) -> bool {
        self.mode == TrackingMode::Tracking
    }

    fn toggle(&mut self) {
        match self.mode {
            TrackingMode::Idle => {
                self.mode = TrackingMode::Tracking;
                self.lost_mode.enabled = true;
                self.pending.extend([
                    TrackingOutput::ModeChanged(TrackingMode::Tracking),
                    TrackingOutput::SetLostMode(true),
                    TrackingOutput::Arm(TimerKind::LostModeCheck, self.first_check),
                    TrackingOutput::Arm(TimerKind::CollarFetch, self.fetch_interval),
                ]);
            }
            TrackingMode::Tracking => {
                self.mode = TrackingMode::Idle;
                self.lost_mode.enabled = false;
                self.displayed = None;
                self.pending.extend([
                    TrackingOutput::ModeChanged(TrackingMode::Idle),
                    TrackingOutput::SetLostMode(false),
                    TrackingOutput::Disarm(TimerKind::LostModeCheck),
                    TrackingOutput::Disarm(TimerKind::CollarFetch),
                    TrackingOutput::HideMarker,
                ]);
            }
        }
    }

    fn lost_mode_check_due(&mut self) {
        if self.is_tracking() {
            self.pending.push_back(TrackingOutput::QueryLostMode);
        }
    }

    fn lost_mode_checked(&mut self, is_lost: Option<bool>) {
        if !self.is_tracking() {
            return;
        }

        match is_lost {
            Some(false) => {
                // Cleared on the vendor side; assert it again.
                self.lost_mode.enabled = true;
                self.pending.push_back(TrackingOutput::SetLostMode(true));
            }
            Some(true) => {
                self.lost_mode.enabled = true;
                self.pending.push_back(TrackingOutput::FetchLocation(
                    FetchReason::LostModeConfirmed,
                ));
            }
            None => {}
        }

        self.pending.push_back(TrackingOutput::Arm(
            TimerKind::LostModeCheck,
            self.check_interval,
        ));
    }

    fn fetch_due(&mut self) {
        if self.is_tracking() {
            self.pending
                .push_back(TrackingOutput::FetchLocation(FetchReason::Scheduled));
        }
    }

    fn location_fetched(&mut self, location: Option<CollarLocation>, reason: FetchReason) {
        if !self.is_tracking() {
            return;
        }

        // A failed fetch keeps the previous location on the map.
        if let Some(location) = location {
            self.displayed = Some(location);
            self.pending
                .push_back(TrackingOutput::RelayLocation(location));
        }

        if reason == FetchReason::Scheduled {
            self.pending.push_back(TrackingOutput::Arm(
                TimerKind::CollarFetch,
                self.fetch_interval,
            ));
        }
    }
}

pub enum TrackingInput {
    Toggle,
    LostModeCheckDue,
    /// Result of [`TrackingOutput::QueryLostMode`]; `None` if the query failed.
    LostModeChecked(Option<bool>),
    FetchDue,
    /// Result of [`TrackingOutput::FetchLocation`]; `None` if no location could be fetched.
    LocationFetched {
        location: Option<CollarLocation>,
        reason: FetchReason,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackingOutput {
    ModeChanged(TrackingMode),
    SetLostMode(bool),
    Arm(TimerKind, Duration),
    Disarm(TimerKind),
    QueryLostMode,
    FetchLocation(FetchReason),
    RelayLocation(CollarLocation),
    HideMarker,
}

impl StateMachine for TrackingMachine {
    type Input = TrackingInput;
    type Output = TrackingOutput;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            TrackingInput::Toggle => self.toggle(),
            TrackingInput::LostModeCheckDue => self.lost_mode_check_due(),
            TrackingInput::LostModeChecked(is_lost) => self.lost_mode_checked(is_lost),
            TrackingInput::FetchDue => self.fetch_due(),
            TrackingInput::LocationFetched { location, reason } => {
                self.location_fetched(location, reason)
            }
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.pending.pop_front()
    }
}
