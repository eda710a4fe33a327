//! The single owner of all tracker state.
//!
//! Every data source reaches the coordinator as an [`Event`], and [`Coordinator::dispatch`] is
//! the one place that decides which handler runs. Handlers feed the pure state machines and
//! carry out the outputs they request: remote calls, map pushes, timer (re)arming.

pub mod status;

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::collar::{CollarApi, CollarError, CollarLocation};
use crate::config::Cadence;
use crate::gps::PositionSource;
use crate::map::{
    DeviceLocation, FixUpdate, MapEvent, MapRelay, MapView, ReadinessProbe, SignalUpdate,
    TrackedLocation,
};
use crate::signal::SignalQuality;
use crate::state_machine::StateMachine;
use crate::state_machine::fix::{FixInput, FixMachine, FixOutput};
use crate::state_machine::readiness::{ReadinessInput, ReadinessMachine, ReadinessOutput};
use crate::state_machine::tracking::{TrackingInput, TrackingMachine, TrackingMode, TrackingOutput};
use crate::timer::{TimerFired, TimerKind, TimerMap};

pub use self::status::StatusView;

/// User requests from the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Toggle,
    Shutdown,
}

/// Everything the coordinator reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    TimerFired(TimerFired),
    Toggle,
    Signal(SignalQuality),
    Shutdown,
}

/// Drives the GPS poller, collar poller, readiness gate and push relay from one task.
///
/// Remote calls are awaited inline, so at most one handler runs at a time and every cadence is
/// re-armed only after its handler finished.
pub struct Coordinator<G, C, M, V> {
    gps: G,
    collar: C,
    map: M,
    view: V,
    map_url: Url,
    cadence: Cadence,

    fix: FixMachine,
    tracking: TrackingMachine,
    readiness: ReadinessMachine,
    status: StatusView,
    gps_connected: bool,

    timers: TimerMap,
    fired: mpsc::UnboundedReceiver<TimerFired>,
}

impl<G, C, M, V> Coordinator<G, C, M, V>
where
    G: PositionSource,
    C: CollarApi,
    M: MapRelay + ReadinessProbe,
    V: MapView,
{
    pub fn new(gps: G, collar: C, map: M, view: V, map_url: Url, cadence: Cadence) -> Self {
        let (fired_tx, fired) = mpsc::unbounded_channel();

        Self {
            gps,
            collar,
            map,
            view,
            map_url,
            fix: FixMachine::new(),
            tracking: TrackingMachine::new(&cadence),
            readiness: ReadinessMachine::new(cadence.server_probe),
            status: StatusView::new(),
            gps_connected: false,
            timers: TimerMap::new(fired_tx),
            fired,
            cadence,
        }
    }

    pub fn status(&self) -> &StatusView {
        &self.status
    }

    pub fn timers(&self) -> &TimerMap {
        &self.timers
    }

    pub fn tracking(&self) -> &TrackingMachine {
        &self.tracking
    }

    pub fn readiness(&self) -> &ReadinessMachine {
        &self.readiness
    }

    pub fn has_fix(&self) -> bool {
        self.fix.has_fix()
    }

    /// Begin probing the map server. Does nothing after the first call.
    pub async fn start(&mut self) {
        self.readiness.process_input(ReadinessInput::Start);
        self.drive_readiness().await;
    }

    /// Run until a [`Control::Shutdown`] arrives or the control channel closes.
    ///
    /// Signal levels are read from `signal`, the lossy slot written by the signal monitor.
    pub async fn run(
        &mut self,
        mut control: mpsc::Receiver<Control>,
        mut signal: watch::Receiver<Option<SignalQuality>>,
    ) {
        self.start().await;
        let mut signal_open = true;

        loop {
            let event = tokio::select! {
                Some(fired) = self.fired.recv() => Event::TimerFired(fired),

                request = control.recv() => match request {
                    Some(Control::Toggle) => Event::Toggle,
                    Some(Control::Shutdown) | None => Event::Shutdown,
                },

                changed = signal.changed(), if signal_open => {
                    if changed.is_err() {
                        debug!("Signal monitor gone");
                        signal_open = false;
                        continue;
                    }
                    match *signal.borrow_and_update() {
                        Some(level) => Event::Signal(level),
                        None => continue,
                    }
                }
            };

            if self.dispatch(event).await.is_break() {
                break;
            }
        }

        self.timers.disarm_all();
        info!("Coordinator stopped");
    }

    /// Route one event to its handler.
    pub async fn dispatch(&mut self, event: Event) -> ControlFlow<()> {
        match event {
            Event::TimerFired(fired) => self.on_timer(fired).await,
            Event::Toggle => self.on_toggle().await,
            Event::Signal(level) => self.on_signal(level).await,
            Event::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    async fn on_timer(&mut self, fired: TimerFired) {
        if !self.timers.take_fired(&fired) {
            debug!(kind = ?fired.kind, id = %fired.id, "Ignoring stale timer");
            return;
        }

        match fired.kind {
            TimerKind::ServerProbe => {
                self.readiness.process_input(ReadinessInput::ProbeDue);
                self.drive_readiness().await;
            }
            TimerKind::GpsPoll => self.poll_gps().await,
            TimerKind::LostModeCheck => {
                self.tracking.process_input(TrackingInput::LostModeCheckDue);
                self.drive_tracking().await;
            }
            TimerKind::CollarFetch => {
                self.tracking.process_input(TrackingInput::FetchDue);
                self.drive_tracking().await;
            }
        }
    }

    async fn on_toggle(&mut self) {
        if self.tracking.mode() == TrackingMode::Idle && !self.collar.has_session() {
            error!(error = %CollarError::SessionUninitialized, "Cannot start tracking");
            return;
        }

        self.tracking.process_input(TrackingInput::Toggle);
        self.drive_tracking().await;
    }

    async fn on_signal(&mut self, level: SignalQuality) {
        if self.status.set_signal(level) {
            info!(level = ?level, icon = level.icon(), "{}", level.tooltip());
        }
        self.relay(MapEvent::UpdateSignal(SignalUpdate { level })).await;
    }

    async fn poll_gps(&mut self) {
        if !self.gps_connected {
            match self.gps.connect().await {
                Ok(()) => self.gps_connected = true,
                Err(e) => warn!(error = %e, "GPS daemon unavailable"),
            }
        }

        if self.gps_connected {
            match self.gps.get_current().await {
                Ok(position) => {
                    self.fix.process_input(FixInput::Reading(position));
                    self.drive_fix().await;
                }
                Err(e) => {
                    warn!(error = %e, "GPS poll failed");
                    self.gps_connected = false;
                }
            }
        }

        self.arm(TimerKind::GpsPoll, self.cadence.gps_poll);
    }

    async fn fetch_collar(&mut self) -> Option<CollarLocation> {
        match self.collar.update_location().await {
            Ok(true) => {
                let location = self.collar.last_known();
                if location.is_none() {
                    warn!("Collar update succeeded without a location");
                }
                location
            }
            Ok(false) => {
                warn!("Failed to update pet location");
                None
            }
            Err(e) => {
                warn!(error = %e, "Collar location fetch failed");
                None
            }
        }
    }

    async fn drive_readiness(&mut self) {
        while let Some(output) = self.readiness.poll_output() {
            match output {
                ReadinessOutput::Arm(kind, delay) => self.arm(kind, delay),
                ReadinessOutput::Probe => {
                    let up = self.map.probe().await;
                    self.readiness.process_input(ReadinessInput::ProbeResult(up));
                }
                ReadinessOutput::LoadMap => {
                    info!(
                        url = %self.map_url,
                        probes = self.readiness.probes(),
                        "Map server is up"
                    );
                    if let Err(e) = self.view.load(&self.map_url).await {
                        warn!(error = %e, "Failed to open map view");
                    }
                    self.poll_gps().await;
                }
            }
        }
    }

    async fn drive_fix(&mut self) {
        while let Some(output) = self.fix.poll_output() {
            match output {
                FixOutput::FixStatus(fix) => {
                    if self.status.set_fix(fix) {
                        info!(fix = ?fix, icon = fix.icon(), "{}", fix.tooltip());
                    }
                    self.relay(MapEvent::UpdateFix(FixUpdate { fix })).await;
                }
                FixOutput::Relay(position) => {
                    self.relay(MapEvent::UpdateLocation(DeviceLocation {
                        lat: position.latitude,
                        lon: position.longitude,
                        heading: position.heading,
                    }))
                    .await;
                }
                FixOutput::ClearLocation => {
                    info!("GPS fix lost, clearing device marker");
                    self.relay(MapEvent::ClearLocation).await;
                }
            }
        }
    }

    async fn drive_tracking(&mut self) {
        while let Some(output) = self.tracking.poll_output() {
            match output {
                TrackingOutput::ModeChanged(mode) => {
                    self.status.set_mode(mode);
                    info!(mode = ?mode, control = mode.toggle_label(), "Tracking mode changed");
                }
                TrackingOutput::SetLostMode(enabled) => {
                    if let Err(e) = self.collar.set_lost_mode(enabled).await {
                        warn!(error = %e, enabled, "Failed to set lost mode");
                    }
                }
                TrackingOutput::Arm(kind, delay) => self.arm(kind, delay),
                TrackingOutput::Disarm(kind) => {
                    if let Err(e) = self.timers.disarm(kind) {
                        debug!(error = %e, "Nothing to disarm");
                    }
                }
                TrackingOutput::QueryLostMode => {
                    let is_lost = match self.collar.is_lost().await {
                        Ok(is_lost) => {
                            debug!(is_lost, "Pet lost mode status");
                            Some(is_lost)
                        }
                        Err(e) => {
                            warn!(error = %e, "Lost mode check failed");
                            None
                        }
                    };
                    self.tracking
                        .process_input(TrackingInput::LostModeChecked(is_lost));
                }
                TrackingOutput::FetchLocation(reason) => {
                    let location = self.fetch_collar().await;
                    self.tracking
                        .process_input(TrackingInput::LocationFetched { location, reason });
                }
                TrackingOutput::RelayLocation(location) => {
                    self.relay(MapEvent::UpdateTrackedLocation(TrackedLocation {
                        lat: location.latitude,
                        lon: location.longitude,
                    }))
                    .await;
                }
                TrackingOutput::HideMarker => self.relay(MapEvent::HideMarker).await,
            }
        }
    }

    fn arm(&self, kind: TimerKind, delay: Duration) {
        if let Err(e) = self.timers.arm(kind, delay) {
            warn!(error = %e, "Timer not armed");
        }
    }

    async fn relay(&self, event: MapEvent) {
        if let Err(e) = self.map.publish(event).await {
            warn!(error = %e, endpoint = event.endpoint(), "Map update dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use crate::collar::Credentials;
    use crate::gps::{FixQuality, GpsError, Position};
    use crate::map::RelayError;
    use crate::timer::TimerId;

    #[derive(Clone, Default)]
    struct FakeGps {
        /// Scripted readings; `None` is a failed read. Defaults to no fix once drained.
        readings: Arc<Mutex<VecDeque<Option<FixQuality>>>>,
        /// Connection attempts that fail before the daemon accepts.
        refused: Arc<Mutex<u32>>,
        connects: Arc<Mutex<u32>>,
        polls: Arc<Mutex<u32>>,
    }

    impl FakeGps {
        fn with_readings(readings: &[FixQuality]) -> Self {
            let script: Vec<_> = readings.iter().copied().map(Some).collect();
            Self::scripted(&script)
        }

        fn scripted(readings: &[Option<FixQuality>]) -> Self {
            let gps = Self::default();
            gps.readings.lock().unwrap().extend(readings);
            gps
        }

        fn connects(&self) -> u32 {
            *self.connects.lock().unwrap()
        }
    }

    impl PositionSource for FakeGps {
        async fn connect(&mut self) -> Result<(), GpsError> {
            *self.connects.lock().unwrap() += 1;
            let mut refused = self.refused.lock().unwrap();
            if *refused > 0 {
                *refused -= 1;
                return Err(GpsError::Io(std::io::ErrorKind::ConnectionRefused.into()));
            }
            Ok(())
        }

        async fn get_current(&mut self) -> Result<Position, GpsError> {
            *self.polls.lock().unwrap() += 1;
            let reading = self
                .readings
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Some(FixQuality::NoFix));
            let fix = reading.ok_or(GpsError::Closed)?;
            Ok(Position {
                latitude: 47.6441,
                longitude: -122.3864,
                heading: Some(270.0),
                fix,
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum CollarCall {
        SetLostMode(bool),
        IsLost,
        UpdateLocation,
    }

    #[derive(Clone)]
    struct FakeCollar {
        session: bool,
        is_lost: bool,
        /// Scripted fetch results; `None` simulates an API failure. Defaults to failure.
        fetches: Arc<Mutex<VecDeque<Option<CollarLocation>>>>,
        last_known: Option<CollarLocation>,
        calls: Arc<Mutex<Vec<CollarCall>>>,
    }

    impl FakeCollar {
        fn logged_in() -> Self {
            Self {
                session: true,
                is_lost: false,
                fetches: Arc::default(),
                last_known: None,
                calls: Arc::default(),
            }
        }

        fn calls(&self) -> Vec<CollarCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CollarApi for FakeCollar {
        async fn login(&mut self, _credentials: &Credentials) -> Result<(), CollarError> {
            self.session = true;
            Ok(())
        }

        fn has_session(&self) -> bool {
            self.session
        }

        async fn set_lost_mode(&mut self, enabled: bool) -> Result<(), CollarError> {
            self.calls.lock().unwrap().push(CollarCall::SetLostMode(enabled));
            self.is_lost = enabled;
            Ok(())
        }

        async fn is_lost(&mut self) -> Result<bool, CollarError> {
            self.calls.lock().unwrap().push(CollarCall::IsLost);
            Ok(self.is_lost)
        }

        async fn update_location(&mut self) -> Result<bool, CollarError> {
            self.calls.lock().unwrap().push(CollarCall::UpdateLocation);
            match self.fetches.lock().unwrap().pop_front().flatten() {
                Some(location) => {
                    self.last_known = Some(location);
                    Ok(true)
                }
                None => Err(CollarError::Status { status: 503 }),
            }
        }

        fn last_known(&self) -> Option<CollarLocation> {
            self.last_known
        }
    }

    #[derive(Clone, Default)]
    struct FakeMap {
        events: Arc<Mutex<Vec<MapEvent>>>,
        probes: Arc<Mutex<u32>>,
        /// Probe number (1-based) from which the server answers.
        up_from: u32,
        /// Every push is rejected by the server.
        rejecting: bool,
    }

    impl FakeMap {
        fn up_from(probe: u32) -> Self {
            Self {
                up_from: probe,
                ..Self::default()
            }
        }

        fn events(&self) -> Vec<MapEvent> {
            self.events.lock().unwrap().clone()
        }

        fn count(&self, wanted: &MapEvent) -> usize {
            self.events().iter().filter(|e| *e == wanted).count()
        }

        fn probes(&self) -> u32 {
            *self.probes.lock().unwrap()
        }
    }

    impl MapRelay for FakeMap {
        async fn publish(&self, event: MapEvent) -> Result<(), RelayError> {
            self.events.lock().unwrap().push(event);
            if self.rejecting {
                return Err(RelayError::Status {
                    endpoint: event.endpoint(),
                    status: 500,
                });
            }
            Ok(())
        }
    }

    impl ReadinessProbe for FakeMap {
        async fn probe(&self) -> bool {
            let mut probes = self.probes.lock().unwrap();
            *probes += 1;
            *probes >= self.up_from
        }
    }

    #[derive(Clone, Default)]
    struct FakeView {
        loads: Arc<Mutex<Vec<Url>>>,
    }

    impl MapView for FakeView {
        async fn load(&mut self, url: &Url) -> Result<(), RelayError> {
            self.loads.lock().unwrap().push(url.clone());
            Ok(())
        }
    }

    type TestCoordinator = Coordinator<FakeGps, FakeCollar, FakeMap, FakeView>;

    struct Harness {
        coordinator: TestCoordinator,
        gps: FakeGps,
        collar: FakeCollar,
        map: FakeMap,
        view: FakeView,
        /// Requests delivered at the start of the next run.
        queued: Vec<Control>,
        signal: watch::Sender<Option<SignalQuality>>,
        signal_rx: watch::Receiver<Option<SignalQuality>>,
    }

    impl Harness {
        fn new(gps: FakeGps, collar: FakeCollar, map: FakeMap) -> Self {
            let view = FakeView::default();
            let coordinator = Coordinator::new(
                gps.clone(),
                collar.clone(),
                map.clone(),
                view.clone(),
                Url::parse("http://127.0.0.1:5000/").unwrap(),
                Cadence::default(),
            );
            let (signal, signal_rx) = watch::channel(None);

            Self {
                coordinator,
                gps,
                collar,
                map,
                view,
                queued: Vec::new(),
                signal,
                signal_rx,
            }
        }

        fn with_map(map: FakeMap) -> Self {
            Self::new(FakeGps::default(), FakeCollar::logged_in(), map)
        }

        /// Logged in, with a map server that answers the first probe.
        fn ready() -> Self {
            Self::with_map(FakeMap::up_from(1))
        }

        /// Let the coordinator run for `duration` of paused time.
        async fn run_for(&mut self, duration: Duration) {
            let (control, control_rx) = mpsc::channel(8);
            for request in self.queued.drain(..) {
                control.send(request).await.unwrap();
            }

            let _ = tokio::time::timeout(
                duration,
                self.coordinator.run(control_rx, self.signal_rx.clone()),
            )
            .await;
        }

        fn toggle(&mut self) {
            self.queued.push(Control::Toggle);
        }

        fn polls(&self) -> u32 {
            *self.gps.polls.lock().unwrap()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_gate_probes_until_up_then_stops() {
        let mut h = Harness::with_map(FakeMap::up_from(3));

        h.run_for(Duration::from_secs(30)).await;

        assert_eq!(h.map.probes(), 3);
        assert_eq!(h.view.loads.lock().unwrap().len(), 1);
        assert!(!h.coordinator.timers().is_armed(TimerKind::ServerProbe));
        // GPS polling started once the map loaded.
        assert!(h.polls() > 1);
        assert!(h.coordinator.timers().is_armed(TimerKind::GpsPoll));

        h.run_for(Duration::from_secs(30)).await;
        assert_eq!(h.map.probes(), 3);
        assert_eq!(h.view.loads.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fix_loss_clears_marker_once() {
        let gps = FakeGps::with_readings(&[
            FixQuality::Fix3d,
            FixQuality::Fix2d,
            FixQuality::NoFix,
            FixQuality::NoFix,
            FixQuality::NoFix,
        ]);
        let mut h = Harness::new(gps, FakeCollar::logged_in(), FakeMap::up_from(1));

        h.run_for(Duration::from_secs(20)).await;

        assert_eq!(h.map.count(&MapEvent::ClearLocation), 1);
        let locations = h
            .map
            .events()
            .iter()
            .filter(|e| matches!(e, MapEvent::UpdateLocation(_)))
            .count();
        assert_eq!(locations, 2);
        assert!(!h.coordinator.has_fix());
        assert_eq!(h.coordinator.status().fix, FixQuality::NoFix);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gps_read_failure_keeps_fix_and_reconnects() {
        let gps = FakeGps::scripted(&[Some(FixQuality::Fix3d), None, None, None, None, None]);
        let mut h = Harness::new(gps, FakeCollar::logged_in(), FakeMap::up_from(1));

        // Polls at 1, 3, 5, 7 and 9; only the first one reads. Every poll after a failed read
        // opens a new connection.
        h.run_for(Duration::from_secs(10)).await;

        assert_eq!(h.polls(), 5);
        assert_eq!(h.gps.connects(), 4);
        assert!(h.coordinator.has_fix());
        assert_eq!(h.coordinator.status().fix, FixQuality::Fix3d);
        assert_eq!(h.map.count(&MapEvent::ClearLocation), 0);
        assert!(h.coordinator.timers().is_armed(TimerKind::GpsPoll));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gps_connect_failure_still_rearms() {
        let gps = FakeGps::default();
        *gps.refused.lock().unwrap() = 2;
        let mut h = Harness::new(gps, FakeCollar::logged_in(), FakeMap::up_from(1));

        // Connects at 1 and 3 are refused, the one at 5 succeeds.
        h.run_for(Duration::from_secs(6)).await;

        assert_eq!(h.gps.connects(), 3);
        assert_eq!(h.polls(), 1);
        assert!(h.coordinator.timers().is_armed(TimerKind::GpsPoll));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_pushes_are_not_retried() {
        let gps = FakeGps::with_readings(&[FixQuality::Fix3d, FixQuality::NoFix]);
        let mut map = FakeMap::up_from(1);
        map.rejecting = true;
        let mut h = Harness::new(gps, FakeCollar::logged_in(), map);

        h.run_for(Duration::from_secs(10)).await;

        // One attempt per poll and nothing more.
        assert_eq!(h.polls(), 5);
        let fix_pushes = h
            .map
            .events()
            .iter()
            .filter(|e| matches!(e, MapEvent::UpdateFix(_)))
            .count();
        assert_eq!(fix_pushes, 5);
        assert_eq!(h.map.count(&MapEvent::ClearLocation), 1);
        let locations = h
            .map
            .events()
            .iter()
            .filter(|e| matches!(e, MapEvent::UpdateLocation(_)))
            .count();
        assert_eq!(locations, 1);
        assert!(!h.coordinator.has_fix());
        assert!(h.coordinator.timers().is_armed(TimerKind::GpsPoll));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gps_polls_do_not_overlap() {
        let mut h = Harness::ready();

        // Ready at 1s, then a poll every 2s: 1, 3, 5, 7, 9.
        h.run_for(Duration::from_secs(10)).await;
        assert_eq!(h.polls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_on_then_off() {
        let collar = FakeCollar::logged_in();
        collar.fetches.lock().unwrap().extend([Some(CollarLocation {
            latitude: 47.645,
            longitude: -122.399,
            fetched_at: 1_700_000_000,
        })]);
        let mut h = Harness::new(FakeGps::default(), collar, FakeMap::up_from(1));

        h.toggle();
        h.run_for(Duration::from_secs(12)).await;

        assert_eq!(h.coordinator.tracking().mode(), TrackingMode::Tracking);
        assert_eq!(h.coordinator.status().mode, TrackingMode::Tracking);
        assert!(h.coordinator.timers().is_armed(TimerKind::LostModeCheck));
        assert!(h.coordinator.timers().is_armed(TimerKind::CollarFetch));
        assert!(h.collar.calls().contains(&CollarCall::SetLostMode(true)));
        assert!(h.collar.calls().contains(&CollarCall::IsLost));
        assert!(h.map.events().contains(&MapEvent::UpdateTrackedLocation(TrackedLocation {
            lat: 47.645,
            lon: -122.399,
        })));

        h.toggle();
        h.run_for(Duration::from_secs(12)).await;

        assert_eq!(h.coordinator.tracking().mode(), TrackingMode::Idle);
        assert_eq!(h.map.count(&MapEvent::HideMarker), 1);
        assert!(!h.coordinator.timers().is_armed(TimerKind::LostModeCheck));
        assert!(!h.coordinator.timers().is_armed(TimerKind::CollarFetch));
        assert_eq!(h.collar.calls().last(), Some(&CollarCall::SetLostMode(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_collar_failure_keeps_displayed_location() {
        let first = CollarLocation {
            latitude: 47.641,
            longitude: -122.398,
            fetched_at: 1_700_000_000,
        };
        let collar = FakeCollar::logged_in();
        // First fetch succeeds, every later one fails.
        collar.fetches.lock().unwrap().push_back(Some(first));
        let mut h = Harness::new(FakeGps::default(), collar, FakeMap::up_from(1));

        h.toggle();
        h.run_for(Duration::from_secs(28)).await;

        let fetches = h
            .collar
            .calls()
            .iter()
            .filter(|c| **c == CollarCall::UpdateLocation)
            .count();
        assert!(fetches >= 3, "fetching continued after failures: {fetches}");
        assert_eq!(h.coordinator.tracking().displayed_location(), Some(first));
        assert!(h.coordinator.timers().is_armed(TimerKind::CollarFetch));

        let relayed = h
            .map
            .events()
            .iter()
            .filter(|e| matches!(e, MapEvent::UpdateTrackedLocation(_)))
            .count();
        assert_eq!(relayed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_mode_reasserted_when_cleared() {
        let mut h = Harness::ready();

        h.toggle();
        h.run_for(Duration::from_millis(500)).await;
        // Vendor side silently drops lost mode.
        h.coordinator.collar.is_lost = false;
        h.run_for(Duration::from_secs(2)).await;

        let calls = h.collar.calls();
        let reasserts = calls
            .iter()
            .filter(|c| **c == CollarCall::SetLostMode(true))
            .count();
        assert_eq!(reasserts, 2);
        assert!(calls.contains(&CollarCall::IsLost));
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_without_session_is_refused() {
        let mut collar = FakeCollar::logged_in();
        collar.session = false;
        let mut h = Harness::new(FakeGps::default(), collar, FakeMap::up_from(1));

        h.toggle();
        h.run_for(Duration::from_secs(10)).await;

        assert_eq!(h.coordinator.tracking().mode(), TrackingMode::Idle);
        assert!(h.collar.calls().is_empty());
        assert!(!h.coordinator.timers().is_armed(TimerKind::CollarFetch));
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_updates_are_relayed() {
        let mut h = Harness::with_map(FakeMap::up_from(100));

        h.signal.send_replace(Some(SignalQuality::Weak));
        h.run_for(Duration::from_secs(1)).await;

        assert_eq!(h.coordinator.status().signal, Some(SignalQuality::Weak));
        assert_eq!(
            h.map.count(&MapEvent::UpdateSignal(SignalUpdate {
                level: SignalQuality::Weak
            })),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_is_ignored() {
        let mut h = Harness::ready();

        let flow = h
            .coordinator
            .dispatch(Event::TimerFired(TimerFired {
                kind: TimerKind::GpsPoll,
                id: TimerId::generate(),
            }))
            .await;

        assert!(flow.is_continue());
        assert_eq!(h.polls(), 0);
        assert!(!h.coordinator.timers().is_armed(TimerKind::GpsPoll));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_run_and_timers() {
        let mut h = Harness::ready();
        let (control, control_rx) = mpsc::channel(1);
        control.send(Control::Shutdown).await.unwrap();

        h.coordinator.run(control_rx, h.signal_rx.clone()).await;

        assert_eq!(h.coordinator.timers().armed_count(), 0);
    }
}
