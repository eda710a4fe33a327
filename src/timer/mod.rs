pub mod error;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, Entry};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;
use uuid::Uuid;

use self::error::{TimerAlreadyArmed, TimerNotArmed};

/// The polling cadences driven by the coordinator.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimerKind {
    /// Readiness probe of the map server at startup.
    ServerProbe,
    GpsPoll,
    /// Tracking only.
    LostModeCheck,
    /// Tracking only.
    CollarFetch,
}

/// Identifies one arming of a timer, so a tick from a replaced timer can be told apart.
#[derive(Clone, Hash, PartialEq, Eq)]
pub struct TimerId(Arc<Uuid>);

impl TimerId {
    pub fn generate() -> Self {
        Self(Arc::new(Uuid::new_v4()))
    }
}

impl fmt::Debug for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimerId({})", self.0)
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notification that an armed timer elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub id: TimerId,
}

#[derive(Debug)]
struct ArmedTimer {
    id: TimerId,
    task: JoinHandle<()>,
}

/// One-shot timers keyed by [`TimerKind`], at most one armed per kind.
///
/// A timer is a sleeping task that reports [`TimerFired`] on the channel given at construction.
/// The entry stays armed until the owner accepts the tick with [`take_fired`](Self::take_fired)
/// or cancels it with [`disarm`](Self::disarm). Re-arming after the cycle completes is up to
/// the owner, so a slow handler delays the next tick instead of overlapping it.
#[derive(Debug)]
pub struct TimerMap {
    timers: DashMap<TimerKind, ArmedTimer, ahash::RandomState>,
    fired: mpsc::UnboundedSender<TimerFired>,
}

impl TimerMap {
    /// Construct a new empty [`TimerMap`] reporting elapsed timers on `fired`.
    pub fn new(fired: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            timers: DashMap::default(),
            fired,
        }
    }

    /// Arm a `kind` timer firing once after `delay`.
    pub fn arm(&self, kind: TimerKind, delay: Duration) -> Result<TimerId, TimerAlreadyArmed> {
        match self.timers.entry(kind) {
            Entry::Occupied(_) => Err(TimerAlreadyArmed { kind }),

            Entry::Vacant(slot) => {
                let id = TimerId::generate();
                let fired = TimerFired {
                    kind,
                    id: id.clone(),
                };
                let sender = self.fired.clone();
                let task = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = sender.send(fired);
                });

                trace!(kind = ?kind, id = %id, delay_ms = delay.as_millis() as u64, "Timer armed");
                slot.insert(ArmedTimer {
                    id: id.clone(),
                    task,
                });
                Ok(id)
            }
        }
    }

    /// Cancel the armed `kind` timer.
    pub fn disarm(&self, kind: TimerKind) -> Result<(), TimerNotArmed> {
        let (_, timer) = self
            .timers
            .remove(&kind)
            .ok_or(TimerNotArmed { kind })?;

        timer.task.abort();
        trace!(kind = ?kind, id = %timer.id, "Timer disarmed");
        Ok(())
    }

    /// Accept a fired tick, releasing its slot.
    ///
    /// Returns `false` for a tick whose timer was disarmed or replaced after it fired; such a
    /// tick must be ignored.
    pub fn take_fired(&self, fired: &TimerFired) -> bool {
        self.timers
            .remove_if(&fired.kind, |_, timer| timer.id == fired.id)
            .is_some()
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.timers.contains_key(&kind)
    }

    pub fn armed_count(&self) -> usize {
        self.timers.len()
    }

    /// Cancel every armed timer.
    pub fn disarm_all(&self) {
        self.timers.retain(|_, timer| {
            timer.task.abort();
            false
        });
    }
}

impl Drop for TimerMap {
    fn drop(&mut self) {
        self.disarm_all();
    }
}
