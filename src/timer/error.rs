use super::TimerKind;

/// Indicates that a timer could not be armed because one of the same kind is already active.
#[derive(Debug, thiserror::Error)]
#[error("a {kind:?} timer is already armed")]
pub struct TimerAlreadyArmed {
    pub kind: TimerKind,
}

/// Indicates that a timer could not be disarmed because none of that kind is active.
#[derive(Debug, thiserror::Error)]
#[error("no {kind:?} timer is armed")]
pub struct TimerNotArmed {
    pub kind: TimerKind,
}
