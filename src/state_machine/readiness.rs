use std::collections::VecDeque;
use std::time::Duration;

use super::StateMachine;
use crate::timer::TimerKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Not started yet.
    Waiting,
    Probing,
    /// The server answered; the gate never probes again.
    Ready,
}

/// One-shot startup gate that holds the map view back until the map server answers.
pub struct ReadinessMachine {
    state: Readiness,
    interval: Duration,
    probes: u32,
    pending: VecDeque<ReadinessOutput>,
}

impl ReadinessMachine {
    pub fn new(interval: Duration) -> Self {
        Self {
            state: Readiness::Waiting,
            interval,
            probes: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn state(&self) -> Readiness {
        self.state
    }

    /// Number of probe results seen so far.
    pub fn probes(&self) -> u32 {
        self.probes
    }

    fn start(&mut self) {
        if self.state == Readiness::Waiting {
            self.state = Readiness::Probing;
            self.pending
                .push_back(ReadinessOutput::Arm(TimerKind::ServerProbe, self.interval));
        }
    }

    fn probe_due(&mut self) {
        if self.state == Readiness::Probing {
            self.pending.push_back(ReadinessOutput::Probe);
        }
    }

    fn probe_result(&mut self, up: bool) {
        if self.state != Readiness::Probing {
            return;
        }
        self.probes += 1;

        if up {
            self.state = Readiness::Ready;
            self.pending.push_back(ReadinessOutput::LoadMap);
        } else {
            self.pending
                .push_back(ReadinessOutput::Arm(TimerKind::ServerProbe, self.interval));
        }
    }
}

pub enum ReadinessInput {
    Start,
    ProbeDue,
    ProbeResult(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessOutput {
    Arm(TimerKind, Duration),
    Probe,
    /// Load the map view and start the device position updates.
    LoadMap,
}

impl StateMachine for ReadinessMachine {
    type Input = ReadinessInput;
    type Output = ReadinessOutput;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            ReadinessInput::Start => self.start(),
            ReadinessInput::ProbeDue => self.probe_due(),
            ReadinessInput::ProbeResult(up) => self.probe_result(up),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.pending.pop_front()
    }
}
