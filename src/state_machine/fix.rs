use std::collections::VecDeque;

use super::StateMachine;
use crate::gps::{FixQuality, Position};

/// Reconciles GPS readings into map updates.
///
/// A reading with at least a 2D fix is relayed. The transition from fix to no fix produces one
/// [`FixOutput::ClearLocation`]; further readings without a fix produce none.
pub struct FixMachine {
    has_fix: bool,
    fix: FixQuality,
    pending: VecDeque<FixOutput>,
}

impl FixMachine {
    pub fn new() -> Self {
        Self {
            has_fix: false,
            fix: FixQuality::NoFix,
            pending: VecDeque::new(),
        }
    }

    pub fn has_fix(&self) -> bool {
        self.has_fix
    }

    /// Fix quality of the latest reading.
    pub fn fix(&self) -> FixQuality {
        self.fix
    }

    fn process_reading(&mut self, position: Position) {
        self.fix = position.fix;
        self.pending.push_back(FixOutput::FixStatus(position.fix));

        if position.fix.has_fix() {
            self.has_fix = true;
            self.pending.push_back(FixOutput::Relay(position));
        } else if self.has_fix {
            self.has_fix = false;
            self.pending.push_back(FixOutput::ClearLocation);
        }
    }
}

impl Default for FixMachine {
    fn default() -> Self {
        Self::new()
    }
}

pub enum FixInput {
    Reading(Position),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FixOutput {
    /// Fix indicator for this reading, emitted for every reading.
    FixStatus(FixQuality),
    Relay(Position),
    ClearLocation,
}

impl StateMachine for FixMachine {
    type Input = FixInput;
    type Output = FixOutput;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            FixInput::Reading(position) => self.process_reading(position),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.pending.pop_front()
    }
}
