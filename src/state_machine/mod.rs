pub mod fix;
pub mod readiness;
pub mod tracking;

/// The [`StateMachine`] trait gives the pure decision logic of the tracker a uniform calling
/// convention: feed it [`Input`](StateMachine::Input), then drain
/// [`Output`](StateMachine::Output) until it returns `None`.
///
/// # Functionality
/// Each machine in this module reconciles one data source into state the rest of the
/// application acts on:
///
/// - [`FixMachine`](fix::FixMachine) turns GPS readings into map updates and detects the
///   falling edge of the fix.
/// - [`TrackingMachine`](tracking::TrackingMachine) owns the idle/tracking mode and decides
///   which collar calls and timers a toggle or tick requires.
/// - [`ReadinessMachine`](readiness::ReadinessMachine) gates map loading on the map server
///   answering a probe.
///
/// Outputs are *requests* (relay this event, arm that timer, call that API). The
/// [`Coordinator`](crate::coordinator::Coordinator) performs them and feeds the results back
/// in as new input.
///
/// # Invariants
/// Implementors *must* stay deterministic so they can be driven in tests without a runtime.
///
/// ## No Interior Mutability
/// State changes only through `&mut self`. No [`std::cell`] containers, no [`std::sync`]
/// locks, no reference counted pointers.
///
/// ## No IO
/// No sockets, files or serial ports. Anything learned from the outside world, including
/// the result of a remote call, arrives as input.
///
/// ### No System Time
/// Never read [`std::time::Instant::now`] or [`std::time::SystemTime`]. Durations a machine
/// hands out (timer delays) come from configuration passed in at construction; timestamps
/// come in with the input that carries them.
///
/// ## No Concurrency, No Async, No Blocking
/// Machines never spawn, await or sleep. Timers are requested through output and the
/// coordinator reports back when they fire.
///
/// # Side Effects
/// Logging through `tracing` is allowed as long as no decision depends on it.
///
/// # Example
/// ```ignore
/// machine.process_input(TrackingInput::Toggle);
/// while let Some(output) = machine.poll_output() {
///     match output {
///         TrackingOutput::SetLostMode(enabled) => collar.set_lost_mode(enabled).await?,
///         TrackingOutput::Arm(kind, delay) => timers.arm(kind, delay)?,
///         // ...
///     }
/// }
/// ```
pub trait StateMachine {
    /// The type of input that is [processed](StateMachine::process_input) by the state machine.
    ///
    /// Usually an enum with one variant per kind of event the machine reacts to.
    type Input;
    /// The type of output that is [polled](StateMachine::poll_output) from the state machine.
    ///
    /// Usually an enum with one variant per action the machine can request.
    type Output;

    /// Process the provided `input` into the state machine.
    fn process_input(&mut self, input: Self::Input);

    /// Poll the state machine for output, returning the oldest pending output if present.
    fn poll_output(&mut self) -> Option<Self::Output>;
}
