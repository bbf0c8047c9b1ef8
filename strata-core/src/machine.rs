//! Synchronous façade: a mutex around the dispatcher core.
//!
//! Configuration calls and dispatch calls are both serialized by the one
//! lock. Rust's aliasing rules make a dual-lock split (a setup lock next to
//! a dispatch lock) redundant: every operation needs exclusive access to the
//! core, and the two phases never overlap in a correct program.

use std::io;
use std::sync::{Mutex, MutexGuard};

use crate::diagram::UmlDiagramType;
use crate::event::Event;
use crate::runtime::Runtime;
use crate::state::{State, StateId};

/// Thread-safe state machine for caller-driven dispatch.
///
/// Wraps a [`Runtime`] in a mutex so any thread may configure (before
/// initialization) or dispatch (after it). Events dispatched concurrently
/// from several threads are processed one at a time, each drain running to
/// completion before the next begins.
///
/// ```rust
/// use strata_core::{SetupCtx, State, StateHooks, StateMachine};
///
/// struct Halted;
/// struct Moving;
/// struct Go;
///
/// impl State<()> for Halted {
///     fn setup(&mut self, setup: &mut SetupCtx<'_, ()>) -> StateHooks<()> {
///         setup.add_transition::<Go, Moving>();
///         StateHooks::none()
///     }
/// }
/// # impl State<()> for Moving {
/// #     fn setup(&mut self, _: &mut SetupCtx<'_, ()>) -> StateHooks<()> { StateHooks::none() }
/// # }
///
/// let machine = StateMachine::new(());
/// let halted = machine.add_state(Halted);
/// machine.add_state(Moving);
/// machine.initialize(halted);
/// machine.dispatch_event(Go);
/// ```
pub struct StateMachine<C> {
    runtime: Mutex<Runtime<C>>,
}

impl<C: 'static> StateMachine<C> {
    /// A machine owning `context`, ready for configuration.
    pub fn new(context: C) -> Self {
        Self { runtime: Mutex::new(Runtime::new(context)) }
    }

    /// Registers a top-level state. See [`Runtime::add_state`].
    pub fn add_state<S: State<C>>(&self, state: S) -> StateId {
        self.lock().add_state(state)
    }

    /// Registers a sub-state of `parent`. See [`Runtime::add_sub_state`].
    pub fn add_sub_state<S: State<C>>(&self, state: S, parent: StateId) -> StateId {
        self.lock().add_sub_state(state, parent)
    }

    /// Freezes the tree and enters the initial state. See
    /// [`Runtime::initialize`].
    pub fn initialize(&self, initial: StateId) {
        self.lock().initialize(initial);
    }

    /// Dispatches one event, draining the posted queue before returning. See
    /// [`Runtime::dispatch_event`].
    pub fn dispatch_event<E: Event>(&self, event: E) {
        self.lock().dispatch_event(event);
    }

    /// Installs the debug-logger hook.
    pub fn set_debug_logger(&self, logger: impl Fn(&str, &[(&str, &str)]) + Send + 'static) {
        self.lock().set_debug_logger(logger);
    }

    /// The current (leaf) state.
    pub fn current_state(&self) -> StateId {
        self.lock().current_state()
    }

    /// Runs `f` with exclusive access to the user context.
    pub fn with_context<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(self.lock().context_mut())
    }

    /// Writes a PlantUML rendering of the configured chart to `out`.
    ///
    /// # Errors
    /// Propagates write errors from `out`.
    pub fn write_uml_diagram<W: io::Write>(
        &self,
        out: &mut W,
        diagram: UmlDiagramType,
    ) -> io::Result<()> {
        self.lock().write_uml_diagram(out, diagram)
    }

    /// Consumes the machine, handing the context back.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn into_context(self) -> C {
        self.runtime.into_inner().unwrap().into_context()
    }

    /// # Panics
    /// Panics if the lock is poisoned, which means a previous configuration
    /// or dispatch call already panicked; the machine is not recoverable.
    fn lock(&self) -> MutexGuard<'_, Runtime<C>> {
        self.runtime.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SetupCtx, StateHooks};
    use std::sync::Arc;
    use std::thread;

    #[derive(Default)]
    struct Counters {
        flips: u32,
    }

    struct Flip;
    struct HeadsUp;
    struct TailsUp;

    impl State<Counters> for HeadsUp {
        fn setup(&mut self, setup: &mut SetupCtx<'_, Counters>) -> StateHooks<Counters> {
            setup.add_transition::<Flip, TailsUp>();
            StateHooks::none().on_entry(|ctx: &mut Counters| ctx.flips += 1)
        }
    }

    impl State<Counters> for TailsUp {
        fn setup(&mut self, setup: &mut SetupCtx<'_, Counters>) -> StateHooks<Counters> {
            setup.add_transition::<Flip, HeadsUp>();
            StateHooks::none().on_entry(|ctx: &mut Counters| ctx.flips += 1)
        }
    }

    #[test]
    fn dispatch_through_the_facade() {
        let machine = StateMachine::new(Counters::default());
        let heads = machine.add_state(HeadsUp);
        let tails = machine.add_state(TailsUp);
        machine.initialize(heads);
        machine.dispatch_event(Flip);
        assert_eq!(machine.current_state(), tails);
        // Initial entry plus one transition.
        assert_eq!(machine.with_context(|ctx| ctx.flips), 2);
    }

    #[test]
    fn concurrent_dispatch_is_serialized() {
        let machine = Arc::new(StateMachine::new(Counters::default()));
        let heads = machine.add_state(HeadsUp);
        machine.add_state(TailsUp);
        machine.initialize(heads);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let machine = Arc::clone(&machine);
                thread::spawn(move || {
                    for _ in 0..25 {
                        machine.dispatch_event(Flip);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Every flip transited exactly once: initial entry + 100 transitions.
        assert_eq!(machine.with_context(|ctx| ctx.flips), 101);
        // 100 flips land back on the initial side.
        assert_eq!(machine.current_state(), heads);
    }

    #[test]
    fn into_context_returns_ownership() {
        let machine = StateMachine::new(Counters::default());
        let heads = machine.add_state(HeadsUp);
        machine.add_state(TailsUp);
        machine.initialize(heads);
        let counters = machine.into_context();
        assert_eq!(counters.flips, 1);
    }
}
