//! Integration and property tests for strata
//!
//! This crate contains end-to-end scenario tests and the heavier test
//! dependencies (proptest, tokio's multi-threaded runtime) that shouldn't be
//! part of the core crate's build.

#![cfg(test)]

pub mod async_tests;
pub mod integration;
pub mod property_tests;

/// Common test utilities and fixtures
pub mod common {
    use strata_core::{AsyncStateMachine, SetupCtx, State, StateHooks, StateMachine};

    /// Setup tracing for tests
    pub fn setup_tracing() {
        use tracing_subscriber::{fmt, EnvFilter};

        let _ = fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    // The stopwatch chart: `Active` is a super-state entered at `Stopped`;
    // `Reset` targets `Active` itself and re-enters it.

    pub struct Activate;
    pub struct Deactivate;
    pub struct StartStop;
    pub struct Reset;

    #[derive(Default)]
    pub struct StopwatchContext {
        pub log: Vec<&'static str>,
    }

    impl StopwatchContext {
        fn start_counter(&mut self) {
            self.log.push("Start Counter");
        }

        fn stop_counter(&mut self) {
            self.log.push("Stop Counter");
        }

        fn reset_counter(&mut self) {
            self.log.push("Reset Counter");
        }
    }

    pub struct Idle;

    impl State<StopwatchContext> for Idle {
        fn setup(
            &mut self,
            setup: &mut SetupCtx<'_, StopwatchContext>,
        ) -> StateHooks<StopwatchContext> {
            setup.add_transition::<Activate, Active>();
            StateHooks::none()
        }
    }

    pub struct Active;

    impl State<StopwatchContext> for Active {
        fn setup(
            &mut self,
            setup: &mut SetupCtx<'_, StopwatchContext>,
        ) -> StateHooks<StopwatchContext> {
            let starting = setup.state_id_of::<Stopped>();
            setup.set_starting_state(starting);
            setup.add_transition::<Deactivate, Idle>();
            setup.add_transition::<Reset, Active>();
            StateHooks::none().on_entry(StopwatchContext::reset_counter)
        }
    }

    pub struct Stopped;

    impl State<StopwatchContext> for Stopped {
        fn setup(
            &mut self,
            setup: &mut SetupCtx<'_, StopwatchContext>,
        ) -> StateHooks<StopwatchContext> {
            setup.add_transition::<StartStop, Running>();
            StateHooks::none()
        }
    }

    pub struct Running;

    impl State<StopwatchContext> for Running {
        fn setup(
            &mut self,
            setup: &mut SetupCtx<'_, StopwatchContext>,
        ) -> StateHooks<StopwatchContext> {
            setup.add_transition::<StartStop, Stopped>();
            StateHooks::none()
                .on_entry(StopwatchContext::start_counter)
                .on_exit(StopwatchContext::stop_counter)
        }
    }

    /// Expected counter log after Activate, StartStop, Reset, Deactivate.
    pub const STOPWATCH_LOG: [&str; 4] =
        ["Reset Counter", "Start Counter", "Stop Counter", "Reset Counter"];

    pub fn stopwatch_machine() -> StateMachine<StopwatchContext> {
        let machine = StateMachine::new(StopwatchContext::default());
        let idle = machine.add_state(Idle);
        let active = machine.add_state(Active);
        machine.add_sub_state(Stopped, active);
        machine.add_sub_state(Running, active);
        machine.initialize(idle);
        machine
    }

    /// Must be called from within a Tokio runtime.
    pub fn stopwatch_async_machine() -> AsyncStateMachine<StopwatchContext> {
        let mut machine = AsyncStateMachine::new(StopwatchContext::default());
        let idle = machine.add_state(Idle);
        let active = machine.add_state(Active);
        machine.add_sub_state(Stopped, active);
        machine.add_sub_state(Running, active);
        machine.initialize(idle);
        machine
    }
}
