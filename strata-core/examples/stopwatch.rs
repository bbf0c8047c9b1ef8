//! Stopwatch statechart driven through the synchronous façade.
//!
//! `Active` is a super-state with `Stopped` as its starting sub-state;
//! `Reset` targets `Active` itself, which re-enters it and resets the
//! counter. Expected output:
//!
//! ```text
//! Reset Counter
//! Start Counter
//! Stop Counter
//! Reset Counter
//! ```

use strata_core::{SetupCtx, State, StateHooks, StateMachine};

struct Activate;
struct Deactivate;
struct StartStop;
struct Reset;

#[derive(Default)]
struct StopwatchContext;

impl StopwatchContext {
    fn start_counter(&self) {
        println!("Start Counter");
    }

    fn stop_counter(&self) {
        println!("Stop Counter");
    }

    fn reset_counter(&self) {
        println!("Reset Counter");
    }
}

struct Idle;

impl State<StopwatchContext> for Idle {
    fn setup(&mut self, setup: &mut SetupCtx<'_, StopwatchContext>) -> StateHooks<StopwatchContext> {
        setup.add_transition::<Activate, Active>();
        StateHooks::none()
    }
}

struct Active;

impl State<StopwatchContext> for Active {
    fn setup(&mut self, setup: &mut SetupCtx<'_, StopwatchContext>) -> StateHooks<StopwatchContext> {
        let starting = setup.state_id_of::<Stopped>();
        setup.set_starting_state(starting);
        setup.add_transition::<Deactivate, Idle>();
        setup.add_transition::<Reset, Active>();
        StateHooks::none().on_entry(|ctx: &mut StopwatchContext| ctx.reset_counter())
    }
}

struct Stopped;

impl State<StopwatchContext> for Stopped {
    fn setup(&mut self, setup: &mut SetupCtx<'_, StopwatchContext>) -> StateHooks<StopwatchContext> {
        setup.add_transition::<StartStop, Running>();
        StateHooks::none()
    }
}

struct Running;

impl State<StopwatchContext> for Running {
    fn setup(&mut self, setup: &mut SetupCtx<'_, StopwatchContext>) -> StateHooks<StopwatchContext> {
        setup.add_transition::<StartStop, Stopped>();
        StateHooks::none()
            .on_entry(|ctx: &mut StopwatchContext| ctx.start_counter())
            .on_exit(|ctx: &mut StopwatchContext| ctx.stop_counter())
    }
}

fn main() {
    let machine = StateMachine::new(StopwatchContext);
    let idle = machine.add_state(Idle);
    let active = machine.add_state(Active);
    machine.add_sub_state(Stopped, active);
    machine.add_sub_state(Running, active);
    machine.initialize(idle);

    machine.dispatch_event(Activate); // Idle -> Active, lands on Stopped
    machine.dispatch_event(StartStop); // Stopped -> Running
    machine.dispatch_event(Reset); // Running -> Active, back to Stopped
    machine.dispatch_event(Deactivate); // Stopped -> Idle
}
