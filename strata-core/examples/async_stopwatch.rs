//! The stopwatch chart again, driven through the asynchronous façade: events
//! are queued to the dispatcher worker and `close` waits for the drain.
//! Prints the same four counter lines as the `stopwatch` example.

use strata_core::{AsyncStateMachine, DispatchError, SetupCtx, State, StateHooks};

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

#[tokio::main]
async fn main() -> Result<(), DispatchError> {
    let mut machine = AsyncStateMachine::new(StopwatchContext);
    let idle = machine.add_state(Idle);
    let active = machine.add_state(Active);
    machine.add_sub_state(Stopped, active);
    machine.add_sub_state(Running, active);
    machine.initialize(idle);

    machine.dispatch_event(Activate).await?;
    machine.dispatch_event(StartStop).await?;
    machine.dispatch_event(Reset).await?;
    machine.dispatch_event(Deactivate).await?;
    machine.close().await; // waits until every queued event is processed
    Ok(())
}
