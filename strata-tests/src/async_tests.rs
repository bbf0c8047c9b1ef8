//! Scenarios for the asynchronous façade: queued dispatch, drain on close.

use crate::common::*;

#[tokio::test]
async fn async_stopwatch_drains_before_close_returns() {
    setup_tracing();

    let machine = stopwatch_async_machine();
    machine.dispatch_event(Activate).await.unwrap();
    machine.dispatch_event(StartStop).await.unwrap();
    machine.dispatch_event(Reset).await.unwrap();
    machine.dispatch_event(Deactivate).await.unwrap();

    let context = machine.close().await;
    assert_eq!(context.log, STOPWATCH_LOG);
}

#[tokio::test]
async fn backpressure_does_not_drop_events() {
    setup_tracing();

    // Push several full stopwatch cycles through a queue of capacity 10; the
    // sender waits whenever the worker lags, nothing is lost or reordered.
    let machine = stopwatch_async_machine();
    for _ in 0..25 {
        machine.dispatch_event(Activate).await.unwrap();
        machine.dispatch_event(StartStop).await.unwrap();
        machine.dispatch_event(Reset).await.unwrap();
        machine.dispatch_event(Deactivate).await.unwrap();
    }

    let context = machine.close().await;
    assert_eq!(context.log.len(), STOPWATCH_LOG.len() * 25);
    for cycle in context.log.chunks(4) {
        assert_eq!(cycle, STOPWATCH_LOG.as_slice());
    }
}

struct Tock;
struct Ticker;

impl strata_core::State<u32> for Ticker {
    fn setup(
        &mut self,
        setup: &mut strata_core::SetupCtx<'_, u32>,
    ) -> strata_core::StateHooks<u32> {
        setup.add_transition::<Tock, Ticker>();
        strata_core::StateHooks::none().on_entry(|count| *count += 1)
    }
}

#[tokio::test]
async fn dispatch_handles_on_many_tasks_feed_one_machine() {
    setup_tracing();

    let mut machine = strata_core::AsyncStateMachine::new(0u32);
    let ticker = machine.add_state(Ticker);
    machine.initialize(ticker);

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let handle = machine.dispatch_handle();
        tasks.push(tokio::spawn(async move {
            for _ in 0..5 {
                handle.dispatch_event(Tock).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // Initial entry plus one re-entry per event, however the tasks interleave.
    assert_eq!(machine.close().await, 21);
}
