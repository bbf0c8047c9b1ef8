//! Asynchronous façade: a bounded event queue drained by one worker task.
//!
//! Configuration happens on the owner (`&mut self`); `initialize` moves the
//! dispatcher core into a Tokio task that consumes a bounded mpsc channel one
//! event at a time, which keeps the core single-threaded without any lock.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event::{Event, PostedEvent};
use crate::runtime::Runtime;
use crate::state::{State, StateId};

/// Capacity of the posted-event channel between callers and the worker.
pub const EVENT_QUEUE_CAPACITY: usize = 10;

/// Failed to hand an event to the dispatcher worker.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The worker is gone: it panicked while processing an earlier event.
    /// The event is handed back.
    #[error("event queue is closed: {0:?} was not dispatched")]
    Closed(PostedEvent),
}

/// Clonable sending half of the event queue.
///
/// Cheap to clone and `Send + Sync`, so any number of tasks can feed one
/// machine while the owner keeps the right to [`close`] it.
///
/// [`close`]: AsyncStateMachine::close
#[derive(Clone)]
pub struct DispatchHandle {
    events: mpsc::Sender<PostedEvent>,
}

impl DispatchHandle {
    /// Enqueues `event` for the worker, waiting while the queue is full.
    ///
    /// # Errors
    /// Returns [`DispatchError::Closed`] when the worker has terminated.
    pub async fn dispatch_event<E: Event>(&self, event: E) -> Result<(), DispatchError> {
        self.events
            .send(PostedEvent::new(event))
            .await
            .map_err(|mpsc::error::SendError(event)| DispatchError::Closed(event))
    }
}

/// State machine with internally queued, asynchronous dispatch.
///
/// Configured like [`StateMachine`](crate::StateMachine), but `initialize`
/// spawns a worker that owns the dispatcher core; `dispatch_event` merely
/// enqueues and applies backpressure when the queue is full. [`close`]
/// drains the queue, joins the worker and returns the user context.
///
/// [`close`]: AsyncStateMachine::close
pub struct AsyncStateMachine<C> {
    runtime: Option<Runtime<C>>,
    events: Option<mpsc::Sender<PostedEvent>>,
    worker: Option<JoinHandle<Runtime<C>>>,
}

impl<C: Send + 'static> AsyncStateMachine<C> {
    /// A machine owning `context`, ready for configuration.
    pub fn new(context: C) -> Self {
        Self { runtime: Some(Runtime::new(context)), events: None, worker: None }
    }

    /// Registers a top-level state. See [`Runtime::add_state`].
    ///
    /// # Panics
    /// Panics when called after [`initialize`](AsyncStateMachine::initialize).
    pub fn add_state<S: State<C>>(&mut self, state: S) -> StateId {
        self.runtime_mut().add_state(state)
    }

    /// Registers a sub-state of `parent`. See [`Runtime::add_sub_state`].
    ///
    /// # Panics
    /// Panics when called after [`initialize`](AsyncStateMachine::initialize).
    pub fn add_sub_state<S: State<C>>(&mut self, state: S, parent: StateId) -> StateId {
        self.runtime_mut().add_sub_state(state, parent)
    }

    /// Installs the debug-logger hook; the worker owns it afterwards, so the
    /// hook must be set before [`initialize`](AsyncStateMachine::initialize).
    ///
    /// # Panics
    /// Panics when called after [`initialize`](AsyncStateMachine::initialize).
    pub fn set_debug_logger(&mut self, logger: impl Fn(&str, &[(&str, &str)]) + Send + 'static) {
        self.runtime_mut().set_debug_logger(logger);
    }

    /// Enters the initial state, then starts the dispatcher worker.
    ///
    /// # Panics
    /// Panics on the contract violations of [`Runtime::initialize`], when
    /// called twice, or when called outside a Tokio runtime.
    pub fn initialize(&mut self, initial: StateId) {
        let mut runtime = self.runtime.take().expect("cannot call initialize more than once");
        runtime.initialize(initial);
        let (events, mut queue) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        self.worker = Some(tokio::spawn(async move {
            while let Some(event) = queue.recv().await {
                runtime.dispatch_erased(event);
            }
            runtime
        }));
        self.events = Some(events);
    }

    /// Enqueues `event` for the worker, waiting while the queue is full.
    ///
    /// # Errors
    /// Returns [`DispatchError::Closed`] when the worker has terminated.
    ///
    /// # Panics
    /// Panics when called before [`initialize`](AsyncStateMachine::initialize).
    pub async fn dispatch_event<E: Event>(&self, event: E) -> Result<(), DispatchError> {
        self.dispatch_handle().dispatch_event(event).await
    }

    /// A clonable handle other tasks can dispatch through.
    ///
    /// # Panics
    /// Panics when called before [`initialize`](AsyncStateMachine::initialize).
    #[must_use]
    pub fn dispatch_handle(&self) -> DispatchHandle {
        let events = self.events.as_ref().expect("cannot dispatch before initialize");
        DispatchHandle { events: events.clone() }
    }

    /// Closes the queue, waits for the worker to process everything already
    /// enqueued, and returns the user context.
    ///
    /// Outstanding [`DispatchHandle`] clones keep the queue open: the worker
    /// drains until the last of them is dropped.
    ///
    /// # Panics
    /// Panics when called before [`initialize`](AsyncStateMachine::initialize);
    /// resumes the worker's panic on this task if a reaction panicked.
    pub async fn close(mut self) -> C {
        drop(self.events.take());
        let worker = self.worker.take().expect("cannot close before initialize");
        match worker.await {
            Ok(runtime) => runtime.into_context(),
            Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
            Err(error) => panic!("dispatcher worker was cancelled: {error}"),
        }
    }

    fn runtime_mut(&mut self) -> &mut Runtime<C> {
        self.runtime
            .as_mut()
            .expect("the chart is frozen once initialize has been called")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SetupCtx, StateHooks};
    use tokio::time::{sleep, Duration};

    #[derive(Default)]
    struct Counters {
        flips: u32,
    }

    struct Flip;
    struct Explode;

    struct HeadsUp;
    struct TailsUp;

    impl State<Counters> for HeadsUp {
        fn setup(&mut self, setup: &mut SetupCtx<'_, Counters>) -> StateHooks<Counters> {
            setup.add_transition::<Flip, TailsUp>();
            setup.add_custom_reaction::<Explode>(|_scope, _event: &Explode| {
                panic!("reaction blew up")
            });
            StateHooks::none().on_entry(|ctx: &mut Counters| ctx.flips += 1)
        }
    }

    impl State<Counters> for TailsUp {
        fn setup(&mut self, setup: &mut SetupCtx<'_, Counters>) -> StateHooks<Counters> {
            setup.add_transition::<Flip, HeadsUp>();
            StateHooks::none().on_entry(|ctx: &mut Counters| ctx.flips += 1)
        }
    }

    fn make_machine() -> AsyncStateMachine<Counters> {
        let mut machine = AsyncStateMachine::new(Counters::default());
        let heads = machine.add_state(HeadsUp);
        machine.add_state(TailsUp);
        machine.initialize(heads);
        machine
    }

    #[tokio::test]
    async fn close_drains_already_enqueued_events() {
        let machine = make_machine();
        for _ in 0..20 {
            machine.dispatch_event(Flip).await.unwrap();
        }
        let counters = machine.close().await;
        // Initial entry plus twenty transitions, none dropped.
        assert_eq!(counters.flips, 21);
    }

    #[tokio::test]
    async fn worker_death_turns_into_a_dispatch_error() {
        let machine = make_machine();
        machine.dispatch_event(Explode).await.unwrap();

        let mut closed = false;
        for _ in 0..50 {
            if machine.dispatch_event(Flip).await.is_err() {
                closed = true;
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert!(closed, "sends should fail once the worker is gone");
    }

    #[tokio::test]
    #[should_panic(expected = "reaction blew up")]
    async fn close_resumes_a_worker_panic() {
        let machine = make_machine();
        let _ = machine.dispatch_event(Explode).await;
        let _ = machine.close().await;
    }

    #[test]
    #[should_panic(expected = "frozen once initialize")]
    fn configuration_is_rejected_after_initialize() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let _guard = runtime.enter();
        let mut machine = make_machine();
        machine.add_state(ExtraState);
    }

    struct ExtraState;

    impl State<Counters> for ExtraState {
        fn setup(&mut self, _setup: &mut SetupCtx<'_, Counters>) -> StateHooks<Counters> {
            StateHooks::none()
        }
    }
}
