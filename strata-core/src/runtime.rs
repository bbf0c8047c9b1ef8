//! The dispatcher core: state registry, initialization and the drain loop.
//!
//! `Runtime` is single-threaded by construction: it mutates the current
//! state and two FIFOs with no internal synchronization and assumes exactly
//! one dispatch is in flight. The [`StateMachine`](crate::StateMachine) and
//! [`AsyncStateMachine`](crate::AsyncStateMachine) façades layer the
//! concurrency policy on top.

use core::any::TypeId;
use std::collections::VecDeque;

use tracing::trace;

use crate::event::{short_type_name, Event, PostedEvent};
use crate::reaction::{Reaction, TransitionAction};
use crate::setup::SetupCtx;
use crate::state::{State, StateHandle, StateId, StateNode};

/// User-settable hook invoked at the transition-relevant points with a
/// message and alternating key/value pairs, pre-rendered to strings.
pub type DebugLogger = Box<dyn Fn(&str, &[(&str, &str)]) + Send>;

/// Dispatch-time scope handed to every reaction handler.
///
/// Gives handlers the user context, lets them enqueue follow-up events, and
/// constructs the [`Reaction::Transit`] result. The other results are plain
/// variants: return [`Reaction::Discard`], [`Reaction::Defer`] or
/// [`Reaction::Forward`] directly.
pub struct EventCtx<'a, C> {
    pub(crate) context: &'a mut C,
    pub(crate) posted: &'a mut VecDeque<PostedEvent>,
}

impl<C> EventCtx<'_, C> {
    /// The user context.
    pub fn context(&mut self) -> &mut C {
        self.context
    }

    /// Appends `event` to the posted-events FIFO, behind everything already
    /// queued in the current drain.
    pub fn post_event<E: Event>(&mut self, event: E) {
        self.posted.push_back(PostedEvent::new(event));
    }

    /// A transition to `target` with no action.
    #[must_use]
    pub fn transit(&self, target: StateId) -> Reaction<C> {
        Reaction::Transit { target, action: None }
    }

    /// A transition to `target` running `action` between exits and entries.
    #[must_use]
    pub fn transit_with(&self, target: StateId, action: TransitionAction<C>) -> Reaction<C> {
        Reaction::Transit { target, action: Some(action) }
    }
}

/// How the drain loop disposed of one posted event.
enum Disposition {
    Transited(StateId),
    Discarded,
    Deferred,
}

/// Metadata view of a registered state, passed to find selectors.
pub struct StateDescriptor<'a> {
    pub id: StateId,
    pub name: &'a str,
    type_id: TypeId,
}

impl StateDescriptor<'_> {
    /// True when the state's user type is `S`.
    #[must_use]
    pub fn is<S: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<S>()
    }
}

/// The state-chart engine: registry, current state, user context and the
/// posted/deferred event queues.
///
/// Built in the configuration phase with [`add_state`](Runtime::add_state) /
/// [`add_sub_state`](Runtime::add_sub_state), frozen by
/// [`initialize`](Runtime::initialize), then driven with
/// [`dispatch_event`](Runtime::dispatch_event). Contract violations panic
/// (see the `# Panics` sections); unmatched events are not errors and are
/// silently dropped at the top level.
pub struct Runtime<C> {
    pub(crate) nodes: Vec<StateNode<C>>,
    current: Option<StateId>,
    context: C,
    logger: Option<DebugLogger>,
    initialized: bool,
    posted: VecDeque<PostedEvent>,
    deferred: VecDeque<PostedEvent>,
}

impl<C: 'static> Runtime<C> {
    /// A runtime owning `context`, with no states registered yet.
    pub fn new(context: C) -> Self {
        Self {
            nodes: Vec::new(),
            current: None,
            context,
            logger: None,
            initialized: false,
            posted: VecDeque::new(),
            deferred: VecDeque::new(),
        }
    }

    /// Registers a top-level state.
    ///
    /// # Panics
    /// Panics when called after [`initialize`](Runtime::initialize) or when a
    /// state of the same type is already registered.
    pub fn add_state<S: State<C>>(&mut self, state: S) -> StateId {
        assert!(!self.initialized, "cannot call add_state after initialize");
        self.register(state)
    }

    /// Registers a state as a child of `parent`, marking `parent` as a
    /// super-state.
    ///
    /// # Panics
    /// Panics when called after [`initialize`](Runtime::initialize), when a
    /// state of the same type is already registered, or when `parent` is out
    /// of range.
    pub fn add_sub_state<S: State<C>>(&mut self, state: S, parent: StateId) -> StateId {
        assert!(!self.initialized, "cannot call add_sub_state after initialize");
        // Validate the parent before the child occupies an id.
        self.node(parent);
        let id = self.register(state);
        self.nodes[parent.index()].is_super_state = true;
        self.nodes[id.index()].parent = Some(parent);
        id
    }

    fn register<S: State<C>>(&mut self, state: S) -> StateId {
        let type_id = TypeId::of::<S>();
        assert!(
            !self.nodes.iter().any(|node| node.type_id == type_id),
            "state kind {} is already registered",
            short_type_name::<S>()
        );
        let id = StateId(self.nodes.len());
        let handle = StateHandle::new(state);
        let setup = {
            let handle = handle.clone();
            Box::new(move |setup: &mut SetupCtx<'_, C>| handle.lock().setup(setup))
        };
        self.nodes.push(StateNode {
            id,
            name: String::new(),
            type_id,
            type_name: short_type_name::<S>(),
            user: Box::new(handle),
            setup: Some(setup),
            parent: None,
            is_super_state: false,
            starting_state: None,
            entry: None,
            exit: None,
            reactions: Vec::new(),
        });
        id
    }

    /// Installs the debug-logger hook. May be called at any time.
    pub fn set_debug_logger(&mut self, logger: impl Fn(&str, &[(&str, &str)]) + Send + 'static) {
        self.logger = Some(Box::new(logger));
    }

    /// Runs every state's [`setup`](State::setup), freezes the tree, resolves
    /// `initial` through starting sub-states and executes its entry chain
    /// from the conceptual root down.
    ///
    /// # Panics
    /// Panics when called twice, when `initial` is out of range, or when a
    /// super-state on the resolution path has no starting sub-state.
    pub fn initialize(&mut self, initial: StateId) {
        assert!(!self.initialized, "cannot call initialize more than once");
        self.initialized = true;
        for index in 0..self.nodes.len() {
            let setup_fn = self.nodes[index]
                .setup
                .take()
                .expect("setup shim is present until initialize");
            let mut setup = SetupCtx { runtime: self, state: StateId(index) };
            let hooks = setup_fn(&mut setup);
            let node = &mut self.nodes[index];
            node.entry = hooks.entry;
            node.exit = hooks.exit;
            if node.name.is_empty() {
                node.name = node.type_name.to_owned();
            }
        }
        let target = self.resolve_starting(initial);
        self.enter_chain(target, None);
        self.current = Some(target);
    }

    /// Appends `event` to the posted-events FIFO and drains the queue.
    ///
    /// Reactions run on the caller's thread; events they
    /// [`post_event`](EventCtx::post_event) are handled in the same drain.
    ///
    /// # Panics
    /// Panics when called before [`initialize`](Runtime::initialize), and on
    /// any contract violation raised by a reaction (see module docs).
    pub fn dispatch_event<E: Event>(&mut self, event: E) {
        self.dispatch_erased(PostedEvent::new(event));
    }

    /// Type-erased flavor of [`dispatch_event`](Runtime::dispatch_event),
    /// used by the asynchronous façade's worker.
    pub fn dispatch_erased(&mut self, event: PostedEvent) {
        assert!(self.initialized, "cannot dispatch before initialize");
        self.posted.push_back(event);
        while let Some(head) = self.posted.pop_front() {
            match self.process_event(&head) {
                Disposition::Transited(next) => {
                    let current = self.current.expect("initialized");
                    trace!(
                        from = %self.state_name(current),
                        to = %self.state_name(next),
                        "change state"
                    );
                    if let Some(log) = self.logger.as_deref() {
                        log(
                            "change state",
                            &[
                                ("from", self.state_name(current)),
                                ("to", self.state_name(next)),
                            ],
                        );
                    }
                    self.current = Some(next);
                    // Release deferred events ahead of whatever is still
                    // queued behind the triggering event, in defer order.
                    while let Some(deferred) = self.deferred.pop_back() {
                        self.posted.push_front(deferred);
                    }
                }
                Disposition::Deferred => self.deferred.push_back(head),
                Disposition::Discarded => {}
            }
        }
    }

    pub(crate) fn post_event<E: Event>(&mut self, event: E) {
        self.posted.push_back(PostedEvent::new(event));
    }

    /// Bubbles `event` from the current state up the parent chain and carries
    /// out the first non-forward reaction.
    fn process_event(&mut self, event: &PostedEvent) -> Disposition {
        let current = self.current.expect("initialized");
        let mut active = current;
        loop {
            match self.react(active, event) {
                Reaction::Forward => match self.node(active).parent {
                    Some(parent) => active = parent,
                    // The top state discards.
                    None => return Disposition::Discarded,
                },
                Reaction::Discard => return Disposition::Discarded,
                Reaction::Defer => return Disposition::Deferred,
                Reaction::Transit { target, action } => {
                    return Disposition::Transited(self.run_transition(current, target, action, event));
                }
            }
        }
    }

    /// Invokes the first reaction of `active` whose predicate accepts the
    /// event; no match means [`Reaction::Forward`].
    fn react(&mut self, active: StateId, event: &PostedEvent) -> Reaction<C> {
        let Runtime { nodes, context, posted, logger, .. } = self;
        let node = &mut nodes[active.index()];
        match node.reactions.iter_mut().find(|reaction| (reaction.predicate)(event.payload())) {
            Some(reaction) => {
                trace!(event = event.kind(), state = %node.name, "process event");
                if let Some(log) = logger.as_deref() {
                    log("process event", &[("event", event.kind()), ("state", &node.name)]);
                }
                let mut scope = EventCtx { context, posted };
                (reaction.handler)(&mut scope, event.payload())
            }
            None => {
                trace!(event = event.kind(), state = %node.name, "forward event");
                if let Some(log) = logger.as_deref() {
                    log("forward event", &[("event", event.kind()), ("state", &node.name)]);
                }
                Reaction::Forward
            }
        }
    }

    /// Executes one transition: exit chain up to the boundary, the action,
    /// then the entry chain down to the resolved target.
    ///
    /// The boundary is the least common ancestor of the current state and the
    /// *declared* target, so a transition aimed at a super-state exits and
    /// re-enters it; starting-sub-state resolution only picks the entry
    /// destination.
    fn run_transition(
        &mut self,
        current: StateId,
        target: StateId,
        action: Option<TransitionAction<C>>,
        event: &PostedEvent,
    ) -> StateId {
        let boundary = self.least_common_ancestor(current, target);
        let destination = self.resolve_starting(target);
        self.exit_chain(current, boundary);
        if let Some(action) = action {
            action(&mut self.context, event.payload());
        }
        self.enter_chain(destination, boundary);
        destination
    }

    /// Follows starting sub-states until a non-super-state is reached.
    fn resolve_starting(&self, state: StateId) -> StateId {
        let mut id = state;
        while self.node(id).is_super_state {
            match self.node(id).starting_state {
                Some(next) => id = next,
                None => panic!(
                    "super-state {} cannot become current; set a starting sub-state",
                    self.node(id).name
                ),
            }
        }
        id
    }

    /// Depth of `state`: top-level states are 1, their children 2, and so on.
    fn depth(&self, state: StateId) -> usize {
        let mut level = 0;
        let mut cursor = Some(state);
        while let Some(id) = cursor {
            level += 1;
            cursor = self.node(id).parent;
        }
        level
    }

    /// Deepest strict ancestor shared by both states; `None` is the
    /// conceptual root above the top-level states. Both nodes step up before
    /// every comparison, so a self-transition exits and re-enters its state.
    fn least_common_ancestor(&self, left: StateId, right: StateId) -> Option<StateId> {
        let (mut left, mut right) = (left, right);
        let (left_depth, right_depth) = (self.depth(left), self.depth(right));
        if left_depth > right_depth {
            core::mem::swap(&mut left, &mut right);
        }
        for _ in 0..left_depth.abs_diff(right_depth) {
            right = self.node(right).parent.expect("depth counted the parent chain");
        }
        let mut left = self.node(left).parent;
        let mut right = self.node(right).parent;
        loop {
            match (left, right) {
                (None, None) => return None,
                (Some(l), Some(r)) if l == r => return Some(l),
                (Some(l), Some(r)) => {
                    left = self.node(l).parent;
                    right = self.node(r).parent;
                }
                _ => panic!("state tree is inconsistent"),
            }
        }
    }

    /// Runs exit actions from `from` up to, but not including, `boundary`.
    fn exit_chain(&mut self, from: StateId, boundary: Option<StateId>) {
        let mut cursor = Some(from);
        while cursor != boundary {
            let id = cursor.expect("transition boundary is an ancestor of the source");
            self.run_exit(id);
            cursor = self.node(id).parent;
        }
    }

    /// Runs entry actions from below `boundary` down to `target`, root-first.
    fn enter_chain(&mut self, target: StateId, boundary: Option<StateId>) {
        let mut chain = Vec::new();
        let mut cursor = Some(target);
        while cursor != boundary {
            let id = cursor.expect("transition boundary is an ancestor of the target");
            chain.push(id);
            cursor = self.node(id).parent;
        }
        for id in chain.into_iter().rev() {
            self.run_entry(id);
        }
    }

    fn run_entry(&mut self, id: StateId) {
        let Runtime { nodes, context, .. } = self;
        if let Some(entry) = nodes[id.index()].entry.as_mut() {
            entry(context);
        }
    }

    fn run_exit(&mut self, id: StateId) {
        let Runtime { nodes, context, .. } = self;
        if let Some(exit) = nodes[id.index()].exit.as_mut() {
            exit(context);
        }
    }

    /// The current (leaf) state.
    ///
    /// # Panics
    /// Panics before [`initialize`](Runtime::initialize).
    #[must_use]
    pub fn current_state(&self) -> StateId {
        self.current.expect("state machine is not initialized")
    }

    /// Diagnostic name of `id`.
    ///
    /// # Panics
    /// Panics when `id` is out of range.
    #[must_use]
    pub fn state_name(&self, id: StateId) -> &str {
        &self.node(id).name
    }

    /// First registered state matching `selector`, in registration order.
    ///
    /// # Panics
    /// Panics when no state matches.
    pub fn find_state_id(&self, selector: impl Fn(&StateDescriptor<'_>) -> bool) -> StateId {
        self.try_find_state_id(selector)
            .unwrap_or_else(|| panic!("no registered state matches the selector"))
    }

    /// Id of the state registered with user type `S`.
    ///
    /// # Panics
    /// Panics when no state of type `S` is registered.
    #[must_use]
    pub fn state_id_of<S: 'static>(&self) -> StateId {
        self.try_find_state_id(|descriptor| descriptor.is::<S>())
            .unwrap_or_else(|| panic!("no state of kind {} is registered", short_type_name::<S>()))
    }

    pub(crate) fn try_find_state_id(
        &self,
        selector: impl Fn(&StateDescriptor<'_>) -> bool,
    ) -> Option<StateId> {
        self.nodes
            .iter()
            .find(|node| {
                selector(&StateDescriptor { id: node.id, name: &node.name, type_id: node.type_id })
            })
            .map(|node| node.id)
    }

    /// Shared handle to the user state registered as `id`.
    ///
    /// # Panics
    /// Panics when `id` is out of range or its user type is not `S`.
    #[must_use]
    pub fn state_handle<S: 'static>(&self, id: StateId) -> StateHandle<S> {
        let node = self.node(id);
        node.user
            .downcast_ref::<StateHandle<S>>()
            .unwrap_or_else(|| {
                panic!("state {} is not of kind {}", node.name, short_type_name::<S>())
            })
            .clone()
    }

    /// The user context.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Mutable access to the user context.
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Consumes the runtime, handing the context back.
    pub fn into_context(self) -> C {
        self.context
    }

    pub(crate) fn node(&self, id: StateId) -> &StateNode<C> {
        self.nodes
            .get(id.index())
            .unwrap_or_else(|| panic!("state id {id} is out of range"))
    }
}
