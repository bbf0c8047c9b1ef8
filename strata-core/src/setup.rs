//! Configuration-time scope passed to [`State::setup`].

use crate::event::Event;
use crate::reaction::{transition_action, EventReaction, Reaction, UmlNote};
use crate::runtime::{Runtime, StateDescriptor};
use crate::state::{StateHandle, StateId};
#[cfg(test)]
use crate::state::State;

/// The proxy a state uses to declare itself during
/// [`Runtime::initialize`]: reactions, starting sub-state, name, and lookups
/// against the (fully registered, still unfrozen) tree.
///
/// Type-directed lookups happen here, once per registration: the ids they
/// produce are cached inside reaction closures, so the dispatch path never
/// searches the registry.
pub struct SetupCtx<'rt, C> {
    pub(crate) runtime: &'rt mut Runtime<C>,
    pub(crate) state: StateId,
}

impl<C: 'static> SetupCtx<'_, C> {
    /// Id of the state being set up.
    #[must_use]
    pub fn state_id(&self) -> StateId {
        self.state
    }

    /// Overrides the diagnostic name, which otherwise defaults to the user
    /// type's name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.runtime.nodes[self.state.index()].name = name.into();
    }

    /// The user context.
    pub fn context(&mut self) -> &mut C {
        self.runtime.context_mut()
    }

    /// Appends `event` to the posted-events FIFO; it is processed at the
    /// front of the first dispatch after initialization completes.
    pub fn post_event<E: Event>(&mut self, event: E) {
        self.runtime.post_event(event);
    }

    /// First registered state matching `selector`.
    ///
    /// # Panics
    /// Panics when no state matches.
    pub fn find_state_id(&self, selector: impl Fn(&StateDescriptor<'_>) -> bool) -> StateId {
        self.runtime.find_state_id(selector)
    }

    /// Id of the state registered with user type `S`.
    ///
    /// # Panics
    /// Panics when no state of type `S` is registered.
    #[must_use]
    pub fn state_id_of<S: 'static>(&self) -> StateId {
        self.runtime.state_id_of::<S>()
    }

    /// Declares which child is entered when a transition targets this state.
    ///
    /// # Panics
    /// Panics when `starting` is not a direct child of this state.
    pub fn set_starting_state(&mut self, starting: StateId) {
        assert!(
            self.runtime.node(starting).parent == Some(self.state),
            "starting state {} must be a direct child of {}",
            starting,
            self.state,
        );
        self.runtime.nodes[self.state.index()].starting_state = Some(starting);
    }

    /// Handle to the ancestor registered as `ancestor`, typed as `A`.
    ///
    /// The handle may be captured by reactions and locked at dispatch time to
    /// reach the ancestor's user state.
    ///
    /// # Panics
    /// Panics when `ancestor` is not on this state's parent chain, or when
    /// its user type is not `A`.
    #[must_use]
    pub fn ancestor<A: 'static>(&self, ancestor: StateId) -> StateHandle<A> {
        let mut cursor = self.runtime.node(self.state).parent;
        while let Some(id) = cursor {
            if id == ancestor {
                return self.runtime.state_handle::<A>(id);
            }
            cursor = self.runtime.node(id).parent;
        }
        panic!(
            "state {} is not an ancestor of {}",
            ancestor,
            self.state,
        );
    }

    /// Type-directed flavor of [`ancestor`](SetupCtx::ancestor): finds the
    /// state registered with user type `A` and checks it is an ancestor.
    ///
    /// # Panics
    /// Panics when no state of type `A` is registered or it is not an
    /// ancestor of this state.
    #[must_use]
    pub fn find_ancestor<A: 'static>(&self) -> StateHandle<A> {
        self.ancestor::<A>(self.state_id_of::<A>())
    }

    /// Appends a reaction to this state's table. Reactions are matched in
    /// declaration order.
    pub fn add_reaction(&mut self, reaction: EventReaction<C>) {
        self.runtime.nodes[self.state.index()].reactions.push(reaction);
    }

    /// On event kind `E`, transit to the state of type `T`.
    pub fn add_transition<E: Event, T: 'static>(&mut self) {
        let target = self.state_id_of::<T>();
        self.add_transition_to::<E>(target);
    }

    /// On event kind `E`, transit to the state of type `T`, running `action`
    /// between the exit and entry chains.
    pub fn add_transition_with<E: Event, T: 'static>(
        &mut self,
        action: impl Fn(&mut C, &E) + Send + Sync + 'static,
    ) {
        let target = self.state_id_of::<T>();
        let action = transition_action(action);
        self.add_reaction(
            EventReaction::new::<E>(move |scope, _event| {
                scope.transit_with(target, action.clone())
            })
            .with_note(UmlNote::transit(target).with_action("With Action")),
        );
    }

    /// On event kind `E`, transit to `target` (id-directed flavor).
    pub fn add_transition_to<E: Event>(&mut self, target: StateId) {
        self.add_reaction(
            EventReaction::new::<E>(move |scope, _event| scope.transit(target))
                .with_note(UmlNote::transit(target)),
        );
    }

    /// On event kind `E`, drop the event without bubbling.
    pub fn add_discard<E: Event>(&mut self) {
        self.add_reaction(
            EventReaction::new::<E>(|_scope, _event| Reaction::Discard)
                .with_note(UmlNote::discard()),
        );
    }

    /// On event kind `E`, park the event until the next state change.
    pub fn add_defer<E: Event>(&mut self) {
        self.add_reaction(
            EventReaction::new::<E>(|_scope, _event| Reaction::Defer).with_note(UmlNote::defer()),
        );
    }

    /// On event kind `E`, run `handler`; guards live inside the handler,
    /// which returns any [`Reaction`].
    pub fn add_custom_reaction<E: Event>(
        &mut self,
        handler: impl FnMut(&mut crate::EventCtx<'_, C>, &E) -> Reaction<C> + Send + 'static,
    ) {
        self.add_reaction(EventReaction::new::<E>(handler));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateHooks;

    #[derive(Default)]
    struct Ctx {
        root_seen_from_leaf: bool,
    }

    struct Root {
        marker: u8,
    }

    struct Leaf;

    impl State<Ctx> for Root {
        fn setup(&mut self, setup: &mut SetupCtx<'_, Ctx>) -> StateHooks<Ctx> {
            setup.set_name("root");
            setup.set_starting_state(setup.state_id_of::<Leaf>());
            StateHooks::none()
        }
    }

    impl State<Ctx> for Leaf {
        fn setup(&mut self, setup: &mut SetupCtx<'_, Ctx>) -> StateHooks<Ctx> {
            let root = setup.find_ancestor::<Root>();
            setup.context().root_seen_from_leaf = root.with(|root| root.marker) == 7;
            StateHooks::none()
        }
    }

    #[test]
    fn setup_wires_names_starting_state_and_ancestors() {
        let mut runtime = Runtime::new(Ctx::default());
        let root = runtime.add_state(Root { marker: 7 });
        let leaf = runtime.add_sub_state(Leaf, root);
        runtime.initialize(root);

        assert_eq!(runtime.state_name(root), "root");
        assert_eq!(runtime.state_name(leaf), "Leaf");
        assert_eq!(runtime.current_state(), leaf);
        assert!(runtime.context().root_seen_from_leaf);
    }

    struct Orphan;

    impl State<Ctx> for Orphan {
        fn setup(&mut self, setup: &mut SetupCtx<'_, Ctx>) -> StateHooks<Ctx> {
            // Not a child of anything: declaring a starting state must fail.
            let own = setup.state_id();
            setup.set_starting_state(own);
            StateHooks::none()
        }
    }

    #[test]
    #[should_panic(expected = "must be a direct child")]
    fn starting_state_must_be_direct_child() {
        let mut runtime = Runtime::new(Ctx::default());
        let orphan = runtime.add_state(Orphan);
        runtime.initialize(orphan);
    }

    struct Stranger;

    impl State<Ctx> for Stranger {
        fn setup(&mut self, setup: &mut SetupCtx<'_, Ctx>) -> StateHooks<Ctx> {
            let _ = setup.find_ancestor::<Root>();
            StateHooks::none()
        }
    }

    #[test]
    #[should_panic(expected = "is not an ancestor of")]
    fn ancestor_lookup_rejects_non_ancestors() {
        let mut runtime = Runtime::new(Ctx::default());
        let root = runtime.add_state(Root { marker: 0 });
        let _leaf = runtime.add_sub_state(Leaf, root);
        runtime.add_state(Stranger);
        runtime.initialize(root);
    }
}
