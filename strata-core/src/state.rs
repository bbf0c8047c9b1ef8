//! State identities, user-state handles and the per-state hook pair.

use core::any::TypeId;
use core::fmt;
use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::reaction::EventReaction;
use crate::setup::SetupCtx;

/// Dense index of a registered state, assigned at registration in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(pub(crate) usize);

impl StateId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A user-defined state in the chart hierarchy.
///
/// `setup` is called exactly once, during [`Runtime::initialize`]: it declares
/// the state's reactions through the [`SetupCtx`] and returns the entry/exit
/// hooks. Per-state data lives on `self`; data shared between states belongs
/// in the user context `C`.
///
/// ```rust
/// use strata_core::{SetupCtx, State, StateHooks};
///
/// struct Disarmed;
/// struct Armed;
/// struct Arm;
///
/// impl State<u32> for Disarmed {
///     fn setup(&mut self, setup: &mut SetupCtx<'_, u32>) -> StateHooks<u32> {
///         setup.add_transition::<Arm, Armed>();
///         StateHooks::none()
///     }
/// }
/// # impl State<u32> for Armed {
/// #     fn setup(&mut self, _: &mut SetupCtx<'_, u32>) -> StateHooks<u32> { StateHooks::none() }
/// # }
/// ```
///
/// [`Runtime::initialize`]: crate::Runtime::initialize
pub trait State<C>: Send + 'static {
    /// Populate the reaction table and hand back the entry/exit hooks.
    fn setup(&mut self, setup: &mut SetupCtx<'_, C>) -> StateHooks<C>;
}

/// Entry or exit action of a state, run against the user context.
pub type Hook<C> = Box<dyn FnMut(&mut C) + Send>;

/// The optional entry/exit pair returned from [`State::setup`].
pub struct StateHooks<C> {
    pub(crate) entry: Option<Hook<C>>,
    pub(crate) exit: Option<Hook<C>>,
}

impl<C> StateHooks<C> {
    /// A state with neither entry nor exit action.
    #[must_use]
    pub fn none() -> Self {
        Self { entry: None, exit: None }
    }

    /// Attaches an entry action, run root-first on every entry chain.
    #[must_use]
    pub fn on_entry(mut self, hook: impl FnMut(&mut C) + Send + 'static) -> Self {
        self.entry = Some(Box::new(hook));
        self
    }

    /// Attaches an exit action, run leaf-first on every exit chain.
    #[must_use]
    pub fn on_exit(mut self, hook: impl FnMut(&mut C) + Send + 'static) -> Self {
        self.exit = Some(Box::new(hook));
        self
    }
}

impl<C> Default for StateHooks<C> {
    fn default() -> Self {
        Self::none()
    }
}

/// Shared handle to a registered user state.
///
/// The registry keeps states behind `Arc<Mutex<_>>` so reactions of one state
/// may capture a handle to another (typically an ancestor, see
/// [`SetupCtx::ancestor`]) and lock it at dispatch time. Dispatch is
/// single-threaded, so the lock is uncontended outside of user threads.
pub struct StateHandle<S>(pub(crate) Arc<Mutex<S>>);

impl<S> Clone for StateHandle<S> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<S> StateHandle<S> {
    pub(crate) fn new(state: S) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Locks the state for direct access.
    ///
    /// # Panics
    /// Panics if the mutex is poisoned.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.0.lock().unwrap()
    }

    /// Runs `f` with the state locked.
    ///
    /// # Panics
    /// Panics if the mutex is poisoned.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.lock())
    }
}

/// Deferred one-shot call of [`State::setup`] on the boxed user state.
pub(crate) type SetupFn<C> = Box<dyn FnOnce(&mut SetupCtx<'_, C>) -> StateHooks<C> + Send>;

/// Registry node: one registered state and everything the dispatcher needs
/// about it. The only child link kept in the live engine is the parent
/// back-reference; the inverted view exists only inside the UML writer.
pub(crate) struct StateNode<C> {
    pub(crate) id: StateId,
    pub(crate) name: String,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) user: Box<dyn Any + Send>,
    pub(crate) setup: Option<SetupFn<C>>,
    pub(crate) parent: Option<StateId>,
    pub(crate) is_super_state: bool,
    pub(crate) starting_state: Option<StateId>,
    pub(crate) entry: Option<Hook<C>>,
    pub(crate) exit: Option<Hook<C>>,
    pub(crate) reactions: Vec<EventReaction<C>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_id_display_is_dense_index() {
        assert_eq!(StateId(3).to_string(), "#3");
    }

    #[test]
    fn handle_shares_one_state() {
        let handle = StateHandle::new(0u32);
        let other = handle.clone();
        other.with(|value| *value += 5);
        assert_eq!(*handle.lock(), 5);
    }

    #[test]
    fn hooks_builder_sets_both_actions() {
        let hooks: StateHooks<u32> = StateHooks::none()
            .on_entry(|count| *count += 1)
            .on_exit(|count| *count += 10);
        assert!(hooks.entry.is_some());
        assert!(hooks.exit.is_some());

        let bare: StateHooks<u32> = StateHooks::default();
        assert!(bare.entry.is_none());
        assert!(bare.exit.is_none());
    }
}
