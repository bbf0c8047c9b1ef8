//! Reaction results and the per-state reaction table entries.
//!
//! A reaction table is an ordered sequence of (predicate, handler) pairs; the
//! dispatcher invokes the first handler whose predicate accepts the event and
//! forwards to the parent when none does. Handlers return a [`Reaction`], a
//! closed sum rather than a trait hierarchy.

use core::any::Any;
use core::fmt;
use std::sync::Arc;

use crate::event::{short_type_name, Event};
use crate::runtime::EventCtx;
use crate::state::StateId;

/// Action run between the exit chain and the entry chain of a transition.
/// Receives the user context and the triggering event payload.
pub type TransitionAction<C> = Arc<dyn Fn(&mut C, &dyn Any) + Send + Sync>;

/// Wraps a typed closure into a [`TransitionAction`].
///
/// The downcast inside never fails when the action is attached to a reaction
/// for the same event kind, which is what every factory on
/// [`SetupCtx`](crate::SetupCtx) does.
pub fn transition_action<C, E: Event>(
    action: impl Fn(&mut C, &E) + Send + Sync + 'static,
) -> TransitionAction<C> {
    Arc::new(move |context, event| {
        if let Some(event) = event.downcast_ref::<E>() {
            action(context, event);
        }
    })
}

/// Outcome of a reaction handler.
pub enum Reaction<C> {
    /// Move to `target`, running `action` between the exits and the entries.
    Transit {
        target: StateId,
        action: Option<TransitionAction<C>>,
    },
    /// Drop the event; do not bubble further.
    Discard,
    /// Park the event until the next state change, then retry it.
    Defer,
    /// Decline the event; the parent state gets to try.
    Forward,
}

impl<C> fmt::Debug for Reaction<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reaction::Transit { target, action } => f
                .debug_struct("Transit")
                .field("target", &format_args!("{target}"))
                .field("action", &action.is_some())
                .finish(),
            Reaction::Discard => f.write_str("Discard"),
            Reaction::Defer => f.write_str("Defer"),
            Reaction::Forward => f.write_str("Forward"),
        }
    }
}

/// Result kind recorded in a [`UmlNote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UmlResult {
    Transit,
    Discard,
    Defer,
}

/// Diagnostic annotation attached to a reaction, consumed only by the UML
/// diagram writer. Guard and action strings are free-form display text.
#[derive(Debug, Clone)]
pub struct UmlNote {
    pub(crate) result: UmlResult,
    pub(crate) guard: Option<String>,
    pub(crate) action: Option<String>,
    pub(crate) target: Option<StateId>,
}

impl UmlNote {
    /// Annotates a transition to `target`.
    #[must_use]
    pub fn transit(target: StateId) -> Self {
        Self {
            result: UmlResult::Transit,
            guard: None,
            action: None,
            target: Some(target),
        }
    }

    /// Annotates a discard reaction.
    #[must_use]
    pub fn discard() -> Self {
        Self {
            result: UmlResult::Discard,
            guard: None,
            action: None,
            target: None,
        }
    }

    /// Annotates a defer reaction.
    #[must_use]
    pub fn defer() -> Self {
        Self {
            result: UmlResult::Defer,
            guard: None,
            action: None,
            target: None,
        }
    }

    /// Adds guard display text, rendered as `[guard]`.
    #[must_use]
    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    /// Adds action display text, rendered as `/ action`.
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

pub(crate) type Predicate = Box<dyn Fn(&dyn Any) -> bool + Send>;
pub(crate) type Handler<C> = Box<dyn FnMut(&mut EventCtx<'_, C>, &dyn Any) -> Reaction<C> + Send>;

/// One entry of a state's reaction table: an event predicate, the handler it
/// guards, and optional diagram annotations.
///
/// This is the typed primitive every convenience factory on
/// [`SetupCtx`](crate::SetupCtx) is layered over.
pub struct EventReaction<C> {
    pub(crate) event_name: &'static str,
    pub(crate) predicate: Predicate,
    pub(crate) handler: Handler<C>,
    pub(crate) notes: Vec<UmlNote>,
}

impl<C: 'static> EventReaction<C> {
    /// A reaction on event kind `E`: the predicate is the kind match, the
    /// guard (if any) lives inside `handler`.
    pub fn new<E: Event>(
        mut handler: impl FnMut(&mut EventCtx<'_, C>, &E) -> Reaction<C> + Send + 'static,
    ) -> Self {
        Self {
            event_name: short_type_name::<E>(),
            predicate: Box::new(|event| event.is::<E>()),
            handler: Box::new(move |scope, event| {
                let event = event
                    .downcast_ref::<E>()
                    .expect("reaction invoked for a non-matching event kind");
                handler(scope, event)
            }),
            notes: Vec::new(),
        }
    }

    /// Attaches a diagram annotation. A reaction may carry several, one per
    /// outcome its handler can produce.
    #[must_use]
    pub fn with_note(mut self, note: UmlNote) -> Self {
        self.notes.push(note);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Go;
    struct Stop;

    #[test]
    fn predicate_matches_event_kind_only() {
        let reaction: EventReaction<()> = EventReaction::new(|_scope, _event: &Go| Reaction::Discard);
        assert!((reaction.predicate)(&Go));
        assert!(!(reaction.predicate)(&Stop));
        assert_eq!(reaction.event_name, "Go");
    }

    #[test]
    fn typed_action_ignores_foreign_payloads() {
        let action: TransitionAction<u32> = transition_action(|count: &mut u32, _: &Go| *count += 1);
        let mut count = 0;
        action(&mut count, &Go);
        action(&mut count, &Stop);
        assert_eq!(count, 1);
    }

    #[test]
    fn note_builder_records_display_text() {
        let note = UmlNote::transit(StateId(2)).with_guard("armed").with_action("beep");
        assert_eq!(note.result, UmlResult::Transit);
        assert_eq!(note.target, Some(StateId(2)));
        assert_eq!(note.guard.as_deref(), Some("armed"));
        assert_eq!(note.action.as_deref(), Some("beep"));
    }

    #[test]
    fn reaction_debug_hides_closures() {
        let transit: Reaction<()> = Reaction::Transit { target: StateId(1), action: None };
        assert_eq!(format!("{transit:?}"), "Transit { target: #1, action: false }");
        assert_eq!(format!("{:?}", Reaction::<()>::Defer), "Defer");
    }
}
