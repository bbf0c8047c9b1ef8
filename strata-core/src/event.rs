//! Type-erased event payloads for the dispatcher queues.
//!
//! The engine never inspects an event beyond its kind: reactions are selected
//! by downcast, so any `Any + Send` value can be dispatched. The concrete type
//! name is captured at the (generic) dispatch call site and travels with the
//! payload for diagnostics; the debug logger and the UML writer use it, the
//! hot path does not.

use core::any::{type_name, Any};
use core::fmt;

/// Marker for values that can be dispatched through a chart.
///
/// Blanket-implemented for every `Any + Send` type; an event is usually a
/// small unit struct or an enum-free payload carrier:
///
/// ```rust
/// struct Activate;
/// struct SetSpeed(u32);
/// ```
pub trait Event: Any + Send {}

impl<E: Any + Send> Event for E {}

/// Returns the unqualified name of `T` (module path stripped, generic
/// arguments kept). Used for default state names and event display names.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = &full[..full.find('<').unwrap_or(full.len())];
    match base.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

/// An event boxed for the posted/deferred queues, tagged with its kind name.
pub struct PostedEvent {
    payload: Box<dyn Any + Send>,
    kind: &'static str,
}

impl PostedEvent {
    /// Boxes `event`, recording its kind name for diagnostics.
    pub fn new<E: Event>(event: E) -> Self {
        Self {
            payload: Box::new(event),
            kind: short_type_name::<E>(),
        }
    }

    /// The unqualified type name of the boxed event.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// The payload as `&dyn Any`, ready for predicate checks and downcasts.
    #[must_use]
    pub fn payload(&self) -> &dyn Any {
        &*self.payload
    }

    /// Typed view of the payload, `None` if the kind does not match.
    #[must_use]
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.payload.downcast_ref()
    }
}

impl fmt::Debug for PostedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PostedEvent").field(&self.kind).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;
    struct Counted(u32);

    #[test]
    fn short_name_strips_module_path() {
        assert_eq!(short_type_name::<Ping>(), "Ping");
        assert_eq!(short_type_name::<Counted>(), "Counted");
        assert_eq!(short_type_name::<nested::Nested>(), "Nested");
    }

    #[test]
    fn short_name_keeps_generic_arguments() {
        assert_eq!(short_type_name::<Option<Ping>>(), "Option<strata_core::event::tests::Ping>");
    }

    #[test]
    fn posted_event_round_trip() {
        let event = PostedEvent::new(Counted(7));
        assert_eq!(event.kind(), "Counted");
        assert!(event.downcast_ref::<Ping>().is_none());
        assert_eq!(event.downcast_ref::<Counted>().map(|c| c.0), Some(7));
        assert!(event.payload().is::<Counted>());
    }

    #[test]
    fn posted_event_debug_shows_kind() {
        let event = PostedEvent::new(Ping);
        assert_eq!(format!("{event:?}"), "PostedEvent(\"Ping\")");
    }

    mod nested {
        pub struct Nested;
    }
}
