use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Events that can be routed by a discriminant.
pub trait EventKind {
    type Kind: Copy + Eq + Hash;

    fn kind(&self) -> Self::Kind;
}

type Handler<C, E> = Box<dyn FnMut(&mut C, &E)>;

/// Handler registry keyed by event kind.
///
/// Handlers receive the state they act on explicitly, so the registry holds no
/// shared mutable state of its own. Dispatch is synchronous and runs handlers
/// in registration order.
pub struct EventDispatcher<E: EventKind, C> {
    handlers: FxHashMap<E::Kind, Vec<Handler<C, E>>>,
}

impl<E: EventKind, C> Default for EventDispatcher<E, C> {
    fn default() -> Self {
        Self {
            handlers: FxHashMap::default(),
        }
    }
}

impl<E: EventKind, C> EventDispatcher<E, C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, kind: E::Kind, handler: F)
    where
        F: FnMut(&mut C, &E) + 'static,
    {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    /// Run every handler registered for `event.kind()`. Returns how many ran.
    pub fn dispatch(&mut self, context: &mut C, event: &E) -> usize {
        let Some(handlers) = self.handlers.get_mut(&event.kind()) else {
            return 0;
        };
        for handler in handlers.iter_mut() {
            handler(context, event);
        }
        handlers.len()
    }

    #[cfg(test)]
    fn handler_count(&self, kind: E::Kind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }
}
