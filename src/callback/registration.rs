/*!
 * Callback Registrations
 */

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub(crate) type CallbackFunction<P> = Box<dyn Fn(&P) + Send + Sync>;

/// List node shared between the bus and in-flight invocations
pub(crate) struct Registration<P: ?Sized> {
    /// Monotonic per bus; the list is kept sorted by it
    pub id: u64,
    pub function: CallbackFunction<P>,
    /// In-flight calls of `function`
    pub busy: AtomicUsize,
    pub unregistering: AtomicBool,
}

impl<P: ?Sized> Registration<P> {
    pub fn new(id: u64, function: CallbackFunction<P>) -> Self {
        Self {
            id,
            function,
            busy: AtomicUsize::new(0),
            unregistering: AtomicBool::new(false),
        }
    }

    /// Enter an invocation unless unregistration has started
    ///
    /// Called with the bus's shared lock held, so an unregister that already
    /// holds the exclusive lock never races with this check.
    #[inline]
    pub fn try_enter(&self) -> bool {
        if self.unregistering.load(Ordering::SeqCst) {
            return false;
        }
        self.busy.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Leave an invocation; `true` if an unregister may be waiting on it
    #[inline]
    pub fn exit(&self) -> bool {
        self.busy.fetch_sub(1, Ordering::SeqCst) == 1 && self.unregistering.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst) != 0
    }
}

/// Handle returned by `register`, consumed by `unregister`
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "a registration that is never unregistered stays on the bus"]
pub struct CallbackRegistration {
    pub(crate) id: u64,
}

impl CallbackRegistration {
    /// Position in registration order on its bus
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }
}
