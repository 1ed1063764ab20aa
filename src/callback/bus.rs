/*!
 * Callback Bus
 *
 * Multi-subscriber notification list with drain-then-remove unregistration.
 *
 * # Protocol
 *
 * Each registration carries a busy counter and an unregistering flag.
 *
 * - `invoke` holds the shared lock only while it picks the next registration.
 *   Under that lock it skips flagged registrations and increments `busy` on
 *   the one it picks, then releases the lock for the call and decrements
 *   `busy` afterwards, also when the subscriber panics. If that decrement
 *   reaches zero on a flagged registration it signals the drain condition.
 * - `unregister` sets the flag, waits on the drain condition until `busy` is
 *   zero, then takes the exclusive lock. With the exclusive lock held no
 *   invoker can be between its flag check and its increment, so a zero count
 *   there is final and the registration is unlinked.
 *
 * Traversal resumes after a released lock from the sequence id of the last
 * registration visited. Registrations are appended in id order and never
 * reordered, so the resumed position is exact: removals cannot make it skip
 * a live registration or repeat one, and registrations added mid-traversal
 * are reached.
 */

use super::guard::RegistrationGuard;
use super::registration::{CallbackRegistration, Registration};
use super::stats::{AtomicCallbackStats, CallbackStats};
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Shared by every bus so a registration never matches a foreign bus
static NEXT_REGISTRATION_ID: AtomicU64 = AtomicU64::new(1);

/// Event with any number of subscribers
///
/// `P` is the parameter passed to every subscriber on `invoke`.
///
/// # Example
///
/// ```
/// use refcore::callback::Callback;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let bus: Callback<u32> = Callback::new();
/// let total = Arc::new(AtomicUsize::new(0));
/// let sink = total.clone();
///
/// let registration = bus.register(move |value: &u32| {
///     sink.fetch_add(*value as usize, Ordering::SeqCst);
/// });
///
/// bus.invoke(&5);
/// assert!(bus.unregister(registration));
/// bus.invoke(&5);
/// assert_eq!(total.load(Ordering::SeqCst), 5);
/// ```
pub struct Callback<P: ?Sized> {
    registrations: RwLock<Vec<Arc<Registration<P>>>>,
    drain_lock: Mutex<()>,
    drained: Condvar,
    stats: AtomicCallbackStats,
}

impl<P: ?Sized> Callback<P> {
    pub fn new() -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
            drain_lock: Mutex::new(()),
            drained: Condvar::new(),
            stats: AtomicCallbackStats::default(),
        }
    }

    /// Subscribe `function`; context is whatever the closure captures
    pub fn register<F>(&self, function: F) -> CallbackRegistration
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let mut registrations = self.registrations.write();
        // Taken under the write lock so the list stays sorted by id
        let id = NEXT_REGISTRATION_ID.fetch_add(1, Ordering::Relaxed);

        registrations.push(Arc::new(Registration::new(id, Box::new(function))));
        self.stats.inc_registrations();
        debug!(registration = id, subscribers = registrations.len(), "callback registered");

        CallbackRegistration { id }
    }

    /// Subscribe a plain function with an explicit context value
    pub fn register_with_context<C>(&self, function: fn(&P, &C), context: C) -> CallbackRegistration
    where
        P: 'static,
        C: Send + Sync + 'static,
    {
        self.register(move |parameter: &P| function(parameter, &context))
    }

    /// Subscribe for the lifetime of the returned guard
    pub fn register_guarded<F>(&self, function: F) -> RegistrationGuard<'_, P>
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        RegistrationGuard::new(self, self.register(function))
    }

    /// Call every subscriber that is not being unregistered
    ///
    /// Returns the number of calls made. Safe to call from many threads at
    /// once, including concurrent calls of the same subscriber.
    pub fn invoke(&self, parameter: &P) -> usize {
        let mut last_id = None;
        let mut calls = 0;

        while let Some(registration) = self.next_registration(&mut last_id) {
            let call = InvocationGuard {
                bus: self,
                registration,
            };
            (call.registration.function)(parameter);
            drop(call);

            calls += 1;
            self.stats.inc_invocations();
        }

        calls
    }

    /// Pick the next callable registration after `last_id` and enter it
    fn next_registration(&self, last_id: &mut Option<u64>) -> Option<Arc<Registration<P>>> {
        let registrations = self.registrations.read();
        let start = match *last_id {
            Some(id) => registrations.partition_point(|r| r.id <= id),
            None => 0,
        };

        for registration in &registrations[start..] {
            *last_id = Some(registration.id);
            if registration.try_enter() {
                return Some(Arc::clone(registration));
            }
            self.stats.inc_skipped();
        }
        None
    }

    /// Remove a subscriber, waiting for its in-flight calls to finish
    ///
    /// When this returns the function is not running anywhere and will not
    /// be called again. Returns `false` if the registration is not on this
    /// bus.
    ///
    /// Calling this from inside the subscriber being unregistered deadlocks.
    pub fn unregister(&self, registration: CallbackRegistration) -> bool {
        let Some(target) = self.find(registration.id) else {
            return false;
        };

        target.unregistering.store(true, Ordering::SeqCst);

        let mut waited = false;
        loop {
            {
                let mut drain = self.drain_lock.lock();
                while target.is_busy() {
                    if !waited {
                        trace!(registration = target.id, "waiting for in-flight callbacks");
                        waited = true;
                    }
                    self.drained.wait(&mut drain);
                }
            }

            let mut registrations = self.registrations.write();
            // An invoker may have entered between the drain and the lock
            if target.is_busy() {
                continue;
            }
            if let Ok(index) = registrations.binary_search_by_key(&target.id, |r| r.id) {
                registrations.remove(index);
            }
            break;
        }

        if waited {
            self.stats.inc_drain_waits();
        }
        self.stats.inc_unregistrations();
        debug!(registration = target.id, drained = waited, "callback unregistered");
        true
    }

    fn find(&self, id: u64) -> Option<Arc<Registration<P>>> {
        let registrations = self.registrations.read();
        registrations
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|index| Arc::clone(&registrations[index]))
    }

    /// Subscribers currently linked, including ones being unregistered
    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }

    pub fn stats(&self) -> CallbackStats {
        self.stats.snapshot()
    }
}

/// Leaves an entered registration, also when the subscriber unwinds
struct InvocationGuard<'a, P: ?Sized> {
    bus: &'a Callback<P>,
    registration: Arc<Registration<P>>,
}

impl<P: ?Sized> Drop for InvocationGuard<'_, P> {
    fn drop(&mut self) {
        if self.registration.exit() {
            let _drain = self.bus.drain_lock.lock();
            self.bus.drained.notify_all();
        }
    }
}

impl<P: ?Sized> Default for Callback<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ?Sized> std::fmt::Debug for Callback<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callback")
            .field("subscribers", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}
