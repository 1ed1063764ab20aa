/*!
 * Registration Guard
 * RAII wrapper that unregisters a subscriber when dropped
 */

use super::bus::Callback;
use super::registration::CallbackRegistration;

/// Unregisters its subscriber on drop
///
/// Dropping the guard blocks like [`Callback::unregister`], so it must not be
/// dropped from inside its own subscriber.
#[must_use = "dropping the guard unregisters the subscriber immediately"]
pub struct RegistrationGuard<'a, P: ?Sized> {
    bus: &'a Callback<P>,
    registration: Option<CallbackRegistration>,
}

impl<'a, P: ?Sized> RegistrationGuard<'a, P> {
    pub(crate) fn new(bus: &'a Callback<P>, registration: CallbackRegistration) -> Self {
        Self {
            bus,
            registration: Some(registration),
        }
    }

    /// Unregister now
    pub fn unregister(mut self) -> bool {
        self.registration
            .take()
            .map(|registration| self.bus.unregister(registration))
            .unwrap_or(false)
    }

    /// Keep the subscriber registered and hand back the raw registration
    pub fn into_registration(mut self) -> Option<CallbackRegistration> {
        self.registration.take()
    }
}

impl<P: ?Sized> Drop for RegistrationGuard<'_, P> {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.take() {
            self.bus.unregister(registration);
        }
    }
}
