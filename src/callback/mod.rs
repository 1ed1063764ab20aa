/*!
 * Callback Bus
 *
 * Broadcast of change notifications from providers to any number of
 * subscribers. The only internally synchronized structure of the substrate:
 * a shared/exclusive lock over the subscriber list plus one drain condition.
 */

mod bus;
mod guard;
mod registration;
mod stats;

pub use bus::Callback;
pub use guard::RegistrationGuard;
pub use registration::CallbackRegistration;
pub use stats::CallbackStats;
