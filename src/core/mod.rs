/*!
 * Core Module
 * Errors, configuration and hash primitives shared by every subsystem
 */

pub mod config;
pub mod errors;
pub mod hash;

// Re-export for convenience
pub use config::{PoolParameters, RuntimeConfig};
pub use errors::*;
