/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the substrate
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Substrate errors
///
/// Container operations never produce these: they only fail by propagating the
/// allocation policy of the call site. Duplicate keys are reported through
/// return values, not errors.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum RuntimeError {
    #[error("Object type '{0}' is already registered")]
    #[diagnostic(
        code(object::duplicate_type),
        help("Object types are registered once during initialization. Reuse the existing handle.")
    )]
    DuplicateType(String),

    #[error("Invalid block layout: size {size}, align {align}")]
    #[diagnostic(
        code(memory::invalid_layout),
        help("Block size must be non-zero and alignment a power of two.")
    )]
    InvalidLayout { size: usize, align: usize },

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(runtime::configuration),
        help("Invalid configuration. Review REFCORE_* environment variables or the JSON document.")
    )]
    Configuration(String),

    #[error("Deferred delete worker unavailable: {0}")]
    #[diagnostic(
        code(object::worker_unavailable),
        help("The object manager was shut down or created without deferred deletion.")
    )]
    WorkerUnavailable(String),
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        RuntimeError::Configuration(err.to_string())
    }
}
