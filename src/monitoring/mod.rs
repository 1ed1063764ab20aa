/*!
 * Monitoring
 * Structured logging setup shared by the library and the stress binary
 */

mod tracer;

pub use tracer::{init_tracing, span_operation, OperationSpan};
