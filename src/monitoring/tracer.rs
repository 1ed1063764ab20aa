/*!
 * Tracing
 * Subscriber setup and timed spans for substrate operations
 */

use std::time::Instant;
use tracing::{debug, info, span, warn, Level, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber
///
/// Environment variables:
/// - RUST_LOG: log filter (default: info)
/// - REFCORE_TRACE_JSON: JSON output when `1` or `true`
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("REFCORE_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
    };

    if installed.is_ok() {
        info!(json = use_json, "tracing initialized");
    }
}

/// Span that logs its duration when dropped
pub struct OperationSpan {
    span: Span,
    start: Instant,
    operation: &'static str,
}

impl OperationSpan {
    pub fn new(operation: &'static str) -> Self {
        let span = span!(Level::DEBUG, "operation", operation, duration_ms = tracing::field::Empty);
        Self {
            span,
            start: Instant::now(),
            operation,
        }
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Drop for OperationSpan {
    fn drop(&mut self) {
        let duration_ms = self.elapsed_ms();
        self.span.record("duration_ms", duration_ms);
        let _entered = self.span.enter();

        if duration_ms > 1000 {
            warn!(operation = self.operation, duration_ms, "slow operation");
        } else {
            debug!(operation = self.operation, duration_ms, "operation completed");
        }
    }
}

#[inline]
pub fn span_operation(operation: &'static str) -> OperationSpan {
    OperationSpan::new(operation)
}
