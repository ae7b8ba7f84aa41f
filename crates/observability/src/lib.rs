//! Process-wide logging setup shared by every binary and test harness.

/// Initialize process-wide tracing.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber configuration (filters, format).
pub mod tracing;
