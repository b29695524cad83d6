//! Logging utilities for the pythonic runtime
//!
//! Provides lightweight logging for heap, call and exception events. Uses
//! `tracing` for structured logging with minimal overhead.

// Re-export tracing macros for use throughout the runtime
pub use tracing::{debug, error, info, trace, warn, Level};

/// Initialize runtime logging with sensible defaults
///
/// Embedders that configure their own subscriber should skip this.
/// For debug builds, DEBUG level is enabled for the runtime target.
pub fn init_runtime_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            #[cfg(debug_assertions)]
            {
                EnvFilter::new("pythonic_runtime=debug")
            }
            #[cfg(not(debug_assertions))]
            {
                EnvFilter::new("pythonic_runtime=info")
            }
        });

    fmt()
        .with_env_filter(filter)
        .compact()
        .try_init()
        .ok(); // Ignore error if already initialized
}

/// Log an object allocation
#[inline]
pub fn log_object_new(id: u64, kind: &str) {
    trace!(
        target: "heap",
        id,
        kind,
        "object allocated"
    );
}

/// Log an object destruction
#[inline]
pub fn log_object_free(id: u64) {
    trace!(
        target: "heap",
        id,
        "object freed"
    );
}

/// Log a callable invocation
#[inline]
pub fn log_call(function_name: &str, args_count: usize) {
    trace!(
        target: "call",
        function = function_name,
        args_count,
        "call"
    );
}

/// Log a module import
#[inline]
pub fn log_import(module: &str, created: bool) {
    debug!(
        target: "import",
        module,
        created,
        "module imported"
    );
}

/// Log an exception being raised
#[inline]
pub fn log_raise(type_name: &str, message: &str) {
    debug!(
        target: "exceptions",
        type_name,
        message,
        "exception raised"
    );
}

/// Log a source string evaluation
#[inline]
pub fn log_run_string(mode: &str, len: usize) {
    trace!(
        target: "eval",
        mode,
        len,
        "run string"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_functions() {
        // These should not panic
        log_object_new(1, "int");
        log_object_free(1);
        log_call("len", 1);
        log_import("math", true);
        log_raise("NameError", "oops");
        log_run_string("eval", 3);
    }
}
