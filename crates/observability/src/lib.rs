//! Tracing/logging setup shared by the binary and black-box tests.

pub mod tracing;

pub use self::tracing::{LogConfig, LogFormat};

/// Initialize process-wide logging.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &LogConfig) {
    self::tracing::init(config);
}
