//! Shared tracing setup for binaries and tests embedding the renderer.

pub mod tracing;

pub use crate::tracing::{LogConfig, LogFormat};

/// Initialize process-wide logging with [`LogConfig::default`].
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&LogConfig::default());
}
