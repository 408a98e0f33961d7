//! Shared infrastructure for the integration tests.

pub mod audio_generator;

pub use audio_generator::{generate_silent_wav, generate_sine_wav, SAMPLE_RATE};

use std::sync::Once;

static INIT: Once = Once::new();

/// Route tracing output through the test harness. Safe to call from every
/// test; only the first call installs the subscriber.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}
