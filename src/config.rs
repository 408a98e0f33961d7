//! Configuration for the chime playback layer
//!
//! Settings are loaded from a TOML file at startup or constructed in code.
//! Missing fields fall back to built-in defaults defined here, not in
//! external files. Settings cannot change while an engine is running; build
//! a new engine to pick up changes.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Tunables for decoding and streaming.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioSettings {
    /// Maximum interleaved samples per decoded chunk (one hardware buffer)
    #[serde(default = "default_chunk_samples")]
    pub chunk_samples: usize,

    /// Look-ahead depth for streamed playback: number of hardware buffers
    /// kept queued on the streaming voice. Minimum 2 (double buffering).
    #[serde(default = "default_stream_buffer_count")]
    pub stream_buffer_count: usize,

    /// Number of hardware voices reserved at engine startup. One is assigned
    /// to streamed music; the rest serve one-shot effects.
    #[serde(default = "default_voice_count")]
    pub voice_count: usize,
}

fn default_chunk_samples() -> usize {
    16384
}

fn default_stream_buffer_count() -> usize {
    3
}

fn default_voice_count() -> usize {
    16
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            chunk_samples: default_chunk_samples(),
            stream_buffer_count: default_stream_buffer_count(),
            voice_count: default_voice_count(),
        }
    }
}

impl AudioSettings {
    /// Load settings from a TOML file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let settings: AudioSettings = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        settings.validate()?;
        info!("Loaded audio settings from {}", path.display());
        Ok(settings)
    }

    /// Check settings against the streaming engine's structural requirements.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_samples == 0 {
            return Err(Error::Config("chunk_samples must be positive".to_string()));
        }
        if self.stream_buffer_count < 2 {
            return Err(Error::Config(format!(
                "stream_buffer_count must be at least 2 (got {})",
                self.stream_buffer_count
            )));
        }
        if self.voice_count < 2 {
            return Err(Error::Config(format!(
                "voice_count must be at least 2 (got {})",
                self.voice_count
            )));
        }
        Ok(())
    }
}
