//! # Chime
//!
//! Voice-based audio playback engine:
//! - Decoding of Ogg Vorbis and RIFF/WAVE sources to 16-bit PCM
//! - Streamed background music with bounded buffer look-ahead
//! - One-shot effect playback over a fixed voice pool
//! - Timed fade-out with completion callbacks
//! - Cascaded master/music/effects volume and global pitch
//!
//! The engine drives an audio device through the
//! [`AudioBackend`](hardware::AudioBackend) trait; the crate ships a
//! [`MockBackend`](hardware::MockBackend) for tests and headless use. All
//! playback state advances inside [`AudioEngine::update`], which the caller
//! ticks once per frame from a single thread.

pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod hardware;
pub mod mixer;
pub mod playback;

pub use config::AudioSettings;
pub use decode::{AudioDecoder, AudioFormat, SoundData};
pub use engine::AudioEngine;
pub use error::{Error, Result};
pub use mixer::MixerState;
pub use playback::MusicStatus;
