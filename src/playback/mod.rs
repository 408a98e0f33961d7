//! Playback components: voices, buffer pools, streaming, music control

pub mod buffer_pool;
pub mod music;
pub mod stream;
pub mod voice;
pub mod voices;

pub use buffer_pool::BufferPool;
pub use music::{MusicController, MusicStatus};
pub use stream::StreamSession;
pub use voice::Voice;
pub use voices::VoicePool;
