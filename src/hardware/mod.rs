//! Hardware audio backend interface
//!
//! The playback layer never talks to an audio device directly; it drives a
//! backend through the [`AudioBackend`] trait. A backend exposes the
//! primitive operations of a voice/buffer style audio API: allocate and free
//! playback voices and raw buffers, fill buffers with PCM, enqueue buffers
//! onto a voice, query processed/queued counts and play state, and control
//! per-voice gain and pitch.
//!
//! Every operation returns `Result`: an implementation must check the
//! device's pending error after each call and surface it as
//! [`Error::Hardware`](crate::Error::Hardware) instead of letting the device
//! continue in an inconsistent state. Callers propagate these errors, never
//! retry them.

use crate::error::Result;

pub mod mock;

pub use mock::MockBackend;

/// Opaque handle to one hardware playback voice.
///
/// Identity is the wrapped id; handles are only meaningful to the backend
/// that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceHandle(u32);

impl VoiceHandle {
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    pub const fn into_raw(self) -> u32 {
        self.0
    }
}

/// Opaque handle to one hardware-resident audio buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u32);

impl BufferHandle {
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    pub const fn into_raw(self) -> u32 {
        self.0
    }
}

/// Sample layout tag for buffer fills.
///
/// Fills are always 16-bit signed PCM; 8-bit sources are widened before
/// they reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferFormat {
    Mono16,
    Stereo16,
}

impl BufferFormat {
    /// Interleaved channel count for this layout.
    pub fn channels(&self) -> u16 {
        match self {
            BufferFormat::Mono16 => 1,
            BufferFormat::Stereo16 => 2,
        }
    }
}

/// Play state of a voice, as reported by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    /// Allocated, never played
    Initial,
    Playing,
    Paused,
    Stopped,
}

/// Primitive operations of the underlying audio device.
///
/// The streaming engine assumes the backend plays queued buffers strictly in
/// enqueue order and that `processed_count` grows monotonically as buffers
/// finish, resetting only on `stop`. `processed_count <= queued_count` must
/// hold at all times.
pub trait AudioBackend {
    /// Allocate one playback voice.
    fn gen_voice(&mut self) -> Result<VoiceHandle>;

    /// Free a voice. The voice must be stopped first; deleting a voice that
    /// is still playing or paused is undefined on real devices.
    fn delete_voice(&mut self, voice: VoiceHandle) -> Result<()>;

    /// Allocate `count` raw buffers.
    fn gen_buffers(&mut self, count: usize) -> Result<Vec<BufferHandle>>;

    /// Free buffers. Buffers must not be queued on a playing or paused voice.
    fn delete_buffers(&mut self, buffers: &[BufferHandle]) -> Result<()>;

    /// Replace a buffer's contents. Invalidates any previous contents
    /// without reallocating the handle. The buffer must not be queued and
    /// unprocessed on any voice.
    fn buffer_data(
        &mut self,
        buffer: BufferHandle,
        format: BufferFormat,
        pcm: &[i16],
        sample_rate: u32,
    ) -> Result<()>;

    /// Append buffers to a voice's FIFO. Order is preserved.
    fn queue_buffers(&mut self, voice: VoiceHandle, buffers: &[BufferHandle]) -> Result<()>;

    /// Remove up to `count` processed buffers from the head of a voice's
    /// FIFO, returning them in queue order for refilling.
    fn unqueue_buffers(&mut self, voice: VoiceHandle, count: usize) -> Result<Vec<BufferHandle>>;

    /// Number of queued buffers the voice has finished playing.
    fn processed_count(&self, voice: VoiceHandle) -> Result<usize>;

    /// Number of buffers currently queued on the voice (processed included).
    fn queued_count(&self, voice: VoiceHandle) -> Result<usize>;

    fn voice_state(&self, voice: VoiceHandle) -> Result<PlayState>;

    /// Start or resume playback. No-op if already playing.
    fn play(&mut self, voice: VoiceHandle) -> Result<()>;

    /// Pause playback. No-op if not playing.
    fn pause(&mut self, voice: VoiceHandle) -> Result<()>;

    /// Stop playback, flush the queue, and reset the processed count.
    fn stop(&mut self, voice: VoiceHandle) -> Result<()>;

    fn set_gain(&mut self, voice: VoiceHandle, gain: f32) -> Result<()>;

    fn set_pitch(&mut self, voice: VoiceHandle, pitch: f32) -> Result<()>;
}
