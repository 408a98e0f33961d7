//! Voice wrapper
//!
//! Thin stateful wrapper over one hardware playback channel. The wrapper
//! caches nothing the hardware tracks itself: processed/queued counts and
//! play state are read-through queries, re-issued every tick, because the
//! device advances them between calls.

use tracing::debug;

use crate::error::Result;
use crate::hardware::{AudioBackend, BufferHandle, PlayState, VoiceHandle};

/// One hardware playback channel.
///
/// Allocated once, reused across many playback sessions, released only at
/// engine shutdown.
pub struct Voice {
    handle: VoiceHandle,
    disposed: bool,
}

impl Voice {
    /// Allocate a voice on the backend.
    pub fn new(hw: &mut dyn AudioBackend) -> Result<Self> {
        let handle = hw.gen_voice()?;
        Ok(Self {
            handle,
            disposed: false,
        })
    }

    pub fn handle(&self) -> VoiceHandle {
        self.handle
    }

    /// Append buffers to the playback FIFO. Order is preserved; the
    /// hardware plays buffers strictly in enqueue order.
    pub fn queue(&self, hw: &mut dyn AudioBackend, buffers: &[BufferHandle]) -> Result<()> {
        hw.queue_buffers(self.handle, buffers)
    }

    /// Reclaim up to `count` processed buffers from the head of the FIFO.
    pub fn unqueue(&self, hw: &mut dyn AudioBackend, count: usize) -> Result<Vec<BufferHandle>> {
        hw.unqueue_buffers(self.handle, count)
    }

    pub fn play(&self, hw: &mut dyn AudioBackend) -> Result<()> {
        hw.play(self.handle)
    }

    pub fn pause(&self, hw: &mut dyn AudioBackend) -> Result<()> {
        hw.pause(self.handle)
    }

    pub fn stop(&self, hw: &mut dyn AudioBackend) -> Result<()> {
        hw.stop(self.handle)
    }

    /// Buffers the hardware has finished playing since the last unqueue.
    /// Monotonically increasing; resets only on stop.
    pub fn processed_count(&self, hw: &dyn AudioBackend) -> Result<usize> {
        hw.processed_count(self.handle)
    }

    pub fn queued_count(&self, hw: &dyn AudioBackend) -> Result<usize> {
        hw.queued_count(self.handle)
    }

    pub fn state(&self, hw: &dyn AudioBackend) -> Result<PlayState> {
        hw.voice_state(self.handle)
    }

    /// True when every queued buffer has been played.
    pub fn finished_playing(&self, hw: &dyn AudioBackend) -> Result<bool> {
        Ok(hw.processed_count(self.handle)? == hw.queued_count(self.handle)?)
    }

    pub fn set_gain(&self, hw: &mut dyn AudioBackend, gain: f32) -> Result<()> {
        hw.set_gain(self.handle, gain)
    }

    pub fn set_pitch(&self, hw: &mut dyn AudioBackend, pitch: f32) -> Result<()> {
        hw.set_pitch(self.handle, pitch)
    }

    /// Stop and release the hardware channel. Idempotent.
    ///
    /// Stopping first is required: deleting a handle still referenced by a
    /// playing or paused voice is undefined on the hardware API.
    pub fn dispose(&mut self, hw: &mut dyn AudioBackend) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        hw.stop(self.handle)?;
        hw.delete_voice(self.handle)?;
        self.disposed = true;
        debug!("Released voice {:?}", self.handle);
        Ok(())
    }
}
