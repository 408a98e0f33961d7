//! Fixed voice pool
//!
//! All hardware voices are allocated eagerly at engine startup and live
//! until shutdown. One voice is permanently assigned to streamed music; the
//! others are handed out for one-shot effect playback whenever the hardware
//! reports them idle.

use tracing::info;

use crate::error::{Error, Result};
use crate::hardware::{AudioBackend, PlayState};
use crate::playback::voice::Voice;

/// Index of the voice reserved for streamed music.
const STREAMING_VOICE: usize = 0;

/// Fixed collection of reusable voices.
pub struct VoicePool {
    voices: Vec<Voice>,
}

impl VoicePool {
    /// Allocate `count` voices up front.
    pub fn create(hw: &mut dyn AudioBackend, count: usize) -> Result<Self> {
        let mut voices = Vec::with_capacity(count);
        for _ in 0..count {
            voices.push(Voice::new(hw)?);
        }
        info!("Allocated voice pool of {} channels", count);
        Ok(Self { voices })
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// The voice assigned to streamed music playback.
    pub fn streaming_voice(&self) -> &Voice {
        &self.voices[STREAMING_VOICE]
    }

    pub fn voice(&self, index: usize) -> Result<&Voice> {
        self.voices.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.voices.len(),
        })
    }

    /// Index of a non-streaming voice the hardware reports idle, if any.
    pub fn idle_voice(&self, hw: &dyn AudioBackend) -> Result<Option<usize>> {
        for (index, voice) in self.voices.iter().enumerate() {
            if index == STREAMING_VOICE {
                continue;
            }
            match voice.state(hw)? {
                PlayState::Initial | PlayState::Stopped => return Ok(Some(index)),
                PlayState::Playing | PlayState::Paused => {}
            }
        }
        Ok(None)
    }

    /// Release every voice. Each voice stops itself before deletion;
    /// idempotent per voice.
    pub fn dispose(&mut self, hw: &mut dyn AudioBackend) -> Result<()> {
        for voice in &mut self.voices {
            voice.dispose(hw)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MockBackend;

    #[test]
    fn streaming_voice_is_never_handed_out_as_idle() {
        let mut hw = MockBackend::new();
        let pool = VoicePool::create(&mut hw, 3).unwrap();

        let idle = pool.idle_voice(&hw).unwrap();
        assert_eq!(idle, Some(1));
        assert_ne!(idle, Some(STREAMING_VOICE));
    }

    #[test]
    fn busy_voices_are_skipped() {
        let mut hw = MockBackend::new();
        let pool = VoicePool::create(&mut hw, 3).unwrap();

        pool.voice(1).unwrap().play(&mut hw).unwrap();
        assert_eq!(pool.idle_voice(&hw).unwrap(), Some(2));

        pool.voice(2).unwrap().play(&mut hw).unwrap();
        assert_eq!(pool.idle_voice(&hw).unwrap(), None);
    }

    #[test]
    fn dispose_releases_every_voice() {
        let mut hw = MockBackend::new();
        let mut pool = VoicePool::create(&mut hw, 4).unwrap();
        assert_eq!(hw.live_voice_count(), 4);

        pool.dispose(&mut hw).unwrap();
        assert_eq!(hw.live_voice_count(), 0);

        // Second dispose is a no-op
        pool.dispose(&mut hw).unwrap();
    }
}
