//! Audio engine facade
//!
//! One explicitly constructed `AudioEngine` instance owns the backend, the
//! fixed voice pool, the mixer state, and the music controller. There is no
//! process-wide singleton; anything needing mixer state gets it through the
//! engine, which keeps the streaming machinery testable against a mock
//! backend.
//!
//! All state transitions and hardware calls happen on whichever thread
//! calls [`AudioEngine::update`]; the engine performs no locking and must
//! have a single logical owner.

use std::path::Path;

use symphonia::core::io::MediaSource;
use tracing::{debug, info, warn};

use crate::config::AudioSettings;
use crate::decode::{AudioDecoder, SoundData};
use crate::error::Result;
use crate::hardware::{AudioBackend, BufferHandle, PlayState};
use crate::mixer::MixerState;
use crate::playback::{MusicController, MusicStatus, VoicePool};

/// Buffers loaned to an effect voice until it finishes playing.
struct EffectPlayback {
    voice_index: usize,
    buffers: Vec<BufferHandle>,
}

/// Top-level playback engine, generic over the audio device it drives.
pub struct AudioEngine<B: AudioBackend> {
    hw: B,
    voices: VoicePool,
    mixer: MixerState,
    music: MusicController,
    settings: AudioSettings,
    effects: Vec<EffectPlayback>,
    disposed: bool,
}

impl<B: AudioBackend> AudioEngine<B> {
    /// Initialize the engine: validates settings and reserves the whole
    /// voice pool up front.
    pub fn new(mut hw: B, settings: AudioSettings) -> Result<Self> {
        settings.validate()?;
        let voices = VoicePool::create(&mut hw, settings.voice_count)?;
        let music = MusicController::new(settings.stream_buffer_count);
        info!(
            "Audio engine initialized: {} voices, chunk size {}, look-ahead {}",
            settings.voice_count, settings.chunk_samples, settings.stream_buffer_count
        );
        Ok(Self {
            hw,
            voices,
            mixer: MixerState::default(),
            music,
            settings,
            effects: Vec::new(),
            disposed: false,
        })
    }

    pub fn mixer(&self) -> &MixerState {
        &self.mixer
    }

    /// Direct access to the backend, for diagnostics and tests.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.hw
    }

    /// Handle of the voice reserved for streamed music.
    pub fn streaming_voice_handle(&self) -> crate::hardware::VoiceHandle {
        self.voices.streaming_voice().handle()
    }

    pub fn music_status(&self) -> MusicStatus {
        self.music.status()
    }

    /// Observe natural end of the background track.
    pub fn set_music_finished_hook(&mut self, hook: Box<dyn FnMut()>) {
        self.music.set_finished_hook(hook);
    }

    pub fn set_master_volume(&mut self, volume: f32) -> Result<()> {
        self.mixer.set_master_volume(volume);
        self.push_music_volume()
    }

    pub fn set_music_volume(&mut self, volume: f32) -> Result<()> {
        self.mixer.set_music_volume(volume);
        self.push_music_volume()
    }

    /// Effects volume applies to effect voices as they start; running
    /// effects keep the gain they started with.
    pub fn set_effects_volume(&mut self, volume: f32) {
        self.mixer.set_effects_volume(volume);
    }

    /// Global pitch propagates to the current background track only.
    pub fn set_pitch(&mut self, pitch: f32) -> Result<()> {
        self.mixer.set_pitch(pitch);
        let Self {
            hw, voices, music, mixer, ..
        } = self;
        music.on_pitch_changed(hw, voices.streaming_voice(), mixer.pitch())
    }

    fn push_music_volume(&mut self) -> Result<()> {
        let Self {
            hw, voices, music, mixer, ..
        } = self;
        music.on_volume_changed(hw, voices.streaming_voice(), mixer.music_gain())
    }

    /// Start streaming a track as background music, replacing any current
    /// one immediately. A decode failure here leaves current playback
    /// untouched.
    pub fn play_music(&mut self, source: Box<dyn MediaSource>) -> Result<()> {
        let decoder = AudioDecoder::open(source, self.settings.chunk_samples)?;
        let Self {
            hw, voices, music, mixer, ..
        } = self;
        music.start(hw, voices.streaming_voice(), mixer, decoder)
    }

    /// Start streaming a file as background music.
    pub fn play_music_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let file = std::fs::File::open(path.as_ref())?;
        self.play_music(Box::new(file))
    }

    /// Replace the background track. With a positive `fade_seconds` the
    /// current track fades to silence first and the replacement starts from
    /// the tick that completes the fade; the sessions never overlap.
    pub fn replace_music(&mut self, source: Box<dyn MediaSource>, fade_seconds: f32) -> Result<()> {
        let decoder = AudioDecoder::open(source, self.settings.chunk_samples)?;
        let Self {
            hw, voices, music, mixer, ..
        } = self;
        let voice = voices.streaming_voice();
        if music.is_idle() || fade_seconds <= 0.0 {
            music.start(hw, voice, mixer, decoder)
        } else {
            music.queue_replacement(decoder);
            music.fade_out(hw, voice, fade_seconds, Box::new(|| {}))
        }
    }

    /// Stop background music and destroy its streaming session.
    pub fn stop_music(&mut self) -> Result<()> {
        let Self {
            hw, voices, music, ..
        } = self;
        music.stop(hw, voices.streaming_voice())
    }

    /// Fade background music to silence over `duration` seconds, then
    /// invoke `on_complete` exactly once.
    pub fn fade_out_music(&mut self, duration: f32, on_complete: Box<dyn FnOnce()>) -> Result<()> {
        let Self {
            hw, voices, music, ..
        } = self;
        music.fade_out(hw, voices.streaming_voice(), duration, on_complete)
    }

    /// Play a decoded clip on an idle voice from the pool.
    ///
    /// Returns `false` when every non-streaming voice is busy; the clip is
    /// dropped rather than interrupting something already audible.
    pub fn play_effect(&mut self, sound: &SoundData) -> Result<bool> {
        let Some(index) = self.voices.idle_voice(&self.hw)? else {
            debug!("All effect voices busy, dropping clip");
            return Ok(false);
        };
        // An idle voice may still hold the previous clip's buffers if the
        // device played it out between ticks
        self.reclaim_effect(index)?;

        let buffers = self.hw.gen_buffers(1)?;
        match self.start_effect(index, &buffers, sound) {
            Ok(()) => {
                self.effects.push(EffectPlayback {
                    voice_index: index,
                    buffers,
                });
                Ok(true)
            }
            Err(e) => {
                let _ = self.hw.delete_buffers(&buffers);
                Err(e)
            }
        }
    }

    /// Release the buffer set loaned to `index`'s voice, if one is still
    /// outstanding. At most one entry per voice can exist.
    fn reclaim_effect(&mut self, index: usize) -> Result<()> {
        if let Some(pos) = self.effects.iter().position(|e| e.voice_index == index) {
            let effect = self.effects.swap_remove(pos);
            let Self { hw, voices, .. } = self;
            let voice = voices.voice(index)?;
            voice.stop(hw)?;
            hw.delete_buffers(&effect.buffers)?;
        }
        Ok(())
    }

    fn start_effect(&mut self, index: usize, buffers: &[BufferHandle], sound: &SoundData) -> Result<()> {
        let Self {
            hw, voices, mixer, ..
        } = self;
        let voice = voices.voice(index)?;
        hw.buffer_data(
            buffers[0],
            sound.format.buffer_format(),
            &sound.samples,
            sound.format.sample_rate,
        )?;
        // A reused voice keeps nothing from its previous clip
        voice.stop(hw)?;
        voice.queue(hw, buffers)?;
        voice.set_gain(hw, mixer.effects_gain())?;
        voice.set_pitch(hw, 1.0)?;
        voice.play(hw)
    }

    /// Periodic tick: advances the fade envelope, refills the streaming
    /// voice, and reclaims buffers from finished effect voices. Call once
    /// per frame with the elapsed time in seconds.
    pub fn update(&mut self, dt: f32) -> Result<()> {
        let Self {
            hw, voices, music, mixer, effects, ..
        } = self;

        music.update(hw, voices.streaming_voice(), mixer, dt)?;

        // Reclaim one-shot effect buffers once their voice played out. An
        // empty queue on a non-active voice means the device already flushed
        // the clip (played out and stopped); those buffers are free to delete.
        let mut index = 0;
        while index < effects.len() {
            let voice = voices.voice(effects[index].voice_index)?;
            let done = if voice.queued_count(hw)? == 0 {
                !matches!(voice.state(hw)?, PlayState::Playing | PlayState::Paused)
            } else {
                voice.finished_playing(hw)?
            };
            if done {
                let effect = effects.swap_remove(index);
                voice.stop(hw)?;
                hw.delete_buffers(&effect.buffers)?;
            } else {
                index += 1;
            }
        }

        Ok(())
    }

    /// Tear down every session, buffer, and voice. Idempotent; also runs on
    /// drop.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.stop_music()?;
        let Self {
            hw, voices, effects, ..
        } = self;
        for effect in effects.drain(..) {
            let voice = voices.voice(effect.voice_index)?;
            voice.stop(hw)?;
            hw.delete_buffers(&effect.buffers)?;
        }
        voices.dispose(hw)?;
        self.disposed = true;
        info!("Audio engine shut down");
        Ok(())
    }
}

impl<B: AudioBackend> Drop for AudioEngine<B> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Audio engine teardown failed: {}", e);
        }
    }
}
