//! Background music control
//!
//! State machine layered on the streaming voice:
//!
//! ```text
//! Idle -> Starting -> Playing <-> FadingOut -> Idle
//! ```
//!
//! The controller owns the active [`StreamSession`], cascades effective
//! gain (mixer music gain x fade envelope) and pitch to the live voice, and
//! runs timed fade-outs with a one-shot completion action. Everything is
//! driven synchronously from the periodic update tick; there is no internal
//! thread and no deferred dispatch.

use tracing::{debug, info};

use crate::decode::AudioDecoder;
use crate::error::Result;
use crate::hardware::AudioBackend;
use crate::mixer::MixerState;
use crate::playback::stream::StreamSession;
use crate::playback::voice::Voice;

/// One-shot action invoked when a fade-out crosses its duration.
pub type FadeCallback = Box<dyn FnOnce()>;

/// Envelope of an in-progress fade-out.
///
/// Exists only while fading; consumed once `elapsed` crosses `duration`,
/// at which point the completion action fires exactly once.
struct FadeState {
    elapsed: f32,
    duration: f32,
    /// Envelope value the fade started from (1.0 unless restarted mid-fade)
    start_gain: f32,
    on_complete: Option<FadeCallback>,
}

impl FadeState {
    /// Linear ramp from `start_gain` to zero, clamped so a long tick can
    /// not push it negative.
    fn envelope(&self) -> f32 {
        (self.start_gain * (1.0 - self.elapsed / self.duration)).clamp(0.0, self.start_gain)
    }

    fn complete(&self) -> bool {
        self.elapsed >= self.duration
    }
}

enum State {
    Idle,
    /// Transient: session primed, voice not yet told to play
    Starting,
    Playing,
    FadingOut(FadeState),
}

/// Externally visible controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicStatus {
    Idle,
    Playing,
    FadingOut,
}

/// Background music state machine over the streaming voice.
pub struct MusicController {
    state: State,
    session: Option<StreamSession>,
    /// Replacement track waiting for the current fade to complete
    pending: Option<AudioDecoder>,
    /// Observer for natural end of track (stream drained and played out)
    finished_hook: Option<Box<dyn FnMut()>>,
    /// Look-ahead depth for new sessions
    buffer_count: usize,
}

impl MusicController {
    pub fn new(buffer_count: usize) -> Self {
        Self {
            state: State::Idle,
            session: None,
            pending: None,
            finished_hook: None,
            buffer_count,
        }
    }

    pub fn status(&self) -> MusicStatus {
        match self.state {
            State::Idle => MusicStatus::Idle,
            State::Starting | State::Playing => MusicStatus::Playing,
            State::FadingOut(_) => MusicStatus::FadingOut,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// Observe natural end of track, e.g. to loop or advance a playlist.
    pub fn set_finished_hook(&mut self, hook: Box<dyn FnMut()>) {
        self.finished_hook = Some(hook);
    }

    /// Current fade envelope: 1.0 except mid-fade.
    fn envelope(&self) -> f32 {
        match &self.state {
            State::FadingOut(fade) => fade.envelope(),
            _ => 1.0,
        }
    }

    /// Start a new track on the streaming voice, replacing any current one
    /// immediately (no fade). Mixer gain and pitch are applied before the
    /// voice starts playing.
    pub fn start(
        &mut self,
        hw: &mut dyn AudioBackend,
        voice: &Voice,
        mixer: &MixerState,
        decoder: AudioDecoder,
    ) -> Result<()> {
        if self.session.is_some() {
            self.stop(hw, voice)?;
        }
        self.state = State::Starting;

        let session = StreamSession::start(hw, voice, decoder, self.buffer_count);
        let session = match session {
            Ok(session) => session,
            Err(e) => {
                self.state = State::Idle;
                return Err(e);
            }
        };

        voice.set_gain(hw, mixer.music_gain())?;
        voice.set_pitch(hw, mixer.pitch())?;
        voice.play(hw)?;

        info!(
            "Music started: {} ch, {} Hz, look-ahead {}",
            session.format().channels,
            session.format().sample_rate,
            self.buffer_count
        );
        self.session = Some(session);
        self.state = State::Playing;
        Ok(())
    }

    /// Stop playback and destroy the session. The streaming voice itself
    /// stays allocated for the next track. Drops any pending replacement.
    pub fn stop(&mut self, hw: &mut dyn AudioBackend, voice: &Voice) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            session.dispose(hw, voice)?;
            debug!("Music session destroyed");
        }
        self.pending = None;
        self.state = State::Idle;
        Ok(())
    }

    /// Begin a timed fade to silence; `on_complete` fires exactly once when
    /// the envelope reaches zero.
    ///
    /// Fading while already fading restarts the envelope from the current
    /// (already reduced) gain; fades do not stack. A non-positive duration
    /// completes immediately. Fading while idle just fires the callback.
    pub fn fade_out(
        &mut self,
        hw: &mut dyn AudioBackend,
        voice: &Voice,
        duration: f32,
        on_complete: FadeCallback,
    ) -> Result<()> {
        if self.session.is_none() {
            on_complete();
            return Ok(());
        }
        if duration <= 0.0 {
            self.stop(hw, voice)?;
            on_complete();
            return Ok(());
        }

        let start_gain = self.envelope();
        debug!("Fade-out over {}s from envelope {}", duration, start_gain);
        self.state = State::FadingOut(FadeState {
            elapsed: 0.0,
            duration,
            start_gain,
            on_complete: Some(on_complete),
        });
        Ok(())
    }

    /// Queue a replacement track to start once the current fade completes,
    /// serializing the two sessions so buffers are never double-owned.
    pub fn queue_replacement(&mut self, decoder: AudioDecoder) {
        self.pending = Some(decoder);
    }

    /// Push a mixer gain change to the live voice. No-op when idle.
    pub fn on_volume_changed(
        &mut self,
        hw: &mut dyn AudioBackend,
        voice: &Voice,
        music_gain: f32,
    ) -> Result<()> {
        if self.session.is_some() {
            voice.set_gain(hw, music_gain * self.envelope())?;
        }
        Ok(())
    }

    /// Push a mixer pitch change to the live voice. No-op when idle.
    pub fn on_pitch_changed(
        &mut self,
        hw: &mut dyn AudioBackend,
        voice: &Voice,
        pitch: f32,
    ) -> Result<()> {
        if self.session.is_some() {
            voice.set_pitch(hw, pitch)?;
        }
        Ok(())
    }

    /// Advance the fade envelope and the streaming refill by one tick.
    pub fn update(
        &mut self,
        hw: &mut dyn AudioBackend,
        voice: &Voice,
        mixer: &MixerState,
        dt: f32,
    ) -> Result<()> {
        // Fade envelope first, so the tick that crosses the threshold stops
        // the voice before any further refill work
        if let State::FadingOut(fade) = &mut self.state {
            fade.elapsed += dt;
            let envelope = fade.envelope();
            voice.set_gain(hw, mixer.music_gain() * envelope)?;

            if fade.complete() {
                let on_complete = fade.on_complete.take();
                let next = self.pending.take();
                self.stop(hw, voice)?;
                if let Some(callback) = on_complete {
                    callback();
                }
                if let Some(decoder) = next {
                    self.start(hw, voice, mixer, decoder)?;
                }
                return Ok(());
            }
        }

        if let Some(session) = &mut self.session {
            session.tick(hw, voice)?;
            if session.finished(hw, voice)? {
                info!("Music track finished");
                self.stop(hw, voice)?;
                if let Some(hook) = &mut self.finished_hook {
                    hook();
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MockBackend;
    use crate::playback::test_util::wave_stream;
    use std::cell::Cell;
    use std::rc::Rc;

    fn decoder(samples: &[i16]) -> AudioDecoder {
        AudioDecoder::open(wave_stream(samples), 10).unwrap()
    }

    fn setup() -> (MockBackend, Voice, MixerState, MusicController) {
        let mut hw = MockBackend::new();
        let voice = Voice::new(&mut hw).unwrap();
        (hw, voice, MixerState::default(), MusicController::new(2))
    }

    #[test]
    fn start_applies_gain_and_pitch_before_playing() {
        let (mut hw, voice, mut mixer, mut music) = setup();
        mixer.set_master_volume(0.5);
        mixer.set_pitch(1.5);

        music
            .start(&mut hw, &voice, &mixer, decoder(&[1; 100]))
            .unwrap();

        assert_eq!(music.status(), MusicStatus::Playing);
        assert_eq!(hw.voice_gain(voice.handle()), Some(0.5));
        assert_eq!(hw.voice_pitch(voice.handle()), Some(1.5));
    }

    #[test]
    fn fade_envelope_matches_linear_ramp() {
        let (mut hw, voice, mixer, mut music) = setup();
        music
            .start(&mut hw, &voice, &mixer, decoder(&[1; 1000]))
            .unwrap();

        let fired = Rc::new(Cell::new(0u32));
        let observer = Rc::clone(&fired);
        music
            .fade_out(&mut hw, &voice, 1.0, Box::new(move || observer.set(observer.get() + 1)))
            .unwrap();

        let mut gains = Vec::new();
        for _ in 0..4 {
            music.update(&mut hw, &voice, &mixer, 0.25).unwrap();
            gains.push(hw.voice_gain(voice.handle()).unwrap());
        }

        assert_eq!(gains, vec![0.75, 0.5, 0.25, 0.0]);
        assert_eq!(fired.get(), 1);
        assert_eq!(music.status(), MusicStatus::Idle);

        // Further ticks must not fire the callback again
        music.update(&mut hw, &voice, &mixer, 0.25).unwrap();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn refading_restarts_from_reduced_gain() {
        let (mut hw, voice, mixer, mut music) = setup();
        music
            .start(&mut hw, &voice, &mixer, decoder(&[1; 1000]))
            .unwrap();

        music.fade_out(&mut hw, &voice, 1.0, Box::new(|| {})).unwrap();
        music.update(&mut hw, &voice, &mixer, 0.5).unwrap();
        assert_eq!(hw.voice_gain(voice.handle()), Some(0.5));

        // Restart the fade: envelope ramps from 0.5, not back up to 1.0
        music.fade_out(&mut hw, &voice, 1.0, Box::new(|| {})).unwrap();
        music.update(&mut hw, &voice, &mixer, 0.5).unwrap();
        assert_eq!(hw.voice_gain(voice.handle()), Some(0.25));
    }

    #[test]
    fn replacement_starts_after_fade_completes() {
        let (mut hw, voice, mixer, mut music) = setup();
        music
            .start(&mut hw, &voice, &mixer, decoder(&[1; 1000]))
            .unwrap();

        music.queue_replacement(decoder(&[2; 1000]));
        music.fade_out(&mut hw, &voice, 0.5, Box::new(|| {})).unwrap();

        music.update(&mut hw, &voice, &mixer, 0.25).unwrap();
        assert_eq!(music.status(), MusicStatus::FadingOut);

        music.update(&mut hw, &voice, &mixer, 0.25).unwrap();
        assert_eq!(music.status(), MusicStatus::Playing);

        // The replacement session queued fresh buffers on the same voice
        assert_eq!(voice.queued_count(&hw).unwrap(), 2);
    }

    #[test]
    fn volume_change_while_idle_is_a_noop() {
        let (mut hw, voice, _mixer, mut music) = setup();
        music.on_volume_changed(&mut hw, &voice, 0.3).unwrap();
        assert_eq!(hw.voice_gain(voice.handle()), Some(1.0));
    }

    #[test]
    fn volume_change_mid_fade_respects_envelope() {
        let (mut hw, voice, mixer, mut music) = setup();
        music
            .start(&mut hw, &voice, &mixer, decoder(&[1; 1000]))
            .unwrap();
        music.fade_out(&mut hw, &voice, 1.0, Box::new(|| {})).unwrap();
        music.update(&mut hw, &voice, &mixer, 0.5).unwrap();

        music.on_volume_changed(&mut hw, &voice, 0.8).unwrap();
        assert_eq!(hw.voice_gain(voice.handle()), Some(0.4));
    }

    #[test]
    fn track_finishing_naturally_goes_idle_and_fires_hook() {
        let (mut hw, voice, mixer, mut music) = setup();
        let finished = Rc::new(Cell::new(false));
        let observer = Rc::clone(&finished);
        music.set_finished_hook(Box::new(move || observer.set(true)));

        // 20 samples at chunk size 10 = exactly the 2-buffer look-ahead
        music
            .start(&mut hw, &voice, &mixer, decoder(&[3; 20]))
            .unwrap();

        hw.finish_buffers(voice.handle(), 2);
        music.update(&mut hw, &voice, &mixer, 0.016).unwrap();

        assert_eq!(music.status(), MusicStatus::Idle);
        assert!(finished.get());
        assert_eq!(hw.live_buffer_count(), 0);
    }

    #[test]
    fn fade_while_idle_fires_callback_immediately() {
        let (mut hw, voice, _mixer, mut music) = setup();
        let fired = Rc::new(Cell::new(false));
        let observer = Rc::clone(&fired);
        music
            .fade_out(&mut hw, &voice, 1.0, Box::new(move || observer.set(true)))
            .unwrap();
        assert!(fired.get());
    }

    #[test]
    fn stop_drops_pending_replacement() {
        let (mut hw, voice, mixer, mut music) = setup();
        music
            .start(&mut hw, &voice, &mixer, decoder(&[1; 1000]))
            .unwrap();
        music.queue_replacement(decoder(&[2; 1000]));
        music.fade_out(&mut hw, &voice, 1.0, Box::new(|| {})).unwrap();

        music.stop(&mut hw, &voice).unwrap();
        assert_eq!(music.status(), MusicStatus::Idle);

        music.update(&mut hw, &voice, &mixer, 1.0).unwrap();
        assert_eq!(music.status(), MusicStatus::Idle);
        assert_eq!(voice.queued_count(&hw).unwrap(), 0);
    }
}
