//! Process-wide mixer state
//!
//! Holds the master/music/effects volume levels and the global pitch. The
//! engine recomputes effective per-voice gain from these whenever one of
//! them changes and pushes it to the live music voice; effect voices pick up
//! the current levels at the moment they start.

/// Linear volume and pitch levels, 1.0 = unity.
///
/// Values are clamped to be non-negative; there is no upper bound, gains
/// above 1.0 amplify.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixerState {
    master: f32,
    music: f32,
    effects: f32,
    pitch: f32,
}

impl Default for MixerState {
    fn default() -> Self {
        Self {
            master: 1.0,
            music: 1.0,
            effects: 1.0,
            pitch: 1.0,
        }
    }
}

impl MixerState {
    pub fn master_volume(&self) -> f32 {
        self.master
    }

    pub fn music_volume(&self) -> f32 {
        self.music
    }

    pub fn effects_volume(&self) -> f32 {
        self.effects
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master = volume.max(0.0);
    }

    pub fn set_music_volume(&mut self, volume: f32) {
        self.music = volume.max(0.0);
    }

    pub fn set_effects_volume(&mut self, volume: f32) {
        self.effects = volume.max(0.0);
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.max(0.0);
    }

    /// Effective gain for the music voice, before the fade envelope.
    pub fn music_gain(&self) -> f32 {
        self.master * self.music
    }

    /// Effective gain for one-shot effect voices.
    pub fn effects_gain(&self) -> f32 {
        self.master * self.effects
    }
}
