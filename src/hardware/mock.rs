//! In-memory audio backend
//!
//! Deterministic [`AudioBackend`] implementation with no device behind it.
//! Playback does not advance on its own; tests call [`MockBackend::finish_buffers`]
//! to simulate the hardware consuming queued buffers, and
//! [`MockBackend::fail_next`] to inject a device error into a named
//! operation. Each queue operation records a snapshot of the buffer's
//! contents so tests can compare the played byte sequence against the
//! decoded one.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::hardware::{AudioBackend, BufferFormat, BufferHandle, PlayState, VoiceHandle};

#[derive(Debug)]
struct MockVoice {
    state: PlayState,
    gain: f32,
    pitch: f32,
    /// FIFO of queued buffers, head = oldest
    queue: Vec<BufferHandle>,
    /// Finished buffers at the head of the queue
    processed: usize,
}

impl MockVoice {
    fn new() -> Self {
        Self {
            state: PlayState::Initial,
            gain: 1.0,
            pitch: 1.0,
            queue: Vec::new(),
            processed: 0,
        }
    }
}

#[derive(Debug, Default)]
struct MockBuffer {
    pcm: Vec<i16>,
    format: Option<BufferFormat>,
    sample_rate: u32,
}

/// In-memory test backend.
#[derive(Default)]
pub struct MockBackend {
    next_id: u32,
    voices: HashMap<VoiceHandle, MockVoice>,
    buffers: HashMap<BufferHandle, MockBuffer>,
    /// Operation names whose next invocation fails
    fail_ops: Vec<&'static str>,
    /// Snapshots of buffer contents in queue order, per voice
    queue_history: HashMap<VoiceHandle, Vec<Vec<i16>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next invocation of `op` (e.g. `"buffer_data"`, `"play"`)
    /// report a device error.
    pub fn fail_next(&mut self, op: &'static str) {
        self.fail_ops.push(op);
    }

    fn check_injected(&mut self, op: &'static str) -> Result<()> {
        if let Some(pos) = self.fail_ops.iter().position(|o| *o == op) {
            self.fail_ops.remove(pos);
            return Err(Error::Hardware(format!("injected failure in {}", op)));
        }
        Ok(())
    }

    /// Simulate the device finishing up to `count` queued buffers.
    pub fn finish_buffers(&mut self, voice: VoiceHandle, count: usize) {
        if let Some(v) = self.voices.get_mut(&voice) {
            v.processed = (v.processed + count).min(v.queue.len());
        }
    }

    /// Contents most recently written into a buffer.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[i16]> {
        self.buffers.get(&buffer).map(|b| b.pcm.as_slice())
    }

    /// Every snapshot ever queued on `voice`, in queue order. Since the
    /// device plays its FIFO in order, this is the sequence a listener
    /// would hear.
    pub fn queue_history(&self, voice: VoiceHandle) -> &[Vec<i16>] {
        self.queue_history
            .get(&voice)
            .map(|h| h.as_slice())
            .unwrap_or(&[])
    }

    pub fn voice_gain(&self, voice: VoiceHandle) -> Option<f32> {
        self.voices.get(&voice).map(|v| v.gain)
    }

    pub fn voice_pitch(&self, voice: VoiceHandle) -> Option<f32> {
        self.voices.get(&voice).map(|v| v.pitch)
    }

    /// Number of live (not yet deleted) buffer handles.
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of live (not yet deleted) voice handles.
    pub fn live_voice_count(&self) -> usize {
        self.voices.len()
    }

    fn voice(&self, voice: VoiceHandle) -> Result<&MockVoice> {
        self.voices
            .get(&voice)
            .ok_or_else(|| Error::Hardware(format!("unknown voice {:?}", voice)))
    }

    fn voice_mut(&mut self, voice: VoiceHandle) -> Result<&mut MockVoice> {
        self.voices
            .get_mut(&voice)
            .ok_or_else(|| Error::Hardware(format!("unknown voice {:?}", voice)))
    }
}

impl AudioBackend for MockBackend {
    fn gen_voice(&mut self) -> Result<VoiceHandle> {
        self.check_injected("gen_voice")?;
        self.next_id += 1;
        let handle = VoiceHandle::from_raw(self.next_id);
        self.voices.insert(handle, MockVoice::new());
        Ok(handle)
    }

    fn delete_voice(&mut self, voice: VoiceHandle) -> Result<()> {
        self.check_injected("delete_voice")?;
        let v = self.voice(voice)?;
        if v.state == PlayState::Playing || v.state == PlayState::Paused {
            return Err(Error::Hardware(format!(
                "deleting voice {:?} while {:?}",
                voice, v.state
            )));
        }
        self.voices.remove(&voice);
        Ok(())
    }

    fn gen_buffers(&mut self, count: usize) -> Result<Vec<BufferHandle>> {
        self.check_injected("gen_buffers")?;
        let mut handles = Vec::with_capacity(count);
        for _ in 0..count {
            self.next_id += 1;
            let handle = BufferHandle::from_raw(self.next_id);
            self.buffers.insert(handle, MockBuffer::default());
            handles.push(handle);
        }
        Ok(handles)
    }

    fn delete_buffers(&mut self, buffers: &[BufferHandle]) -> Result<()> {
        self.check_injected("delete_buffers")?;
        for buffer in buffers {
            for (vh, v) in &self.voices {
                if v.queue.contains(buffer)
                    && (v.state == PlayState::Playing || v.state == PlayState::Paused)
                {
                    return Err(Error::Hardware(format!(
                        "deleting buffer {:?} still queued on active voice {:?}",
                        buffer, vh
                    )));
                }
            }
            self.buffers
                .remove(buffer)
                .ok_or_else(|| Error::Hardware(format!("unknown buffer {:?}", buffer)))?;
        }
        Ok(())
    }

    fn buffer_data(
        &mut self,
        buffer: BufferHandle,
        format: BufferFormat,
        pcm: &[i16],
        sample_rate: u32,
    ) -> Result<()> {
        self.check_injected("buffer_data")?;
        if pcm.len() % format.channels() as usize != 0 {
            return Err(Error::Hardware(format!(
                "{} samples do not divide into {:?} frames",
                pcm.len(),
                format
            )));
        }
        // Refilling a buffer that a voice still holds unprocessed is the
        // contract violation real devices punish with glitches
        for (vh, v) in &self.voices {
            if let Some(pos) = v.queue.iter().position(|b| *b == buffer) {
                if pos >= v.processed {
                    return Err(Error::Hardware(format!(
                        "filling buffer {:?} still queued unprocessed on voice {:?}",
                        buffer, vh
                    )));
                }
            }
        }
        let b = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| Error::Hardware(format!("unknown buffer {:?}", buffer)))?;
        b.pcm = pcm.to_vec();
        b.format = Some(format);
        b.sample_rate = sample_rate;
        Ok(())
    }

    fn queue_buffers(&mut self, voice: VoiceHandle, buffers: &[BufferHandle]) -> Result<()> {
        self.check_injected("queue_buffers")?;
        let mut snapshots = Vec::with_capacity(buffers.len());
        for buffer in buffers {
            let b = self
                .buffers
                .get(buffer)
                .ok_or_else(|| Error::Hardware(format!("unknown buffer {:?}", buffer)))?;
            snapshots.push(b.pcm.clone());
        }
        let v = self.voice_mut(voice)?;
        v.queue.extend_from_slice(buffers);
        self.queue_history
            .entry(voice)
            .or_default()
            .extend(snapshots);
        Ok(())
    }

    fn unqueue_buffers(&mut self, voice: VoiceHandle, count: usize) -> Result<Vec<BufferHandle>> {
        self.check_injected("unqueue_buffers")?;
        let v = self.voice_mut(voice)?;
        if count > v.processed {
            return Err(Error::Hardware(format!(
                "unqueueing {} buffers but only {} processed",
                count, v.processed
            )));
        }
        let removed: Vec<BufferHandle> = v.queue.drain(..count).collect();
        v.processed -= count;
        Ok(removed)
    }

    fn processed_count(&self, voice: VoiceHandle) -> Result<usize> {
        Ok(self.voice(voice)?.processed)
    }

    fn queued_count(&self, voice: VoiceHandle) -> Result<usize> {
        Ok(self.voice(voice)?.queue.len())
    }

    fn voice_state(&self, voice: VoiceHandle) -> Result<PlayState> {
        Ok(self.voice(voice)?.state)
    }

    fn play(&mut self, voice: VoiceHandle) -> Result<()> {
        self.check_injected("play")?;
        self.voice_mut(voice)?.state = PlayState::Playing;
        Ok(())
    }

    fn pause(&mut self, voice: VoiceHandle) -> Result<()> {
        self.check_injected("pause")?;
        let v = self.voice_mut(voice)?;
        if v.state == PlayState::Playing {
            v.state = PlayState::Paused;
        }
        Ok(())
    }

    fn stop(&mut self, voice: VoiceHandle) -> Result<()> {
        self.check_injected("stop")?;
        let v = self.voice_mut(voice)?;
        v.state = PlayState::Stopped;
        v.queue.clear();
        v.processed = 0;
        Ok(())
    }

    fn set_gain(&mut self, voice: VoiceHandle, gain: f32) -> Result<()> {
        self.check_injected("set_gain")?;
        self.voice_mut(voice)?.gain = gain;
        Ok(())
    }

    fn set_pitch(&mut self, voice: VoiceHandle, pitch: f32) -> Result<()> {
        self.check_injected("set_pitch")?;
        self.voice_mut(voice)?.pitch = pitch;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_never_exceeds_queued() {
        let mut hw = MockBackend::new();
        let voice = hw.gen_voice().unwrap();
        let buffers = hw.gen_buffers(3).unwrap();
        hw.queue_buffers(voice, &buffers).unwrap();

        hw.finish_buffers(voice, 10);
        assert_eq!(hw.processed_count(voice).unwrap(), 3);
        assert_eq!(hw.queued_count(voice).unwrap(), 3);
    }

    #[test]
    fn stop_flushes_queue_and_resets_processed() {
        let mut hw = MockBackend::new();
        let voice = hw.gen_voice().unwrap();
        let buffers = hw.gen_buffers(2).unwrap();
        hw.queue_buffers(voice, &buffers).unwrap();
        hw.play(voice).unwrap();
        hw.finish_buffers(voice, 1);

        hw.stop(voice).unwrap();
        assert_eq!(hw.processed_count(voice).unwrap(), 0);
        assert_eq!(hw.queued_count(voice).unwrap(), 0);
        assert_eq!(hw.voice_state(voice).unwrap(), PlayState::Stopped);
    }

    #[test]
    fn refilling_unprocessed_buffer_is_a_device_error() {
        let mut hw = MockBackend::new();
        let voice = hw.gen_voice().unwrap();
        let buffers = hw.gen_buffers(1).unwrap();
        hw.buffer_data(buffers[0], BufferFormat::Mono16, &[1, 2, 3], 44100)
            .unwrap();
        hw.queue_buffers(voice, &buffers).unwrap();

        let result = hw.buffer_data(buffers[0], BufferFormat::Mono16, &[4, 5, 6], 44100);
        assert!(matches!(result, Err(Error::Hardware(_))));
    }

    #[test]
    fn deleting_playing_voice_is_a_device_error() {
        let mut hw = MockBackend::new();
        let voice = hw.gen_voice().unwrap();
        hw.play(voice).unwrap();
        assert!(hw.delete_voice(voice).is_err());

        hw.stop(voice).unwrap();
        assert!(hw.delete_voice(voice).is_ok());
    }

    #[test]
    fn misaligned_stereo_fill_is_a_device_error() {
        let mut hw = MockBackend::new();
        let buffers = hw.gen_buffers(1).unwrap();

        // Three samples cannot be whole stereo frames
        let result = hw.buffer_data(buffers[0], BufferFormat::Stereo16, &[1, 2, 3], 44100);
        assert!(matches!(result, Err(Error::Hardware(_))));

        hw.buffer_data(buffers[0], BufferFormat::Stereo16, &[1, 2, 3, 4], 44100)
            .unwrap();
    }

    #[test]
    fn injected_failure_fires_once() {
        let mut hw = MockBackend::new();
        hw.fail_next("gen_voice");
        assert!(hw.gen_voice().is_err());
        assert!(hw.gen_voice().is_ok());
    }
}
