//! Streaming session: decode-and-refill over one voice
//!
//! Binds an open decoder to a voice and a buffer pool of K slots (K >= 2)
//! and keeps the voice's queue fed without ever holding more than K buffers
//! of audio in flight. The bounded look-ahead keeps memory flat for long
//! tracks and keeps stop/fade latency low.
//!
//! Refill order strictly matches decode order and the hardware plays its
//! FIFO in enqueue order; together those give gapless, non-reordered
//! playback.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::decode::{AudioDecoder, AudioFormat};
use crate::error::Result;
use crate::hardware::{AudioBackend, BufferFormat, BufferHandle};
use crate::playback::buffer_pool::BufferPool;
use crate::playback::voice::Voice;

/// One streamed playback session.
///
/// Created when streamed playback starts; disposal closes the decoder and
/// releases the buffers, but the voice itself goes back to the pool.
pub struct StreamSession {
    decoder: AudioDecoder,
    pool: BufferPool,
    format: AudioFormat,
    buffer_format: BufferFormat,
    /// Mirror of the hardware FIFO, head = oldest queued
    in_flight: VecDeque<BufferHandle>,
    /// End of stream reached; no more refills
    draining: bool,
}

impl StreamSession {
    /// Prime a session: fill up to `buffer_count` buffers with the opening
    /// chunks and queue them on the voice, in decode order.
    ///
    /// Tracks shorter than the look-ahead window simply queue fewer buffers
    /// and start out draining.
    pub fn start(
        hw: &mut dyn AudioBackend,
        voice: &Voice,
        mut decoder: AudioDecoder,
        buffer_count: usize,
    ) -> Result<Self> {
        let format = decoder.format();
        let buffer_format = format.buffer_format();
        let mut pool = BufferPool::create(hw, buffer_count)?;

        match Self::prime(hw, voice, &mut decoder, &pool, buffer_format, format.sample_rate, buffer_count) {
            Ok((in_flight, draining)) => {
                debug!(
                    "Primed stream session: {} of {} buffers queued, {} ch {} Hz",
                    in_flight.len(),
                    buffer_count,
                    format.channels,
                    format.sample_rate
                );
                Ok(Self {
                    decoder,
                    pool,
                    format,
                    buffer_format,
                    in_flight,
                    draining,
                })
            }
            Err(e) => {
                // Do not leak the reserved buffers on a failed prime
                let _ = voice.stop(hw);
                let _ = pool.dispose(hw);
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn prime(
        hw: &mut dyn AudioBackend,
        voice: &Voice,
        decoder: &mut AudioDecoder,
        pool: &BufferPool,
        buffer_format: BufferFormat,
        sample_rate: u32,
        buffer_count: usize,
    ) -> Result<(VecDeque<BufferHandle>, bool)> {
        let mut in_flight = VecDeque::with_capacity(buffer_count);
        let mut draining = false;

        for index in 0..buffer_count {
            match decoder.next_chunk()? {
                Some(chunk) => {
                    pool.fill(hw, index, &chunk, buffer_format, sample_rate)?;
                    let handle = pool.get(index)?;
                    voice.queue(hw, &[handle])?;
                    in_flight.push_back(handle);
                }
                None => {
                    draining = true;
                    break;
                }
            }
        }

        Ok((in_flight, draining))
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// True once the stream is exhausted and the voice has played every
    /// queued buffer.
    pub fn finished(&self, hw: &dyn AudioBackend, voice: &Voice) -> Result<bool> {
        Ok(self.draining && voice.finished_playing(hw)?)
    }

    /// One refill pass: reclaim processed buffers, decode replacement
    /// chunks, re-queue. Called once per update tick.
    pub fn tick(&mut self, hw: &mut dyn AudioBackend, voice: &Voice) -> Result<()> {
        let processed = voice.processed_count(hw)?;
        if processed == 0 {
            return Ok(());
        }

        for _ in 0..processed {
            let reclaimed = voice.unqueue(hw, 1)?;
            let Some(&handle) = reclaimed.first() else {
                // Hardware count and FIFO disagree; nothing safe to refill
                warn!("Voice reported a processed buffer but returned none on unqueue");
                break;
            };
            match self.in_flight.pop_front() {
                Some(expected) if expected == handle => {}
                _ => warn!("Reclaimed buffer {:?} out of expected FIFO order", handle),
            }

            if self.draining {
                continue;
            }

            match self.decoder.next_chunk()? {
                Some(chunk) => {
                    // Refilled buffers are appended, never inserted, so
                    // relative order always matches decode order
                    self.pool
                        .fill_handle(hw, handle, &chunk, self.buffer_format, self.format.sample_rate)?;
                    voice.queue(hw, &[handle])?;
                    self.in_flight.push_back(handle);
                }
                None => {
                    debug!("Stream exhausted; session draining");
                    self.draining = true;
                }
            }
        }

        Ok(())
    }

    /// Stop the voice and release the session's buffers. The decoder (and
    /// its file handle) closes when the session drops. Idempotent via the
    /// pool's own idempotence.
    pub fn dispose(&mut self, hw: &mut dyn AudioBackend, voice: &Voice) -> Result<()> {
        // Buffers may only be freed once their owning voice stopped
        voice.stop(hw)?;
        self.in_flight.clear();
        self.pool.dispose(hw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::AudioDecoder;
    use crate::hardware::MockBackend;
    use crate::playback::test_util::wave_stream;
    use crate::playback::voice::Voice;

    #[test]
    fn priming_queues_look_ahead_depth() {
        let mut hw = MockBackend::new();
        let voice = Voice::new(&mut hw).unwrap();
        let decoder = AudioDecoder::open(wave_stream(&[1; 100]), 10).unwrap();

        let session = StreamSession::start(&mut hw, &voice, decoder, 3).unwrap();
        assert_eq!(voice.queued_count(&hw).unwrap(), 3);
        assert!(!session.finished(&hw, &voice).unwrap());
    }

    #[test]
    fn short_track_primes_fewer_buffers() {
        let mut hw = MockBackend::new();
        let voice = Voice::new(&mut hw).unwrap();
        let decoder = AudioDecoder::open(wave_stream(&[1; 15]), 10).unwrap();

        // 15 samples at chunk size 10 = 2 chunks, pool of 3
        let session = StreamSession::start(&mut hw, &voice, decoder, 3).unwrap();
        assert_eq!(voice.queued_count(&hw).unwrap(), 2);

        hw.finish_buffers(voice.handle(), 2);
        assert!(session.finished(&hw, &voice).unwrap());
    }

    #[test]
    fn refill_preserves_decode_order() {
        let mut hw = MockBackend::new();
        let voice = Voice::new(&mut hw).unwrap();
        let samples: Vec<i16> = (0..50).collect();
        let decoder = AudioDecoder::open(wave_stream(&samples), 10).unwrap();

        let mut session = StreamSession::start(&mut hw, &voice, decoder, 2).unwrap();
        voice.play(&mut hw).unwrap();

        // Drive until drained, finishing one buffer per tick
        for _ in 0..20 {
            hw.finish_buffers(voice.handle(), 1);
            session.tick(&mut hw, &voice).unwrap();
        }

        let heard: Vec<i16> = hw
            .queue_history(voice.handle())
            .iter()
            .flatten()
            .copied()
            .collect();
        assert_eq!(heard, samples);
    }

    #[test]
    fn draining_session_stops_refilling() {
        let mut hw = MockBackend::new();
        let voice = Voice::new(&mut hw).unwrap();
        let decoder = AudioDecoder::open(wave_stream(&[7; 20]), 10).unwrap();

        let mut session = StreamSession::start(&mut hw, &voice, decoder, 2).unwrap();
        hw.finish_buffers(voice.handle(), 2);
        session.tick(&mut hw, &voice).unwrap();

        // Both chunks consumed at prime time; first tick discovers EOF
        assert_eq!(voice.queued_count(&hw).unwrap(), 0);
        assert!(session.finished(&hw, &voice).unwrap());
    }

    #[test]
    fn dispose_releases_buffers_but_not_voice() {
        let mut hw = MockBackend::new();
        let voice = Voice::new(&mut hw).unwrap();
        let decoder = AudioDecoder::open(wave_stream(&[1; 100]), 10).unwrap();

        let mut session = StreamSession::start(&mut hw, &voice, decoder, 3).unwrap();
        voice.play(&mut hw).unwrap();

        session.dispose(&mut hw, &voice).unwrap();
        assert_eq!(hw.live_buffer_count(), 0);
        assert_eq!(hw.live_voice_count(), 1);

        // Second dispose is a no-op
        session.dispose(&mut hw, &voice).unwrap();
    }
}
