//! Hardware buffer pool
//!
//! Owns a fixed set of raw buffer handles, reserved eagerly at construction
//! and released together. Filling a slot replaces its previous contents
//! without reallocating the handle; the pool never resizes.

use tracing::debug;

use crate::decode::PcmChunk;
use crate::error::{Error, Result};
use crate::hardware::{AudioBackend, BufferFormat, BufferHandle};

/// Fixed-size collection of hardware buffers.
pub struct BufferPool {
    handles: Vec<BufferHandle>,
    disposed: bool,
}

impl BufferPool {
    /// Reserve `count` buffers on the backend.
    pub fn create(hw: &mut dyn AudioBackend, count: usize) -> Result<Self> {
        let handles = hw.gen_buffers(count)?;
        debug!("Reserved buffer pool of {} handles", count);
        Ok(Self {
            handles,
            disposed: false,
        })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Handle at `index`, or `IndexOutOfRange`.
    pub fn get(&self, index: usize) -> Result<BufferHandle> {
        self.handles
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                index,
                len: self.handles.len(),
            })
    }

    /// Fill the slot at `index` with a chunk's samples.
    pub fn fill(
        &self,
        hw: &mut dyn AudioBackend,
        index: usize,
        chunk: &PcmChunk,
        format: BufferFormat,
        sample_rate: u32,
    ) -> Result<()> {
        let handle = self.get(index)?;
        hw.buffer_data(handle, format, &chunk.samples, sample_rate)
    }

    /// Fill a buffer the pool owns, addressed by handle. Used by refill,
    /// where reclaimed handles come back from the voice rather than by index.
    pub fn fill_handle(
        &self,
        hw: &mut dyn AudioBackend,
        handle: BufferHandle,
        chunk: &PcmChunk,
        format: BufferFormat,
        sample_rate: u32,
    ) -> Result<()> {
        if !self.handles.contains(&handle) {
            return Err(Error::InvalidState(format!(
                "buffer {:?} does not belong to this pool",
                handle
            )));
        }
        hw.buffer_data(handle, format, &chunk.samples, sample_rate)
    }

    /// Distribute sequential chunks across slots, wrapping modulo pool size.
    ///
    /// Callers with more chunks than slots must drain and refill
    /// incrementally instead; that is an `OversizedInput` contract error
    /// here, not a silent overwrite.
    pub fn fill_all(
        &self,
        hw: &mut dyn AudioBackend,
        chunks: &[PcmChunk],
        format: BufferFormat,
        sample_rate: u32,
    ) -> Result<()> {
        if chunks.len() > self.handles.len() {
            return Err(Error::OversizedInput {
                supplied: chunks.len(),
                capacity: self.handles.len(),
            });
        }
        for (i, chunk) in chunks.iter().enumerate() {
            self.fill(hw, i % self.handles.len(), chunk, format, sample_rate)?;
        }
        Ok(())
    }

    /// Release every handle at once. Idempotent.
    pub fn dispose(&mut self, hw: &mut dyn AudioBackend) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        hw.delete_buffers(&self.handles)?;
        self.disposed = true;
        debug!("Released buffer pool of {} handles", self.handles.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MockBackend;

    fn chunk(samples: Vec<i16>) -> PcmChunk {
        PcmChunk { samples }
    }

    #[test]
    fn fill_out_of_range_fails() {
        let mut hw = MockBackend::new();
        let pool = BufferPool::create(&mut hw, 2).unwrap();

        let result = pool.fill(&mut hw, 2, &chunk(vec![0]), BufferFormat::Mono16, 44100);
        assert!(matches!(
            result,
            Err(Error::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn fill_all_rejects_more_chunks_than_slots() {
        let mut hw = MockBackend::new();
        let pool = BufferPool::create(&mut hw, 2).unwrap();

        let chunks = vec![chunk(vec![1]), chunk(vec![2]), chunk(vec![3])];
        let result = pool.fill_all(&mut hw, &chunks, BufferFormat::Mono16, 44100);
        assert!(matches!(
            result,
            Err(Error::OversizedInput {
                supplied: 3,
                capacity: 2
            })
        ));
    }

    #[test]
    fn fill_all_writes_each_slot() {
        let mut hw = MockBackend::new();
        let pool = BufferPool::create(&mut hw, 3).unwrap();

        let chunks = vec![chunk(vec![1, 1]), chunk(vec![2, 2])];
        pool.fill_all(&mut hw, &chunks, BufferFormat::Stereo16, 44100)
            .unwrap();

        assert_eq!(hw.buffer_contents(pool.get(0).unwrap()).unwrap(), &[1, 1]);
        assert_eq!(hw.buffer_contents(pool.get(1).unwrap()).unwrap(), &[2, 2]);
        assert_eq!(hw.buffer_contents(pool.get(2).unwrap()).unwrap(), &[] as &[i16]);
    }

    #[test]
    fn dispose_twice_is_a_noop() {
        let mut hw = MockBackend::new();
        let mut pool = BufferPool::create(&mut hw, 4).unwrap();
        assert_eq!(hw.live_buffer_count(), 4);

        pool.dispose(&mut hw).unwrap();
        assert_eq!(hw.live_buffer_count(), 0);
        pool.dispose(&mut hw).unwrap();
    }

    #[test]
    fn refill_of_foreign_handle_is_rejected() {
        let mut hw = MockBackend::new();
        let pool = BufferPool::create(&mut hw, 1).unwrap();
        let foreign = hw.gen_buffers(1).unwrap()[0];

        let result = pool.fill_handle(&mut hw, foreign, &chunk(vec![0]), BufferFormat::Mono16, 44100);
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }
}
