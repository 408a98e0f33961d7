//! PCM decoding pipeline
//!
//! Turns an Ogg-Vorbis or RIFF/WAVE byte stream into fixed-size interleaved
//! 16-bit PCM chunks plus a format descriptor. The container is picked by
//! magic signature: `OggS` streams go through symphonia's Vorbis decoder and
//! stay lazy (only a look-ahead window of audio is ever decoded); `RIFF`
//! streams are parsed in-crate and materialized up front, which is fine for
//! the short clips WAVE is used for.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use symphonia::core::io::MediaSource;

use crate::error::{Error, Result};
use crate::hardware::BufferFormat;

mod vorbis;
mod wave;

pub use vorbis::VorbisDecoder;
pub use wave::WaveDecoder;

/// Stream properties derived from a decoded container header.
///
/// Immutable for the lifetime of the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// 1 (mono) or 2 (stereo)
    pub channels: u16,

    /// Native sample rate of the file; playback happens at this rate
    pub sample_rate: u32,

    /// Sample depth declared by the source container (8 or 16)
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// Hardware format tag for buffers filled from this stream.
    ///
    /// Chunks are uniformly widened to 16-bit at decode time, so only the
    /// 16-bit tags are ever produced here.
    pub fn buffer_format(&self) -> BufferFormat {
        match self.channels {
            1 => BufferFormat::Mono16,
            _ => BufferFormat::Stereo16,
        }
    }
}

/// One bounded unit of decoded PCM, sized to fit one hardware buffer.
///
/// Samples are signed 16-bit, interleaved by channel. The final chunk of a
/// stream may be shorter than the configured chunk size; it is queued as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmChunk {
    /// Interleaved samples, at most `chunk_samples` of them
    pub samples: Vec<i16>,
}

impl PcmChunk {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Saturating float-to-16-bit conversion.
///
/// Vorbis output is nominally in [-1.0, 1.0] but reconstructed samples may
/// slightly exceed that bound; an unclamped cast would wrap and produce
/// audible glitches.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).round().clamp(-32768.0, 32767.0) as i16
}

enum Inner {
    Wave(WaveDecoder),
    Vorbis(VorbisDecoder),
}

/// Decoder over one open audio stream.
///
/// Produces a finite, forward-only sequence of [`PcmChunk`]; reopening the
/// stream is the only way to restart it. The underlying file handle is
/// released on drop.
pub struct AudioDecoder {
    inner: Inner,
}

impl AudioDecoder {
    /// Open a byte stream, sniffing the container from its magic signature.
    ///
    /// `chunk_samples` bounds the interleaved length of each produced chunk;
    /// it is rounded down to a whole number of frames.
    pub fn open(mut source: Box<dyn MediaSource>, chunk_samples: usize) -> Result<Self> {
        let mut magic = [0u8; 4];
        source
            .read_exact(&mut magic)
            .map_err(|_| Error::UnsupportedFormat("stream shorter than a container signature".to_string()))?;
        source.seek(SeekFrom::Start(0))?;

        let inner = match &magic {
            b"RIFF" => Inner::Wave(WaveDecoder::parse(source, chunk_samples)?),
            b"OggS" => Inner::Vorbis(VorbisDecoder::open(source, chunk_samples)?),
            other => {
                return Err(Error::UnsupportedFormat(format!(
                    "unrecognized container signature {:02x?}",
                    other
                )))
            }
        };

        Ok(Self { inner })
    }

    /// Open a file by path.
    pub fn open_path<P: AsRef<Path>>(path: P, chunk_samples: usize) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::open(Box::new(file), chunk_samples)
    }

    pub fn format(&self) -> AudioFormat {
        match &self.inner {
            Inner::Wave(d) => d.format(),
            Inner::Vorbis(d) => d.format(),
        }
    }

    /// Next chunk of decoded PCM, or `None` at end of stream.
    pub fn next_chunk(&mut self) -> Result<Option<PcmChunk>> {
        match &mut self.inner {
            Inner::Wave(d) => d.next_chunk(),
            Inner::Vorbis(d) => d.next_chunk(),
        }
    }

    /// Drain the remaining stream into one sample vector.
    pub fn read_all(&mut self) -> Result<Vec<i16>> {
        let mut samples = Vec::new();
        while let Some(chunk) = self.next_chunk()? {
            samples.extend(chunk.samples);
        }
        Ok(samples)
    }
}

/// A fully decoded clip, ready to play on an effect voice.
#[derive(Debug, Clone)]
pub struct SoundData {
    pub format: AudioFormat,
    pub samples: Vec<i16>,
}

impl SoundData {
    /// Decode an entire stream into memory.
    pub fn load(source: Box<dyn MediaSource>, chunk_samples: usize) -> Result<Self> {
        let mut decoder = AudioDecoder::open(source, chunk_samples)?;
        let format = decoder.format();
        let samples = decoder.read_all()?;
        Ok(Self { format, samples })
    }

    /// Decode an entire file into memory.
    pub fn load_path<P: AsRef<Path>>(path: P, chunk_samples: usize) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::load(Box::new(file), chunk_samples)
    }
}
