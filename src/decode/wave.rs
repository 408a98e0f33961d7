//! RIFF/WAVE parsing
//!
//! Canonical PCM WAVE only: `RIFF` header, `fmt ` subchunk with format tag 1,
//! then a `data` subchunk. 8-bit data is widened to signed 16-bit so every
//! chunk leaving the decoder has the same sample type. Unlike the Vorbis
//! path, the whole data chunk is materialized before chunking; WAVE is used
//! for short clips, compressed streams are the ones worth streaming.

use std::io::Read;

use tracing::debug;

use crate::decode::{AudioFormat, PcmChunk};
use crate::error::{Error, Result};

/// Canonical `fmt ` subchunk payload length.
const FMT_CHUNK_LEN: u32 = 16;

/// WAVE PCM format tag. Compressed WAVE variants are not supported.
const WAVE_FORMAT_PCM: u16 = 1;

/// Decoder over one parsed WAVE stream.
pub struct WaveDecoder {
    format: AudioFormat,
    /// Entire data chunk, widened to i16
    samples: Vec<i16>,
    position: usize,
    chunk_samples: usize,
}

impl WaveDecoder {
    /// Parse a complete WAVE stream.
    ///
    /// Any signature mismatch or size field that contradicts the stream is
    /// [`Error::CorruptStream`]; a recognizable but unsupported encoding is
    /// [`Error::UnsupportedFormat`].
    pub fn parse<R: Read>(mut reader: R, chunk_samples: usize) -> Result<Self> {
        expect_tag(&mut reader, b"RIFF")?;
        let riff_size = read_u32(&mut reader)?;
        if riff_size < 36 {
            return Err(Error::CorruptStream(format!(
                "RIFF size {} too small for a WAVE header",
                riff_size
            )));
        }
        expect_tag(&mut reader, b"WAVE")?;

        expect_tag(&mut reader, b"fmt ")?;
        let fmt_size = read_u32(&mut reader)?;
        if fmt_size < FMT_CHUNK_LEN {
            return Err(Error::CorruptStream(format!(
                "fmt chunk size {} below canonical {}",
                fmt_size, FMT_CHUNK_LEN
            )));
        }

        let audio_format = read_u16(&mut reader)?;
        let channels = read_u16(&mut reader)?;
        let sample_rate = read_u32(&mut reader)?;
        let _byte_rate = read_u32(&mut reader)?;
        let block_align = read_u16(&mut reader)?;
        let bits_per_sample = read_u16(&mut reader)?;

        if audio_format != WAVE_FORMAT_PCM {
            return Err(Error::UnsupportedFormat(format!(
                "WAVE format tag {} (only PCM is supported)",
                audio_format
            )));
        }
        if channels != 1 && channels != 2 {
            return Err(Error::UnsupportedFormat(format!(
                "{} channels (only mono and stereo are supported)",
                channels
            )));
        }
        if bits_per_sample != 8 && bits_per_sample != 16 {
            return Err(Error::UnsupportedFormat(format!(
                "{} bits per sample (only 8 and 16 are supported)",
                bits_per_sample
            )));
        }
        if sample_rate == 0 {
            return Err(Error::CorruptStream("sample rate is zero".to_string()));
        }
        let expected_align = channels * (bits_per_sample / 8);
        if block_align != expected_align {
            return Err(Error::CorruptStream(format!(
                "block align {} contradicts {} channels at {} bits",
                block_align, channels, bits_per_sample
            )));
        }

        // Non-canonical writers pad the fmt chunk past 16 bytes
        skip_bytes(&mut reader, (fmt_size - FMT_CHUNK_LEN) as u64)?;

        expect_tag(&mut reader, b"data")?;
        let data_size = read_u32(&mut reader)?;
        if data_size as u64 % block_align as u64 != 0 {
            return Err(Error::CorruptStream(format!(
                "data size {} is not a whole number of {}-byte frames",
                data_size, block_align
            )));
        }

        let mut data = Vec::new();
        let read = reader
            .by_ref()
            .take(data_size as u64)
            .read_to_end(&mut data)?;
        if read < data_size as usize {
            return Err(Error::CorruptStream(format!(
                "data chunk declares {} bytes but stream holds {}",
                data_size, read
            )));
        }

        let samples = match bits_per_sample {
            8 => data
                .iter()
                .map(|&b| ((b as i16) - 128) << 8)
                .collect(),
            _ => data
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect::<Vec<i16>>(),
        };

        let format = AudioFormat {
            channels,
            sample_rate,
            bits_per_sample,
        };

        debug!(
            "Parsed WAVE stream: {} samples, {} ch, {} Hz, {} bits",
            samples.len(),
            channels,
            sample_rate,
            bits_per_sample
        );

        // Keep chunk boundaries on whole frames
        let chunk_samples = align_to_frames(chunk_samples, channels as usize);

        Ok(Self {
            format,
            samples,
            position: 0,
            chunk_samples,
        })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Next chunk of up to `chunk_samples` samples; the final chunk is
    /// truncated to the remaining length, never padded.
    pub fn next_chunk(&mut self) -> Result<Option<PcmChunk>> {
        if self.position >= self.samples.len() {
            return Ok(None);
        }
        let end = (self.position + self.chunk_samples).min(self.samples.len());
        let samples = self.samples[self.position..end].to_vec();
        self.position = end;
        Ok(Some(PcmChunk { samples }))
    }
}

fn align_to_frames(chunk_samples: usize, channels: usize) -> usize {
    let aligned = chunk_samples - (chunk_samples % channels);
    aligned.max(channels)
}

fn expect_tag<R: Read>(reader: &mut R, expected: &[u8; 4]) -> Result<()> {
    let mut tag = [0u8; 4];
    reader
        .read_exact(&mut tag)
        .map_err(|_| truncated(expected))?;
    if &tag != expected {
        return Err(Error::CorruptStream(format!(
            "expected {:?} signature, found {:02x?}",
            String::from_utf8_lossy(expected),
            tag
        )));
    }
    Ok(())
}

fn read_u16<R: Read>(reader: &mut R) -> Result<u16> {
    let mut bytes = [0u8; 2];
    reader
        .read_exact(&mut bytes)
        .map_err(|_| Error::CorruptStream("header field truncated".to_string()))?;
    Ok(u16::from_le_bytes(bytes))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    reader
        .read_exact(&mut bytes)
        .map_err(|_| Error::CorruptStream("header field truncated".to_string()))?;
    Ok(u32::from_le_bytes(bytes))
}

fn skip_bytes<R: Read>(reader: &mut R, count: u64) -> Result<()> {
    let copied = std::io::copy(&mut reader.by_ref().take(count), &mut std::io::sink())?;
    if copied < count {
        return Err(Error::CorruptStream(
            "stream ends inside a declared chunk".to_string(),
        ));
    }
    Ok(())
}

fn truncated(expected: &[u8; 4]) -> Error {
    Error::CorruptStream(format!(
        "stream ends before {:?} signature",
        String::from_utf8_lossy(expected)
    ))
}
