//! Streaming Ogg-Vorbis decoding
//!
//! Compressed decoding is delegated to symphonia's Vorbis codec. The format
//! reader and decoder stay open for the lifetime of the session and packets
//! are pulled on demand, so a long background track never has more than the
//! pending remainder of one packet decoded ahead of what the caller asked
//! for. Decoded floats are converted to 16-bit PCM with the saturating cast
//! from [`crate::decode::sample_to_i16`].

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::decode::{sample_to_i16, AudioFormat, PcmChunk};
use crate::error::{Error, Result};

/// Decoder over one open Ogg-Vorbis stream.
///
/// Forward-only: there is no seek, a finished stream can only be restarted
/// by reopening the source.
pub struct VorbisDecoder {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    format: AudioFormat,
    chunk_samples: usize,
    /// Converted samples decoded past the last chunk boundary
    pending: Vec<i16>,
    eof: bool,
}

impl VorbisDecoder {
    /// Probe an Ogg stream and set up the Vorbis codec.
    pub fn open(source: Box<dyn MediaSource>, chunk_samples: usize) -> Result<Self> {
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        hint.with_extension("ogg");

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::CorruptStream(format!("Ogg probe failed: {}", e)))?;
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::UnsupportedFormat("no audio track in Ogg stream".to_string()))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let channels = codec_params
            .channels
            .map(|c| c.count())
            .ok_or_else(|| Error::CorruptStream("channel count missing from header".to_string()))?;
        if channels == 0 || channels > 2 {
            return Err(Error::UnsupportedFormat(format!(
                "{} channels (only mono and stereo are supported)",
                channels
            )));
        }

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| Error::CorruptStream("sample rate missing from header".to_string()))?;

        // Only the Vorbis codec is registered, anything else fails here
        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::UnsupportedFormat(format!("codec not supported: {}", e)))?;

        let format = AudioFormat {
            channels: channels as u16,
            sample_rate,
            bits_per_sample: 16,
        };

        debug!(
            "Opened Vorbis stream: {} ch, {} Hz, chunk size {}",
            channels, sample_rate, chunk_samples
        );

        let aligned = chunk_samples - (chunk_samples % channels);

        Ok(Self {
            reader,
            decoder,
            track_id,
            format,
            chunk_samples: aligned.max(channels),
            pending: Vec::with_capacity(chunk_samples),
            eof: false,
        })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Decode forward until one chunk is available, or `None` once the
    /// stream is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<PcmChunk>> {
        while !self.eof && self.pending.len() < self.chunk_samples {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.eof = true;
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    // Chained Ogg stream; the track we bound to is over
                    self.eof = true;
                    break;
                }
                Err(e) => {
                    return Err(Error::CorruptStream(format!("Ogg read failed: {}", e)));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    self.pending
                        .extend(buf.samples().iter().map(|&s| sample_to_i16(s)));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // A single damaged packet is recoverable, skip it
                    warn!("Skipping undecodable Vorbis packet: {}", e);
                    continue;
                }
                Err(e) => {
                    return Err(Error::CorruptStream(format!("Vorbis decode failed: {}", e)));
                }
            }
        }

        if self.pending.is_empty() {
            return Ok(None);
        }

        let take = self.pending.len().min(self.chunk_samples);
        let samples: Vec<i16> = self.pending.drain(..take).collect();
        Ok(Some(PcmChunk { samples }))
    }
}
