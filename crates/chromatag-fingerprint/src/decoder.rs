// SPDX-License-Identifier: GPL-3.0-or-later

//! Audio decoding into interleaved 16-bit PCM blocks.
//!
//! # Supported Formats
//!
//! - FLAC
//! - MP3
//! - WAV / raw PCM
//! - Ogg Vorbis
//!
//! Blocks are produced lazily, one per decoded packet, so callers can stop
//! reading once they have enough audio.
//!
//! # Example
//!
//! ```no_run
//! use chromatag_fingerprint::AudioDecoder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let decoder = AudioDecoder::open("song.flac")?;
//! println!("{} Hz, {} channel(s)", decoder.sample_rate(), decoder.channels());
//! for block in decoder {
//!     let pcm = block?;
//!     // pcm is s16le, interleaved
//! #   let _ = pcm;
//! }
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, instrument};

use crate::{FingerprintError, Result};

/// Streaming decoder over one audio file.
pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    duration: Option<f64>,
    pending: Option<Vec<u8>>,
    done: bool,
}

impl AudioDecoder {
    /// Open and probe a file.
    ///
    /// The first packet is decoded eagerly so that the sample rate and
    /// channel count are known even for containers that omit them.
    ///
    /// # Errors
    ///
    /// Returns [`FingerprintError::Decode`] if the file cannot be opened,
    /// probed, or contains no decodable audio track.
    #[instrument(fields(file = ?path.as_ref()))]
    pub fn open<P: AsRef<Path> + std::fmt::Debug>(path: P) -> Result<Self> {
        let path = path.as_ref();

        debug!(target: "fingerprint", "opening audio file");
        let file = File::open(path).map_err(|e| {
            FingerprintError::Decode(format!("failed to open {}: {}", path.display(), e))
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| FingerprintError::Decode(format!("failed to probe stream: {}", e)))?;

        let format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| FingerprintError::Decode("no audio tracks found".to_string()))?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| FingerprintError::Decode(format!("failed to create decoder: {}", e)))?;

        let mut this = Self {
            format,
            decoder,
            track_id,
            sample_rate: params.sample_rate.unwrap_or(0),
            channels: params
                .channels
                .map(|c| c.count() as u16)
                .unwrap_or(0),
            duration: None,
            pending: None,
            done: false,
        };

        this.pending = this.decode_next()?;
        if this.sample_rate == 0 || this.channels == 0 {
            return Err(FingerprintError::Decode(
                "could not determine sample rate or channel count".to_string(),
            ));
        }

        this.duration = params
            .n_frames
            .map(|frames| frames as f64 / f64::from(this.sample_rate));

        debug!(
            target: "fingerprint",
            sample_rate = this.sample_rate,
            channels = this.channels,
            duration = ?this.duration,
            "audio stream opened"
        );

        Ok(this)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Total duration in seconds, when the container reports a frame count.
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Decode packets until one yields audio, or the stream ends.
    fn decode_next(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => {
                    return Ok(None)
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => {
                    return Err(FingerprintError::Decode(format!(
                        "error reading packet: {}",
                        e
                    )))
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = self
                .decoder
                .decode(&packet)
                .map_err(|e| FingerprintError::Decode(format!("failed to decode frame: {}", e)))?;

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            if spec.rate > 0 {
                self.sample_rate = spec.rate;
            }
            self.channels = spec.channels.count() as u16;

            let mut buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
            buf.copy_interleaved_ref(decoded);

            let bytes = buf
                .samples()
                .iter()
                .flat_map(|sample| sample.to_le_bytes())
                .collect();
            return Ok(Some(bytes));
        }
    }
}

impl Iterator for AudioDecoder {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(block) = self.pending.take() {
            return Some(Ok(block));
        }
        if self.done {
            return None;
        }

        match self.decode_next() {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
