// SPDX-License-Identifier: GPL-3.0-or-later

//! Streaming fingerprint generation.
//!
//! A [`Fingerprinter`] owns one backend context. PCM is fed as signed 16-bit
//! little-endian interleaved bytes; block boundaries may fall anywhere,
//! including between the two bytes of a sample.
//!
//! # Example
//!
//! ```no_run
//! use chromatag_fingerprint::{fingerprint_pcm, Backend};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pcm: Vec<Vec<u8>> = vec![vec![0u8; 44100 * 4]; 10];
//! let fp = fingerprint_pcm(&Backend::Native, 44100, 2, pcm, 120)?;
//! println!("{} ({:.1}s)", fp.hash, fp.duration);
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use tracing::{debug, instrument};

use crate::decoder::AudioDecoder;
use crate::fpcalc::FpcalcStream;
use crate::{Backend, Fingerprint, FingerprintError, RawFingerprint, Result};

enum Engine {
    #[cfg(feature = "native")]
    Native(crate::native::NativeContext),
    Fpcalc(FpcalcStream),
}

/// One in-progress fingerprint computation.
pub struct Fingerprinter {
    engine: Engine,
    sample_rate: u32,
    channels: u16,
    samples_fed: u64,
    max_samples: u64,
    carry: Option<u8>,
}

impl Fingerprinter {
    /// Start a new context for audio with the given properties.
    ///
    /// At most `max_length_secs` of audio is consumed; later blocks are
    /// accepted and ignored.
    pub fn start(
        backend: &Backend,
        sample_rate: u32,
        channels: u16,
        max_length_secs: u32,
    ) -> Result<Self> {
        Self::start_with(backend, sample_rate, channels, max_length_secs, false)
    }

    /// Start a context that will be finished with [`finish_raw`](Self::finish_raw).
    pub fn start_raw(
        backend: &Backend,
        sample_rate: u32,
        channels: u16,
        max_length_secs: u32,
    ) -> Result<Self> {
        Self::start_with(backend, sample_rate, channels, max_length_secs, true)
    }

    fn start_with(
        backend: &Backend,
        sample_rate: u32,
        channels: u16,
        max_length_secs: u32,
        raw: bool,
    ) -> Result<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(FingerprintError::InvalidParameters(format!(
                "sample rate {} Hz with {} channel(s)",
                sample_rate, channels
            )));
        }

        let engine = match backend {
            #[cfg(feature = "native")]
            Backend::Native => Engine::Native(crate::native::NativeContext::start(
                sample_rate,
                channels,
            )?),
            #[cfg(not(feature = "native"))]
            Backend::Native => {
                return Err(FingerprintError::BackendNotFound(
                    "built without libchromaprint support".to_string(),
                ))
            }
            Backend::Fpcalc(fpcalc) => {
                Engine::Fpcalc(fpcalc.spawn_stream(sample_rate, channels, max_length_secs, raw)?)
            }
        };

        Ok(Self {
            engine,
            sample_rate,
            channels,
            samples_fed: 0,
            max_samples: u64::from(max_length_secs)
                * u64::from(sample_rate)
                * u64::from(channels),
            carry: None,
        })
    }

    /// Whether the length cap has been reached.
    pub fn is_full(&self) -> bool {
        self.samples_fed >= self.max_samples
    }

    /// Seconds of audio consumed so far.
    pub fn duration(&self) -> f64 {
        let frames = self.samples_fed / u64::from(self.channels);
        frames as f64 / f64::from(self.sample_rate)
    }

    /// Feed one block of s16le interleaved PCM.
    pub fn feed(&mut self, block: &[u8]) -> Result<()> {
        if self.is_full() {
            return Ok(());
        }

        let mut bytes = Vec::with_capacity(block.len() + 1);
        bytes.extend(self.carry.take());
        bytes.extend_from_slice(block);
        if bytes.len() % 2 == 1 {
            self.carry = bytes.pop();
        }

        let mut samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        let remaining = self.max_samples - self.samples_fed;
        if samples.len() as u64 > remaining {
            debug!(
                target: "fingerprint",
                max_samples = self.max_samples,
                "truncating input at fingerprint length limit"
            );
            samples.truncate(remaining as usize);
        }

        if samples.is_empty() {
            return Ok(());
        }

        match &mut self.engine {
            #[cfg(feature = "native")]
            Engine::Native(ctx) => ctx.feed(&samples)?,
            Engine::Fpcalc(stream) => {
                let raw: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
                stream.write(&raw)?;
            }
        }

        self.samples_fed += samples.len() as u64;
        Ok(())
    }

    /// Finalize and return the fingerprint of everything fed so far.
    ///
    /// # Errors
    ///
    /// Returns [`FingerprintError::NoAudio`] when nothing was fed.
    pub fn finish(self) -> Result<Fingerprint> {
        let duration = self.fed_duration()?;

        let hash = match self.engine {
            #[cfg(feature = "native")]
            Engine::Native(ctx) => ctx.finish()?,
            Engine::Fpcalc(stream) => stream.finish()?.into_fingerprint()?.hash,
        };

        Ok(Fingerprint::new(hash, duration))
    }

    /// Finalize and return the uncompressed fingerprint.
    ///
    /// With the fpcalc backend the context must have been opened with
    /// [`start_raw`](Self::start_raw).
    pub fn finish_raw(self) -> Result<RawFingerprint> {
        let duration = self.fed_duration()?;

        let values = match self.engine {
            #[cfg(feature = "native")]
            Engine::Native(ctx) => ctx.finish_raw()?,
            Engine::Fpcalc(stream) => stream.finish()?.into_raw()?.values,
        };

        Ok(RawFingerprint::new(values, duration))
    }

    fn fed_duration(&self) -> Result<f64> {
        if self.samples_fed == 0 {
            return Err(FingerprintError::NoAudio);
        }

        let duration = self.duration();
        debug!(
            target: "fingerprint",
            samples = self.samples_fed,
            duration,
            "finalizing fingerprint"
        );
        Ok(duration)
    }
}

/// Fingerprint a complete sequence of PCM blocks.
pub fn fingerprint_pcm<I, B>(
    backend: &Backend,
    sample_rate: u32,
    channels: u16,
    blocks: I,
    max_length_secs: u32,
) -> Result<Fingerprint>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut fingerprinter = Fingerprinter::start(backend, sample_rate, channels, max_length_secs)?;
    for block in blocks {
        fingerprinter.feed(block.as_ref())?;
        if fingerprinter.is_full() {
            break;
        }
    }
    fingerprinter.finish()
}

/// Fingerprint an audio file.
///
/// The returned duration is that of the whole file, not just the part used
/// for the fingerprint.
#[instrument(skip(backend), fields(backend = %backend))]
pub fn fingerprint_file(
    backend: &Backend,
    path: &Path,
    max_length_secs: u32,
) -> Result<Fingerprint> {
    if let Backend::Fpcalc(fpcalc) = backend {
        return fpcalc.fingerprint_path(path, max_length_secs);
    }

    let (fingerprinter, duration) = feed_file(backend, path, max_length_secs, false)?;
    let mut fingerprint = fingerprinter.finish()?;
    fingerprint.duration = duration;
    Ok(fingerprint)
}

/// Fingerprint an audio file, returning the uncompressed fingerprint.
#[instrument(skip(backend), fields(backend = %backend))]
pub fn raw_fingerprint_file(
    backend: &Backend,
    path: &Path,
    max_length_secs: u32,
) -> Result<RawFingerprint> {
    if let Backend::Fpcalc(fpcalc) = backend {
        return fpcalc.raw_fingerprint_path(path, max_length_secs);
    }

    let (fingerprinter, duration) = feed_file(backend, path, max_length_secs, true)?;
    let mut raw = fingerprinter.finish_raw()?;
    raw.duration = duration;
    Ok(raw)
}

/// Decode `path` into a fresh context. Returns the context and the file's
/// total duration.
fn feed_file(
    backend: &Backend,
    path: &Path,
    max_length_secs: u32,
    raw: bool,
) -> Result<(Fingerprinter, f64)> {
    let mut decoder = AudioDecoder::open(path)?;
    let total_duration = decoder.duration();

    let mut fingerprinter = Fingerprinter::start_with(
        backend,
        decoder.sample_rate(),
        decoder.channels(),
        max_length_secs,
        raw,
    )?;

    // Without a frame count in the container, the rest of the file is
    // decoded and counted once the cap is reached.
    let decoded = feed_blocks(&mut fingerprinter, &mut decoder, total_duration.is_none())?;
    Ok((fingerprinter, total_duration.unwrap_or(decoded)))
}

/// Feed blocks until the context is full. With `measure_all`, keep reading
/// past the cap without feeding. Returns the seconds of audio read.
fn feed_blocks<I>(fingerprinter: &mut Fingerprinter, blocks: I, measure_all: bool) -> Result<f64>
where
    I: IntoIterator<Item = Result<Vec<u8>>>,
{
    let mut bytes_read = 0u64;
    for block in blocks {
        let block = block?;
        bytes_read += block.len() as u64;

        if !fingerprinter.is_full() {
            fingerprinter.feed(&block)?;
        }
        if fingerprinter.is_full() && !measure_all {
            break;
        }
    }

    let frames = bytes_read / (2 * u64::from(fingerprinter.channels));
    Ok(frames as f64 / f64::from(fingerprinter.sample_rate))
}
