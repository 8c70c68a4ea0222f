// SPDX-License-Identifier: GPL-3.0-or-later

//! Thin wrapper over a libchromaprint context.

use chromaprint::Chromaprint;
use tracing::trace;

use crate::{FingerprintError, Result};

/// One libchromaprint context. Contexts are never shared between callers.
pub(crate) struct NativeContext {
    ctx: Chromaprint,
}

impl NativeContext {
    pub(crate) fn start(sample_rate: u32, channels: u16) -> Result<Self> {
        let sample_rate = i32::try_from(sample_rate).map_err(|_| {
            FingerprintError::InvalidParameters(format!("sample rate {} is out of range", sample_rate))
        })?;

        let mut ctx = Chromaprint::new();
        if !ctx.start(sample_rate, i32::from(channels)) {
            return Err(FingerprintError::Native(format!(
                "failed to start Chromaprint at {} Hz with {} channel(s)",
                sample_rate, channels
            )));
        }

        Ok(Self { ctx })
    }

    pub(crate) fn feed(&mut self, samples: &[i16]) -> Result<()> {
        trace!(target: "fingerprint", samples = samples.len(), "feeding libchromaprint");
        if !self.ctx.feed(samples) {
            return Err(FingerprintError::Native(
                "failed to feed samples to Chromaprint".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Result<String> {
        if !self.ctx.finish() {
            return Err(FingerprintError::Native(
                "Chromaprint finalize failed".to_string(),
            ));
        }

        self.ctx.fingerprint().ok_or_else(|| {
            FingerprintError::Native("Chromaprint did not return a fingerprint".to_string())
        })
    }

    pub(crate) fn finish_raw(mut self) -> Result<Vec<u32>> {
        if !self.ctx.finish() {
            return Err(FingerprintError::Native(
                "Chromaprint finalize failed".to_string(),
            ));
        }

        let raw = self.ctx.raw_fingerprint().ok_or_else(|| {
            FingerprintError::Native("Chromaprint did not return a raw fingerprint".to_string())
        })?;
        // Sub-fingerprints are bit patterns; keep them unsigned like fpcalc.
        Ok(raw.into_iter().map(|value| value as u32).collect())
    }
}
