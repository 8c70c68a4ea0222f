// SPDX-License-Identifier: GPL-3.0-or-later

//! Fingerprinting through the `fpcalc` command-line tool shipped with Chromaprint.
//!
//! Used when libchromaprint is not linked in. The tool is located from an
//! explicit path, then the `FPCALC` environment variable, then `PATH` and a
//! few common installation directories.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use serde::Deserialize;
use tracing::{debug, instrument, trace};

use crate::{Fingerprint, FingerprintError, RawFingerprint, Result};

/// Environment variable naming the `fpcalc` executable.
pub const FPCALC_ENV: &str = "FPCALC";

#[cfg(windows)]
const FPCALC_PATHS: &[&str] = &[
    "fpcalc",
    r"C:\Program Files\Chromaprint\fpcalc.exe",
    r"C:\Program Files\MusicBrainz Picard\fpcalc.exe",
    r"C:\Program Files (x86)\Chromaprint\fpcalc.exe",
    r"C:\Program Files (x86)\MusicBrainz Picard\fpcalc.exe",
];

#[cfg(not(windows))]
const FPCALC_PATHS: &[&str] = &[
    "fpcalc",
    "/usr/bin/fpcalc",
    "/usr/local/bin/fpcalc",
    "/opt/homebrew/bin/fpcalc",
];

/// A located `fpcalc` executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FpcalcBackend {
    path: PathBuf,
}

impl FpcalcBackend {
    /// Use the given executable without probing it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find a working `fpcalc`.
    ///
    /// An explicit path, or one named by `FPCALC`, is authoritative: if it
    /// does not run, the search stops there.
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        let configured = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(FPCALC_ENV).map(PathBuf::from));

        if let Some(path) = configured {
            return if is_usable(&path) {
                Ok(Self::new(path))
            } else {
                Err(FingerprintError::BackendNotFound(format!(
                    "fpcalc at {} could not be executed",
                    path.display()
                )))
            };
        }

        FPCALC_PATHS
            .iter()
            .map(Path::new)
            .find(|path| is_usable(path))
            .map(Self::new)
            .ok_or_else(|| {
                FingerprintError::BackendNotFound(
                    "fpcalc not found. Install Chromaprint: https://acoustid.org/chromaprint"
                        .to_string(),
                )
            })
    }

    /// Version string reported by the tool.
    pub fn version(&self) -> Result<String> {
        let output = Command::new(&self.path)
            .arg("-version")
            .output()
            .map_err(|e| spawn_error(&self.path, e))?;

        if !output.status.success() {
            return Err(FingerprintError::Tool(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Let the tool decode and fingerprint a file itself.
    pub fn fingerprint_path(&self, path: &Path, max_length_secs: u32) -> Result<Fingerprint> {
        self.run_on_path(path, max_length_secs, false)?.into_fingerprint()
    }

    /// Like [`fingerprint_path`](Self::fingerprint_path), but returns the
    /// uncompressed fingerprint.
    pub fn raw_fingerprint_path(
        &self,
        path: &Path,
        max_length_secs: u32,
    ) -> Result<RawFingerprint> {
        self.run_on_path(path, max_length_secs, true)?.into_raw()
    }

    #[instrument(skip(self), fields(fpcalc = %self.path.display()))]
    fn run_on_path(&self, path: &Path, max_length_secs: u32, raw: bool) -> Result<FpcalcOutput> {
        let mut command = Command::new(&self.path);
        command.arg("-json");
        if raw {
            command.arg("-raw");
        }
        let output = command
            .arg("-length")
            .arg(max_length_secs.to_string())
            .arg(path)
            .output()
            .map_err(|e| spawn_error(&self.path, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FingerprintError::Tool(stderr.trim().to_string()));
        }

        parse_json(&output.stdout)
    }

    /// Start a process that reads raw s16le PCM from stdin.
    pub(crate) fn spawn_stream(
        &self,
        sample_rate: u32,
        channels: u16,
        max_length_secs: u32,
        raw: bool,
    ) -> Result<FpcalcStream> {
        debug!(
            target: "fingerprint",
            fpcalc = %self.path.display(),
            sample_rate,
            channels,
            raw,
            "starting fpcalc on stdin"
        );

        let mut command = Command::new(&self.path);
        command.arg("-json");
        if raw {
            command.arg("-raw");
        }
        let mut child = command
            .args(["-format", "s16le"])
            .arg("-rate")
            .arg(sample_rate.to_string())
            .arg("-channels")
            .arg(channels.to_string())
            .arg("-length")
            .arg(max_length_secs.to_string())
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&self.path, e))?;

        let stdin = child.stdin.take();
        Ok(FpcalcStream {
            child: Some(child),
            stdin,
        })
    }
}

/// A running `fpcalc` fed through its stdin.
pub(crate) struct FpcalcStream {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl FpcalcStream {
    pub(crate) fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Ok(());
        };

        match stdin.write_all(bytes) {
            Ok(()) => Ok(()),
            // fpcalc stops reading once it has enough audio.
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                trace!(target: "fingerprint", "fpcalc closed its input");
                self.stdin = None;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn finish(mut self) -> Result<FpcalcOutput> {
        drop(self.stdin.take());

        let child = self
            .child
            .take()
            .ok_or_else(|| FingerprintError::Tool("fpcalc process already reaped".to_string()))?;
        let output = child.wait_with_output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FingerprintError::Tool(stderr.trim().to_string()));
        }

        parse_json(&output.stdout)
    }
}

impl Drop for FpcalcStream {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FpcalcPrint {
    Compressed(String),
    Raw(Vec<u32>),
}

/// Parsed `fpcalc -json` output, compressed or raw depending on `-raw`.
#[derive(Debug, Deserialize)]
pub(crate) struct FpcalcOutput {
    fingerprint: FpcalcPrint,
    duration: f64,
}

impl FpcalcOutput {
    pub(crate) fn into_fingerprint(self) -> Result<Fingerprint> {
        match self.fingerprint {
            FpcalcPrint::Compressed(hash) => Ok(Fingerprint::new(hash, self.duration)),
            FpcalcPrint::Raw(_) => Err(FingerprintError::Tool(
                "fpcalc returned a raw fingerprint where a compressed one was expected"
                    .to_string(),
            )),
        }
    }

    pub(crate) fn into_raw(self) -> Result<RawFingerprint> {
        match self.fingerprint {
            FpcalcPrint::Raw(values) => Ok(RawFingerprint::new(values, self.duration)),
            FpcalcPrint::Compressed(_) => Err(FingerprintError::Tool(
                "fpcalc returned a compressed fingerprint where a raw one was expected"
                    .to_string(),
            )),
        }
    }
}

fn parse_json(stdout: &[u8]) -> Result<FpcalcOutput> {
    serde_json::from_slice(stdout)
        .map_err(|e| FingerprintError::Tool(format!("failed to parse fpcalc output: {}", e)))
}

fn is_usable(path: &Path) -> bool {
    Command::new(path)
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn spawn_error(path: &Path, err: std::io::Error) -> FingerprintError {
    if err.kind() == ErrorKind::NotFound {
        FingerprintError::BackendNotFound(format!("fpcalc not found at {}", path.display()))
    } else {
        FingerprintError::Io(err)
    }
}
