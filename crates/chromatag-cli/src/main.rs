// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chromatag::{
    AcoustidClient, Backend, BackendPreference, Fingerprint, Matcher, RecordingMatch, Submission,
    SubmissionStatus,
};
use chromatag_config::{load as load_config, AppConfig};
use chromatag_fingerprint::{fingerprint_file, raw_fingerprint_file};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Identify audio files with Chromaprint and AcoustID
#[derive(Parser, Debug)]
#[command(name = "chromatag", author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// AcoustID application API key (or set ACOUSTID_API_KEY env var)
    #[arg(long, global = true, env = "ACOUSTID_API_KEY")]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up recordings matching each file
    Match {
        /// Audio files to identify
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the fingerprint of each file
    Fingerprint {
        /// Seconds of audio to fingerprint
        #[arg(short, long)]
        length: Option<u32>,
        /// Print the raw uncompressed fingerprint as comma-separated integers
        #[arg(long)]
        raw: bool,
        /// Audio files to fingerprint
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Submit a file's fingerprint with optional metadata
    Submit {
        /// Audio file to submit
        file: PathBuf,
        /// AcoustID user API key (or set ACOUSTID_USER_KEY env var)
        #[arg(long, env = "ACOUSTID_USER_KEY")]
        user_key: Option<String>,
        /// MusicBrainz recording ID
        #[arg(long)]
        mbid: Option<String>,
        /// Track title
        #[arg(long)]
        track: Option<String>,
        /// Artist name
        #[arg(long)]
        artist: Option<String>,
        /// Album title
        #[arg(long)]
        album: Option<String>,
    },
    /// Show the status of a submission
    Status {
        /// Submission ID returned by `submit`
        id: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    init_tracing(&config.telemetry.log_level);

    if let Some(api_key) = cli.api_key {
        config.acoustid.api_key = Some(api_key);
    }

    match cli.command {
        Command::Match { files } => run_match(&config, &files).await,
        Command::Fingerprint { length, raw, files } => {
            run_fingerprint(&config, length, raw, &files).await
        }
        Command::Submit {
            file,
            user_key,
            mbid,
            track,
            artist,
            album,
        } => {
            let user_key = user_key
                .or_else(|| config.acoustid.user_key.clone())
                .ok_or_else(|| anyhow!("a user API key is required to submit"))?;
            let args = SubmissionArgs {
                mbid,
                track,
                artist,
                album,
            };
            run_submit(&config, &file, &user_key, args).await
        }
        Command::Status { id } => run_status(&config, id).await,
    }
}

fn init_tracing(default_level: &str) {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

async fn run_match(config: &AppConfig, files: &[PathBuf]) -> Result<()> {
    let matcher = Matcher::from_config(config)?;
    info!(target: "cli", backend = %matcher.backend(), "matching {} file(s)", files.len());

    let mut failed = 0;
    for file in files {
        match matcher.match_file(file).await {
            Ok(matches) => {
                println!("{}", file.display());
                let mut found = false;
                for m in matches {
                    found = true;
                    println!("{}", format_match(&m));
                }
                if !found {
                    println!("  No matches found");
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}: {}", file.display(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} file(s) could not be matched", failed, files.len());
    }
    Ok(())
}

async fn run_fingerprint(
    config: &AppConfig,
    length: Option<u32>,
    raw: bool,
    files: &[PathBuf],
) -> Result<()> {
    let backend = detect_backend(config)?;
    let max_length_secs = length.unwrap_or(config.fingerprint.max_length_secs);

    let mut failed = 0;
    let mut first = true;
    for file in files {
        let worker_backend = backend.clone();
        let path = file.clone();
        let result = tokio::task::spawn_blocking(move || {
            if raw {
                raw_fingerprint_file(&worker_backend, &path, max_length_secs)
                    .map(|fp| (fp.duration_secs(), fp.to_string()))
            } else {
                fingerprint_file(&worker_backend, &path, max_length_secs)
                    .map(|fp| (fp.duration_secs(), fp.hash))
            }
        })
        .await?;

        match result {
            Ok((duration_secs, fingerprint)) => {
                if !first {
                    println!();
                }
                first = false;
                println!("{}", format_fingerprint(file, duration_secs, &fingerprint));
            }
            Err(e) => {
                failed += 1;
                eprintln!(
                    "ERROR: unable to calculate fingerprint for file {}, skipping",
                    file.display()
                );
                warn!(target: "cli", file = %file.display(), "fingerprint failed: {}", e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} file(s) could not be fingerprinted", failed, files.len());
    }
    Ok(())
}

#[derive(Debug, Default)]
struct SubmissionArgs {
    mbid: Option<String>,
    track: Option<String>,
    artist: Option<String>,
    album: Option<String>,
}

async fn run_submit(
    config: &AppConfig,
    file: &Path,
    user_key: &str,
    args: SubmissionArgs,
) -> Result<()> {
    let matcher = Matcher::from_config(config)?;
    let fingerprint = matcher
        .fingerprint_file(file)
        .await
        .with_context(|| format!("failed to fingerprint {}", file.display()))?;

    let submission = build_submission(&fingerprint, args);
    let statuses = matcher.client().submit(user_key, &[submission]).await?;
    for status in &statuses {
        println!("{}", format_status(status));
    }
    Ok(())
}

async fn run_status(config: &AppConfig, id: u64) -> Result<()> {
    let api_key = config
        .acoustid
        .api_key
        .clone()
        .ok_or_else(|| anyhow!("an API key is required; pass --api-key or set acoustid.api_key"))?;

    let client = AcoustidClient::builder(api_key)
        .base_url(config.acoustid.base_url.clone())
        .timeout(config.acoustid.timeout())
        .rate_limit(config.acoustid.requests_per_window, config.acoustid.window())
        .build()?;

    let status = client.submission_status(id).await?;
    println!("{}", format_status(&status));
    Ok(())
}

fn detect_backend(config: &AppConfig) -> Result<Backend> {
    let preference: BackendPreference = config.fingerprint.backend.parse()?;
    let backend = Backend::detect(preference, config.fingerprint.fpcalc_path.as_deref())?;
    Ok(backend)
}

fn build_submission(fingerprint: &Fingerprint, args: SubmissionArgs) -> Submission {
    let mut submission = Submission::new(fingerprint);
    if let Some(mbid) = args.mbid {
        submission = submission.mbid(mbid);
    }
    if let Some(track) = args.track {
        submission = submission.track(track);
    }
    if let Some(artist) = args.artist {
        submission = submission.artist(artist);
    }
    if let Some(album) = args.album {
        submission = submission.album(album);
    }
    submission
}

fn format_match(m: &RecordingMatch) -> String {
    format!(
        "  {} - {}\n  https://musicbrainz.org/recording/{}\n  Score: {:.0}%",
        m.artist.as_deref().unwrap_or("Unknown artist"),
        m.title.as_deref().unwrap_or("Unknown title"),
        m.recording_id,
        m.score * 100.0
    )
}

fn format_fingerprint(file: &Path, duration_secs: u32, fingerprint: &str) -> String {
    format!(
        "FILE={}\nDURATION={}\nFINGERPRINT={}",
        file.display(),
        duration_secs,
        fingerprint
    )
}

fn format_status(status: &SubmissionStatus) -> String {
    match status.acoustid() {
        Some(acoustid) => format!("Submission {}: {} ({})", status.id, status.status, acoustid),
        None => format!("Submission {}: {}", status.id, status.status),
    }
}
