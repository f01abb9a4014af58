//! Network fetcher for toolchain archives and installers.
//!
//! Downloads are best-effort: a network error is logged and returned as a
//! warning, never as an `Err`. The provisioner re-runs the capability probe
//! afterwards, which is the real signal that something went wrong.

use anyhow::{Context, Result};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);
const STALE_REMOVE_ATTEMPTS: u32 = 3;
const STALE_REMOVE_DELAY: Duration = Duration::from_millis(100);

/// Outcome of an operation whose failure is tolerated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct BestEffort {
    pub warning: Option<String>,
}

impl BestEffort {
    pub fn ok() -> Self {
        Self { warning: None }
    }

    pub fn warned(message: impl Into<String>) -> Self {
        Self {
            warning: Some(message.into()),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warning.is_none()
    }
}

/// One advisory observation of a running transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub bytes: u64,
    /// Bytes per second since the previous observation.
    pub bytes_per_sec: f64,
    /// `None` when the server did not send a content length.
    pub percent: Option<f64>,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}/s",
            HumanBytes(self.bytes),
            HumanBytes(self.bytes_per_sec as u64)
        )?;
        match self.percent {
            Some(p) => write!(f, " ({:.1}%)", p),
            None => write!(f, " (unknown)"),
        }
    }
}

/// Rate-limits progress observations to one per interval.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    total: Option<u64>,
    last_at: Instant,
    last_bytes: u64,
}

impl ProgressThrottle {
    pub fn new(start: Instant, interval: Duration, total: Option<u64>) -> Self {
        Self {
            interval,
            total: total.filter(|t| *t > 0),
            last_at: start,
            last_bytes: 0,
        }
    }

    pub fn observe(&mut self, now: Instant, bytes: u64) -> Option<Progress> {
        let elapsed = now.saturating_duration_since(self.last_at);
        if elapsed < self.interval {
            return None;
        }
        let delta = bytes.saturating_sub(self.last_bytes);
        self.last_at = now;
        self.last_bytes = bytes;
        Some(Progress {
            bytes,
            bytes_per_sec: delta as f64 / elapsed.as_secs_f64(),
            percent: self
                .total
                .map(|t| (bytes as f64 / t as f64 * 100.0).min(100.0)),
        })
    }
}

/// Delete a leftover file, swallowing failures into a warning.
///
/// A file another process still holds open (an installer that just exited,
/// a virus scanner) is retried a few times before giving up.
pub fn remove_stale(path: &Path) -> BestEffort {
    let mut last_error = None;
    for attempt in 1..=STALE_REMOVE_ATTEMPTS {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!("removed stale {}", path.display());
                return BestEffort::ok();
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BestEffort::ok(),
            Err(e) => {
                debug!(attempt, error = %e, "stale file removal failed");
                last_error = Some(e);
                if attempt < STALE_REMOVE_ATTEMPTS {
                    std::thread::sleep(STALE_REMOVE_DELAY);
                }
            }
        }
    }

    let msg = format!(
        "Could not remove stale {}: {}",
        path.display(),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    );
    warn!("{}", msg);
    BestEffort::warned(msg)
}

pub struct Downloader {
    agent: ureq::Agent,
    show_progress: bool,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Downloader {
    pub fn new(show_progress: bool) -> Self {
        Self {
            agent: ureq::agent(),
            show_progress,
        }
    }

    /// Fetch `url` into `dest`. Never fails; problems come back as a warning
    /// and the caller must check the file before trusting it.
    pub fn download(&self, url: &str, dest: &Path) -> BestEffort {
        self.download_with(url, dest, &mut |p| debug!("download progress: {}", p))
    }

    pub fn download_with(
        &self,
        url: &str,
        dest: &Path,
        observe: &mut dyn FnMut(&Progress),
    ) -> BestEffort {
        let stale = remove_stale(dest);

        match self.transfer(url, dest, observe) {
            Ok(bytes) => {
                info!("downloaded {} ({})", url, HumanBytes(bytes));
                stale
            }
            Err(e) => {
                let msg = format!("Download of {} failed: {:#}", url, e);
                warn!("{}", msg);
                BestEffort::warned(msg)
            }
        }
    }

    fn transfer(&self, url: &str, dest: &Path, observe: &mut dyn FnMut(&Progress)) -> Result<u64> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| anyhow::anyhow!("request failed: {}", e))?;

        let total_size = response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let pb = if self.show_progress {
            let pb = ProgressBar::new(total_size.unwrap_or(0));
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.blue} [{elapsed_precise}] [{bar:40.green/black}] {bytes}/{total_bytes} ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .tick_chars("◐◓◑◒")
                    .progress_chars("━━╸"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file =
            File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
        let mut reader = response.into_body().into_reader();
        let mut buffer = [0; 8192];
        let mut throttle = ProgressThrottle::new(Instant::now(), PROGRESS_INTERVAL, total_size);
        let mut written = 0u64;

        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n])?;
            written += n as u64;
            pb.inc(n as u64);
            if let Some(progress) = throttle.observe(Instant::now(), written) {
                observe(&progress);
            }
        }
        file.flush()?;

        pb.finish_and_clear();
        Ok(written)
    }
}

/// Check a file's SHA-256 against an expected hex digest.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let mut file = File::open(path).with_context(|| {
        format!(
            "Failed to open file for hash verification: {}",
            path.display()
        )
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    let actual = format!("{:x}", hasher.finalize());
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "SHA256 mismatch for {}:\n  Expected: {}\n  Actual:   {}",
            path.display(),
            expected,
            actual
        ))
    }
}
