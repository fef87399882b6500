// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Model download over HTTP.
//!
//! No download location is built in. When `DOCORI_MODEL_BASE_URL` (or an
//! explicit base URL) is set, a missing model `<name>` is fetched from
//! `<base>/<name>.onnx`.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{InferenceError, Result};

/// Environment variable holding the base URL models are downloaded from.
pub const MODEL_BASE_URL_ENV: &str = "DOCORI_MODEL_BASE_URL";

/// Connection timeout in seconds.
const CONNECT_TIMEOUT: u64 = 30;

/// Read timeout in seconds.
const READ_TIMEOUT: u64 = 300;

/// Width of the progress bar in characters.
const BAR_WIDTH: usize = 12;

/// Minimum seconds between two progress redraws.
const MIN_UPDATE_INTERVAL: f64 = 0.1;

/// Format bytes as human-readable string (e.g., "10.4MB").
fn format_bytes(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    if bytes >= GB {
        format!("{:.1}GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.1}KB", bytes / KB)
    } else {
        format!("{bytes:.0}B")
    }
}

/// Format time duration.
fn format_time(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1}s")
    } else if seconds < 3600.0 {
        let mins = (seconds / 60.0) as u32;
        let secs = seconds % 60.0;
        format!("{mins}:{secs:04.1}")
    } else {
        let hours = (seconds / 3600.0) as u32;
        let mins = ((seconds % 3600.0) / 60.0) as u32;
        let secs = seconds % 60.0;
        format!("{hours}:{mins:02}:{secs:04.1}")
    }
}

/// Generate progress bar string.
fn generate_bar(progress: f64, width: usize) -> String {
    let filled = (progress * width as f64) as usize;
    let partial = progress.mul_add(width as f64, -(filled as f64));

    let mut bar = "━".repeat(filled);
    if filled < width {
        if partial > 0.5 {
            bar.push('╸');
            bar.push_str(&"─".repeat(width - filled - 1));
        } else {
            bar.push_str(&"─".repeat(width - filled));
        }
    }
    bar
}

/// Progress line printed to stderr while a download runs.
struct Progress {
    desc: String,
    total: u64,
    done: u64,
    started: Instant,
    last_draw: Instant,
}

impl Progress {
    fn new(desc: String, total: u64) -> Self {
        let now = Instant::now();
        Self {
            desc,
            total,
            done: 0,
            started: now,
            last_draw: now,
        }
    }

    fn advance(&mut self, bytes: usize) {
        self.done += bytes as u64;
        if self.last_draw.elapsed().as_secs_f64() >= MIN_UPDATE_INTERVAL {
            self.last_draw = Instant::now();
            eprint!("\r\x1b[K{}", self.line(false));
            std::io::stderr().flush().ok();
        }
    }

    fn finish(&self) {
        eprintln!("\r\x1b[K{}", self.line(true));
    }

    fn line(&self, finished: bool) -> String {
        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.done as f64 / elapsed
        } else {
            0.0
        };

        if self.total == 0 {
            return format!(
                "{}: {} {}/s {}",
                self.desc,
                format_bytes(self.done as f64),
                format_bytes(rate),
                format_time(elapsed)
            );
        }

        let progress = if finished {
            1.0
        } else {
            (self.done as f64 / self.total as f64).min(1.0)
        };
        format!(
            "{}: {}% {} {}/{} {}/s {}",
            self.desc,
            (progress * 100.0) as u8,
            generate_bar(progress, BAR_WIDTH),
            format_bytes(self.done as f64),
            format_bytes(self.total as f64),
            format_bytes(rate),
            format_time(elapsed)
        )
    }
}

/// Base URL from `DOCORI_MODEL_BASE_URL`, if set and non-empty.
#[must_use]
pub fn base_url_from_env() -> Option<String> {
    std::env::var(MODEL_BASE_URL_ENV)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// URL of a model file below a base URL.
#[must_use]
pub fn model_url(base_url: &str, name: &str) -> String {
    format!("{}/{name}.onnx", base_url.trim_end_matches('/'))
}

/// Download `<base_url>/<name>.onnx` into `dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the download fails.
pub fn download_model(base_url: &str, name: &str, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| {
        InferenceError::ModelLoadError(format!(
            "Failed to create model directory {}: {e}",
            dir.display()
        ))
    })?;
    let dest = dir.join(format!("{name}.onnx"));
    download_file(&model_url(base_url, name), &dest)?;
    Ok(dest)
}

/// Download a file from URL to the specified path with progress bar.
///
/// The body is streamed into `<dest>.part` which is renamed to `dest` only
/// after the whole body has been written.
fn download_file(url: &str, dest: &Path) -> Result<()> {
    let config = ureq::Agent::config_builder()
        .timeout_connect(Some(Duration::from_secs(CONNECT_TIMEOUT)))
        .timeout_recv_body(Some(Duration::from_secs(READ_TIMEOUT)))
        .build();
    let agent = ureq::Agent::new_with_config(config);

    let response = agent.get(url).call().map_err(|e| {
        let msg = match &e {
            ureq::Error::Timeout(_) => format!("Connection timed out while downloading {url}"),
            ureq::Error::StatusCode(code) => format!("Server returned {code} for {url}"),
            ureq::Error::Io(io_err) => format!("Network error downloading {url}: {io_err}"),
            _ => format!("Failed to download {url}: {e}"),
        };
        InferenceError::ModelLoadError(msg)
    })?;

    let total_size: u64 = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let temp_path = dest.with_extension("part");
    let _ = fs::remove_file(&temp_path);

    let temp_file = File::create(&temp_path).map_err(|e| {
        InferenceError::ModelLoadError(format!(
            "Failed to create temp file {}: {e}",
            temp_path.display()
        ))
    })?;

    let mut progress = Progress::new(
        format!("Downloading {url} to '{}'", dest.display()),
        total_size,
    );
    let mut reader = response.into_body().into_reader();

    if let Err(e) = stream_to_file(&mut reader, temp_file, &mut progress) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    progress.finish();

    fs::rename(&temp_path, dest).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        InferenceError::ModelLoadError(format!(
            "Failed to move downloaded file to {}: {e}",
            dest.display()
        ))
    })
}

/// Copy `reader` into `file`, reporting each chunk to `progress`.
fn stream_to_file(reader: &mut impl Read, file: File, progress: &mut Progress) -> Result<()> {
    let mut writer = BufWriter::new(file);
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| {
            InferenceError::ModelLoadError(format!("Failed to read from network: {e}"))
        })?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read]).map_err(|e| {
            InferenceError::ModelLoadError(format!("Failed to write to temp file: {e}"))
        })?;
        progress.advance(bytes_read);
    }

    writer
        .flush()
        .map_err(|e| InferenceError::ModelLoadError(format!("Failed to flush temp file: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_url() {
        assert_eq!(
            model_url("https://host/models/", "PP-LCNet_x1_0_doc_ori"),
            "https://host/models/PP-LCNet_x1_0_doc_ori.onnx"
        );
        assert_eq!(model_url("http://h", "m"), "http://h/m.onnx");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500.0), "500B");
        assert_eq!(format_bytes(1024.0), "1.0KB");
        assert_eq!(format_bytes(1_048_576.0), "1.0MB");
        assert_eq!(format_bytes(1_073_741_824.0), "1.0GB");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(5.5), "5.5s");
        assert_eq!(format_time(65.0), "1:05.0");
    }

    #[test]
    fn test_generate_bar() {
        assert_eq!(generate_bar(0.0, 10), "──────────");
        assert_eq!(generate_bar(1.0, 10), "━━━━━━━━━━");
        assert_eq!(generate_bar(0.5, 10), "━━━━━─────");
    }

    #[test]
    fn test_stream_to_file_copies_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.part");
        let file = File::create(&path).unwrap();
        let mut progress = Progress::new("test".to_string(), 5);
        stream_to_file(&mut &b"hello"[..], file, &mut progress).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"hello");
        assert_eq!(progress.done, 5);
        assert!(progress.line(true).contains("100%"));
    }
}
