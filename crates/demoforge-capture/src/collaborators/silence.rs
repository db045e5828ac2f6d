// crates/demoforge-capture/src/collaborators/silence.rs
//
// Silence detection via the media toolchain's `silencedetect` filter,
// shelled out to exactly the way `audio.rs`/`waveform.rs` shell out to
// ffmpeg for extraction — spawn, stream stderr, parse the diagnostic lines.

use std::process::{Command, Stdio};

use demoforge_core::error::{DemoforgeError, Result};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SilenceWindow {
    pub start_ms: u64,
    pub end_ms: u64,
}

pub trait SilenceDetector: Send + Sync {
    fn detect(&self, audio_file: &std::path::Path, threshold_db: f32, min_duration_sec: f32) -> Result<Vec<SilenceWindow>>;
}

pub struct FfmpegSilenceDetector;

impl SilenceDetector for FfmpegSilenceDetector {
    fn detect(
        &self,
        audio_file: &std::path::Path,
        threshold_db: f32,
        min_duration_sec: f32,
    ) -> Result<Vec<SilenceWindow>> {
        let filter = format!("silencedetect=noise={threshold_db}dB:d={min_duration_sec}");
        let output = Command::new("ffmpeg")
            .arg("-i")
            .arg(audio_file)
            .arg("-af")
            .arg(&filter)
            .arg("-f")
            .arg("null")
            .arg("-")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| DemoforgeError::TtsFailure(format!("failed to spawn ffmpeg: {e}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        parse_silencedetect_output(&stderr)
    }
}

/// Parses lines like:
///   `[silencedetect @ 0x...] silence_start: 1.8`
///   `[silencedetect @ 0x...] silence_end: 2.1 | silence_duration: 0.3`
fn parse_silencedetect_output(stderr: &str) -> Result<Vec<SilenceWindow>> {
    let mut windows = Vec::new();
    let mut pending_start: Option<f64> = None;

    for line in stderr.lines() {
        if let Some(rest) = line.split("silence_start:").nth(1) {
            let value = rest.trim().split_whitespace().next().unwrap_or("");
            if let Ok(secs) = value.parse::<f64>() {
                pending_start = Some(secs);
            }
        } else if let Some(rest) = line.split("silence_end:").nth(1) {
            let value = rest.trim().split_whitespace().next().unwrap_or("");
            if let (Ok(end_secs), Some(start_secs)) = (value.parse::<f64>(), pending_start.take()) {
                windows.push(SilenceWindow {
                    start_ms: (start_secs * 1000.0).round() as u64,
                    end_ms: (end_secs * 1000.0).round() as u64,
                });
            }
        }
    }

    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_silence_start_and_end_pairs() {
        let stderr = "\
[silencedetect @ 0x1] silence_start: 1.8
[silencedetect @ 0x1] silence_end: 2.1 | silence_duration: 0.3
[silencedetect @ 0x1] silence_start: 4.0
[silencedetect @ 0x1] silence_end: 4.2 | silence_duration: 0.2
";
        let windows = parse_silencedetect_output(stderr).unwrap();
        assert_eq!(
            windows,
            vec![
                SilenceWindow { start_ms: 1800, end_ms: 2100 },
                SilenceWindow { start_ms: 4000, end_ms: 4200 },
            ]
        );
    }

    #[test]
    fn ignores_unmatched_start_without_end() {
        let stderr = "[silencedetect @ 0x1] silence_start: 1.8\n";
        assert!(parse_silencedetect_output(stderr).unwrap().is_empty());
    }
}
