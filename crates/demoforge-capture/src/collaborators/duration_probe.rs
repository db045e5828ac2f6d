// crates/demoforge-capture/src/collaborators/duration_probe.rs
//
// Measures an audio file's duration. The primary path opens the container
// with ffmpeg-the-third the same way `probe.rs` does for video; the fallback
// estimates from file size and known PCM parameters when the container
// can't be opened (e.g. a raw headerless dump from a TTS backend).

use std::path::Path;

use demoforge_core::error::{DemoforgeError, Result};

pub trait DurationProbe: Send + Sync {
    fn duration_ms(&self, audio_file: &Path) -> Result<u64>;
}

pub struct FfmpegDurationProbe;

impl DurationProbe for FfmpegDurationProbe {
    fn duration_ms(&self, audio_file: &Path) -> Result<u64> {
        match ffmpeg_the_third::format::input(audio_file) {
            Ok(ctx) => {
                let duration = ctx.duration();
                if duration > 0 {
                    let ms = duration * 1000 / i64::from(ffmpeg_the_third::ffi::AV_TIME_BASE);
                    return Ok(ms.max(0) as u64);
                }
                // Fall through to the stream-level timebase if the
                // container didn't report an overall duration.
                if let Some(stream) = ctx.streams().best(ffmpeg_the_third::media::Type::Audio) {
                    let tb = stream.time_base();
                    let ms = stream.duration() * 1000 * i64::from(tb.numerator())
                        / i64::from(tb.denominator());
                    return Ok(ms.max(0) as u64);
                }
                pcm_fallback_duration_ms(audio_file)
            }
            Err(_) => pcm_fallback_duration_ms(audio_file),
        }
    }
}

/// Known parameters for the PCM produced by this codebase's own TTS and
/// silence-detection pipeline: 16-bit signed, mono, 24kHz.
const FALLBACK_SAMPLE_RATE: u64 = 24_000;
const FALLBACK_BYTES_PER_SAMPLE: u64 = 2;
const FALLBACK_CHANNELS: u64 = 1;
const WAV_HEADER_BYTES: u64 = 44;

fn pcm_fallback_duration_ms(audio_file: &Path) -> Result<u64> {
    let len = std::fs::metadata(audio_file)
        .map_err(|e| DemoforgeError::TtsFailure(format!("cannot stat {}: {e}", audio_file.display())))?
        .len();
    let data_bytes = len.saturating_sub(WAV_HEADER_BYTES);
    let bytes_per_sec = FALLBACK_SAMPLE_RATE * FALLBACK_BYTES_PER_SAMPLE * FALLBACK_CHANNELS;
    Ok(data_bytes * 1000 / bytes_per_sec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_fallback_estimates_from_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let bytes_per_sec = FALLBACK_SAMPLE_RATE * FALLBACK_BYTES_PER_SAMPLE;
        let one_second = vec![0u8; (WAV_HEADER_BYTES + bytes_per_sec) as usize];
        std::fs::write(&path, &one_second).unwrap();
        let ms = pcm_fallback_duration_ms(&path).unwrap();
        assert_eq!(ms, 1000);
    }
}
