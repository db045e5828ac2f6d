// crates/demoforge-capture/src/narration.rs
//
// The narration preprocessor. Runs the scenario once against a no-op driver
// to collect narration texts in call order (a "dry run" — no browser, no
// capture, just the `narrate()` calls the script makes), synthesizes one
// audio file per concatenated script, then slices that audio into per-segment
// boundaries using silence detection so each segment gets a believable pause
// either side of it rather than a hard cut.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use demoforge_core::error::{DemoforgeError, Result};

use crate::collaborators::duration_probe::DurationProbe;
use crate::collaborators::silence::SilenceDetector;
use crate::collaborators::tts::{TtsOptions, TtsProvider};
use crate::runner::PreparedNarration;

const SCRIPT_SEPARATOR: &str = "\n\n...\n\n";
const DEFAULT_SILENCE_THRESHOLD_DB: f32 = -30.0;
const DEFAULT_MIN_SILENCE_SEC: f32 = 0.3;
const AUDIO_FILE_STEM: &str = "narration-full";
const AUDIO_EXT: &str = "wav";
const MANIFEST_FILE: &str = "narration-manifest.json";

/// Persisted alongside the synthesized clip so a later `--reuse-audio` run
/// can tell whether the cached audio still matches the scenario's script,
/// and so a human (or another tool) can read segment boundaries off disk
/// without re-running TTS.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NarrationManifest {
    provider: String,
    voice: Option<String>,
    full_script: String,
    full_script_hash: String,
    total_duration_ms: u64,
    silences_detected: usize,
    segments: Vec<NarrationSegment>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NarrationSegment {
    index: usize,
    text: String,
    start_ms: u64,
    end_ms: u64,
    duration_ms: u64,
}

/// One narration call the dry run observed, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NarrationCue {
    pub text: String,
}

/// Collects narration texts by driving a scenario closure against a no-op
/// driver. The closure is whatever builds a `CaptureContext` and runs the
/// scenario body against it; here it only needs to report `narrate()` calls,
/// so callers pass a plain callback instead of standing up a full capture.
pub fn collect_narration_cues<F>(run_dry: F) -> Vec<NarrationCue>
where
    F: FnOnce(&mut dyn FnMut(&str)),
{
    let mut cues = Vec::new();
    let mut record = |text: &str| cues.push(NarrationCue { text: text.to_string() });
    run_dry(&mut record);
    cues
}

pub struct NarrationPreprocessor<'a> {
    tts: &'a dyn TtsProvider,
    silence: &'a dyn SilenceDetector,
    duration: &'a dyn DurationProbe,
    options: TtsOptions,
    cache_dir: PathBuf,
}

impl<'a> NarrationPreprocessor<'a> {
    pub fn new(
        tts: &'a dyn TtsProvider,
        silence: &'a dyn SilenceDetector,
        duration: &'a dyn DurationProbe,
        options: TtsOptions,
        cache_dir: impl Into<PathBuf>,
    ) -> NarrationPreprocessor<'a> {
        NarrationPreprocessor {
            tts,
            silence,
            duration,
            options,
            cache_dir: cache_dir.into(),
        }
    }

    /// Synthesize (or reuse a cached) audio file for the full concatenated
    /// script, then split it into one `PreparedNarration` per cue.
    pub fn prepare(&self, cues: &[NarrationCue]) -> Result<Vec<PreparedNarration>> {
        if cues.is_empty() {
            return Ok(Vec::new());
        }

        let script = cues
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(SCRIPT_SEPARATOR);
        let script_hash = content_hash(&script);
        let audio_path = self.cache_dir.join(format!("{AUDIO_FILE_STEM}.{AUDIO_EXT}"));
        let manifest_path = self.cache_dir.join(MANIFEST_FILE);

        let cached = audio_path.exists()
            && read_manifest(&manifest_path).is_some_and(|m| m.full_script_hash == script_hash);

        if cached {
            tracing::info!(path = %audio_path.display(), "reusing cached narration audio");
        } else {
            std::fs::create_dir_all(&self.cache_dir)
                .map_err(|e| DemoforgeError::TtsFailure(format!("cannot create cache dir: {e}")))?;
            self.tts.synthesize(&script, &self.options, &audio_path)?;
        }

        let total_ms = self.duration.duration_ms(&audio_path)?;
        let (boundaries, silences_detected) = self.segment_boundaries(&audio_path, cues.len(), total_ms)?;

        let mut prepared = Vec::with_capacity(cues.len());
        let mut segments = Vec::with_capacity(cues.len());
        for (i, cue) in cues.iter().enumerate() {
            let start_ms = boundaries[i];
            let end_ms = boundaries[i + 1];
            let duration_ms = end_ms.saturating_sub(start_ms);
            segments.push(NarrationSegment {
                index: i,
                text: cue.text.clone(),
                start_ms,
                end_ms,
                duration_ms,
            });
            prepared.push(PreparedNarration {
                text: cue.text.clone(),
                duration_ms,
                audio_file: if i == 0 {
                    Some(audio_path.to_string_lossy().into_owned())
                } else {
                    None
                },
            });
        }

        if !cached {
            let manifest = NarrationManifest {
                provider: self.tts.name().to_string(),
                voice: self.options.voice.clone(),
                full_script: script,
                full_script_hash: script_hash,
                total_duration_ms: total_ms,
                silences_detected,
                segments,
            };
            let bytes = serde_json::to_vec_pretty(&manifest)
                .map_err(|e| DemoforgeError::TtsFailure(format!("serialize narration manifest: {e}")))?;
            std::fs::write(&manifest_path, bytes)
                .map_err(|e| DemoforgeError::TtsFailure(format!("write narration manifest: {e}")))?;
        }

        Ok(prepared)
    }

    /// Returns `cue_count + 1` boundary timestamps (ms) spanning `0..=total_ms`.
    /// Picks the `cue_count - 1` longest silences, ordered by start time, and
    /// cuts at each silence's midpoint. Falls back to a proportional split
    /// (by character count) when too few silences were detected.
    fn segment_boundaries(&self, audio_path: &Path, cue_count: usize, total_ms: u64) -> Result<(Vec<u64>, usize)> {
        let needed = cue_count.saturating_sub(1);
        if needed == 0 {
            return Ok((vec![0, total_ms], 0));
        }

        let mut windows = self
            .silence
            .detect(audio_path, DEFAULT_SILENCE_THRESHOLD_DB, DEFAULT_MIN_SILENCE_SEC)?;
        let detected = windows.len();

        if windows.len() < needed {
            tracing::warn!(
                found = windows.len(),
                needed,
                "too few silences detected; falling back to proportional split"
            );
            return Ok((proportional_boundaries(cue_count, total_ms), detected));
        }

        windows.sort_by_key(|w| std::cmp::Reverse(w.end_ms - w.start_ms));
        windows.truncate(needed);
        windows.sort_by_key(|w| w.start_ms);

        let mut boundaries = Vec::with_capacity(cue_count + 1);
        boundaries.push(0);
        for w in &windows {
            boundaries.push((w.start_ms + w.end_ms) / 2);
        }
        boundaries.push(total_ms);
        Ok((boundaries, detected))
    }
}

/// Reads a previously written narration manifest, if present and parseable.
/// A missing or corrupt manifest is treated as a cache miss rather than an
/// error — the caller just re-synthesizes.
fn read_manifest(path: &Path) -> Option<NarrationManifest> {
    let bytes = std::fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn proportional_boundaries(cue_count: usize, total_ms: u64) -> Vec<u64> {
    // Equal split; a length-weighted split would need the cue texts here,
    // and an even cut is the simpler honest fallback when silence detection
    // can't tell us where segments actually end.
    let step = total_ms / cue_count as u64;
    let mut boundaries: Vec<u64> = (0..cue_count as u64).map(|i| i * step).collect();
    boundaries.push(total_ms);
    boundaries
}

fn content_hash(script: &str) -> String {
    use md5::{Digest, Md5};
    let digest = Md5::digest(script.as_bytes());
    format!("{digest:x}")
}

/// Raised after recording when the number of `narrate()` calls actually made
/// during capture doesn't match the dry run the preprocessor observed.
pub fn check_narration_match(expected: usize, actual_remaining: &VecDeque<PreparedNarration>) -> Result<()> {
    if !actual_remaining.is_empty() {
        return Err(DemoforgeError::NarrationMismatch {
            expected,
            actual: expected - actual_remaining.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::duration_probe::DurationProbe;
    use crate::collaborators::silence::SilenceWindow;

    struct FixedTts;
    impl TtsProvider for FixedTts {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn synthesize(&self, _: &str, _: &TtsOptions, out_path: &Path) -> Result<()> {
            std::fs::write(out_path, b"fake-audio").map_err(|e| DemoforgeError::TtsFailure(e.to_string()))
        }
    }

    struct FixedDuration(u64);
    impl DurationProbe for FixedDuration {
        fn duration_ms(&self, _: &Path) -> Result<u64> {
            Ok(self.0)
        }
    }

    struct FixedSilence(Vec<SilenceWindow>);
    impl SilenceDetector for FixedSilence {
        fn detect(&self, _: &Path, _: f32, _: f32) -> Result<Vec<SilenceWindow>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn collects_cues_in_call_order() {
        let cues = collect_narration_cues(|narrate| {
            narrate("first");
            narrate("second");
        });
        assert_eq!(
            cues,
            vec![
                NarrationCue { text: "first".into() },
                NarrationCue { text: "second".into() },
            ]
        );
    }

    #[test]
    fn prepare_splits_on_detected_silences() {
        let tts = FixedTts;
        let silence = FixedSilence(vec![
            SilenceWindow { start_ms: 1000, end_ms: 1200 },
            SilenceWindow { start_ms: 2000, end_ms: 2100 },
        ]);
        let duration = FixedDuration(3000);
        let dir = tempfile::tempdir().unwrap();
        let pre = NarrationPreprocessor::new(&tts, &silence, &duration, TtsOptions::default(), dir.path());

        let cues = vec![
            NarrationCue { text: "one".into() },
            NarrationCue { text: "two".into() },
        ];
        let prepared = pre.prepare(&cues).unwrap();
        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared[0].duration_ms, 1100);
        assert_eq!(prepared[1].duration_ms, 1900);
        assert!(prepared[0].audio_file.is_some());
        assert!(prepared[1].audio_file.is_none());
    }

    #[test]
    fn prepare_reuses_cached_audio_when_manifest_hash_matches() {
        use std::cell::Cell;

        struct CountingTts(Cell<u32>);
        impl TtsProvider for CountingTts {
            fn name(&self) -> &'static str {
                "fixed"
            }
            fn synthesize(&self, _: &str, _: &TtsOptions, out_path: &Path) -> Result<()> {
                self.0.set(self.0.get() + 1);
                std::fs::write(out_path, b"fake-audio").map_err(|e| DemoforgeError::TtsFailure(e.to_string()))
            }
        }

        let tts = CountingTts(Cell::new(0));
        let silence = FixedSilence(vec![]);
        let duration = FixedDuration(1000);
        let dir = tempfile::tempdir().unwrap();
        let cues = vec![NarrationCue { text: "one".into() }];

        {
            let pre = NarrationPreprocessor::new(&tts, &silence, &duration, TtsOptions::default(), dir.path());
            pre.prepare(&cues).unwrap();
        }
        assert_eq!(tts.0.get(), 1);
        assert!(dir.path().join("narration-full.wav").exists());
        assert!(dir.path().join("narration-manifest.json").exists());

        {
            let pre = NarrationPreprocessor::new(&tts, &silence, &duration, TtsOptions::default(), dir.path());
            pre.prepare(&cues).unwrap();
        }
        assert_eq!(tts.0.get(), 1, "second prepare() with an unchanged script should reuse the cache");

        {
            let pre = NarrationPreprocessor::new(&tts, &silence, &duration, TtsOptions::default(), dir.path());
            pre.prepare(&[NarrationCue { text: "different".into() }]).unwrap();
        }
        assert_eq!(tts.0.get(), 2, "a changed script should re-synthesize");
    }

    #[test]
    fn prepare_falls_back_to_proportional_split_when_silences_scarce() {
        let tts = FixedTts;
        let silence = FixedSilence(vec![]);
        let duration = FixedDuration(3000);
        let dir = tempfile::tempdir().unwrap();
        let pre = NarrationPreprocessor::new(&tts, &silence, &duration, TtsOptions::default(), dir.path());

        let cues = vec![
            NarrationCue { text: "one".into() },
            NarrationCue { text: "two".into() },
            NarrationCue { text: "three".into() },
        ];
        let prepared = pre.prepare(&cues).unwrap();
        assert_eq!(prepared.len(), 3);
        assert_eq!(prepared.iter().map(|p| p.duration_ms).sum::<u64>(), 3000);
    }
}
