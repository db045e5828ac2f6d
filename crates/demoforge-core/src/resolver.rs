// crates/demoforge-core/src/resolver.rs
//
// Maps one output frame index to either a source frame reference or a
// transition descriptor. Pure and deterministic — the render worker pool in
// demoforge-render calls this independently per frame with no shared state.

use crate::timeline::{ManifestEntry, TransitionKind, TransitionMarker};

#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedFrame {
    Source {
        file: String,
    },
    Transition {
        before_file: String,
        after_file: String,
        progress: f32,
        kind: TransitionKind,
    },
}

/// Expanded-frame count of the raw captured manifest (before transitions
/// insert additional output frames).
pub fn expanded_frame_count(manifest: &[ManifestEntry]) -> u64 {
    manifest.iter().map(|e| e.frame_count() as u64).sum()
}

/// Expanded index of the first virtual frame belonging to manifest entry `i`.
pub fn entry_to_first_expanded_frame(manifest: &[ManifestEntry], i: usize) -> u64 {
    manifest[..i].iter().map(|e| e.frame_count() as u64).sum()
}

fn expanded_frame_file(manifest: &[ManifestEntry], expanded: u64) -> String {
    let mut remaining = expanded;
    for entry in manifest {
        let count = entry.frame_count() as u64;
        if remaining < count {
            return entry.file().to_string();
        }
        remaining -= count;
    }
    manifest
        .last()
        .map(|e| e.file().to_string())
        .unwrap_or_default()
}

/// Total output frame count once every transition's net frame insertion
/// (`duration_frames - consumed_frames`) is accounted for.
pub fn total_output_frames(manifest: &[ManifestEntry], transitions: &[TransitionMarker]) -> u64 {
    let base = expanded_frame_count(manifest);
    let inserted: i64 = transitions
        .iter()
        .map(|t| t.duration_frames as i64 - t.consumed_frames as i64)
        .sum();
    (base as i64 + inserted).max(0) as u64
}

/// Resolve a single output frame. `f_out` is clamped into range by the
/// caller's own bounds check against `total_output_frames`.
pub fn resolve_output_frame(
    manifest: &[ManifestEntry],
    transitions: &[TransitionMarker],
    f_out: u64,
) -> ResolvedFrame {
    let mut offset: i64 = 0;

    for marker in transitions {
        let s = entry_to_first_expanded_frame(manifest, marker.after_entry_index)
            + manifest[marker.after_entry_index].frame_count() as u64
            - 1;
        let last_before = s as i64 + offset;
        let window_start = last_before + 1;
        let window_end = last_before + marker.duration_frames as i64;

        if (f_out as i64) >= window_start && (f_out as i64) <= window_end {
            let progress =
                (f_out as i64 - last_before) as f32 / marker.duration_frames as f32;
            let before_file = marker
                .before_file
                .clone()
                .unwrap_or_else(|| expanded_frame_file(manifest, s));
            let after_file = marker.after_file.clone().unwrap_or_else(|| {
                let next_entry = marker.after_entry_index + 1;
                if next_entry < manifest.len() {
                    manifest[next_entry].file().to_string()
                } else {
                    before_file.clone()
                }
            });
            return ResolvedFrame::Transition {
                before_file,
                after_file,
                progress: progress.clamp(0.0, 1.0),
                kind: marker.kind,
            };
        }

        offset += marker.duration_frames as i64 - marker.consumed_frames as i64;
    }

    let expanded_count = expanded_frame_count(manifest);
    let source_frame = (f_out as i64 - offset).clamp(0, expanded_count as i64 - 1) as u64;
    ResolvedFrame::Source {
        file: expanded_frame_file(manifest, source_frame),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(after: usize, kind: TransitionKind, duration: u32) -> TransitionMarker {
        TransitionMarker {
            after_entry_index: after,
            kind,
            duration_frames: duration,
            consumed_frames: 1,
            before_file: None,
            after_file: None,
        }
    }

    #[test]
    fn s1_one_scene_two_click_no_transitions() {
        let manifest = vec![
            ManifestEntry::Frame { file: "a.jpg".into() },
            ManifestEntry::Frame { file: "b.jpg".into() },
            ManifestEntry::Frame { file: "c.jpg".into() },
        ];
        assert_eq!(total_output_frames(&manifest, &[]), 3);
        assert_eq!(
            resolve_output_frame(&manifest, &[], 1),
            ResolvedFrame::Source { file: "b.jpg".into() }
        );
    }

    #[test]
    fn s2_one_transition() {
        let manifest = vec![
            ManifestEntry::Frame { file: "a.jpg".into() },
            ManifestEntry::Frame { file: "b.jpg".into() },
            ManifestEntry::Frame { file: "c.jpg".into() },
        ];
        let transitions = vec![marker(0, TransitionKind::Fade, 3)];
        assert_eq!(total_output_frames(&manifest, &transitions), 5);

        assert_eq!(
            resolve_output_frame(&manifest, &transitions, 0),
            ResolvedFrame::Source { file: "a.jpg".into() }
        );

        for (f_out, expected_progress) in [(1, 1.0 / 3.0), (2, 2.0 / 3.0), (3, 1.0)] {
            match resolve_output_frame(&manifest, &transitions, f_out) {
                ResolvedFrame::Transition { before_file, after_file, progress, .. } => {
                    assert_eq!(before_file, "a.jpg");
                    assert_eq!(after_file, "b.jpg");
                    assert!((progress - expected_progress as f32).abs() < 1e-5);
                }
                other => panic!("expected transition at {f_out}, got {other:?}"),
            }
        }

        assert_eq!(
            resolve_output_frame(&manifest, &transitions, 4),
            ResolvedFrame::Source { file: "c.jpg".into() }
        );
    }

    #[test]
    fn s3_hold_then_transition() {
        let manifest = vec![
            ManifestEntry::Frame { file: "a.jpg".into() },
            ManifestEntry::Hold { file: "b.jpg".into(), count: 3 },
            ManifestEntry::Frame { file: "c.jpg".into() },
        ];
        let transitions = vec![marker(1, TransitionKind::Fade, 2)];
        assert_eq!(expanded_frame_count(&manifest), 5);

        assert_eq!(
            resolve_output_frame(&manifest, &transitions, 3),
            ResolvedFrame::Source { file: "b.jpg".into() }
        );
        for f_out in [4, 5] {
            assert!(matches!(
                resolve_output_frame(&manifest, &transitions, f_out),
                ResolvedFrame::Transition { .. }
            ));
        }
    }

    #[test]
    fn boundary_single_frame_transition_has_progress_one() {
        let manifest = vec![
            ManifestEntry::Frame { file: "a.jpg".into() },
            ManifestEntry::Frame { file: "b.jpg".into() },
        ];
        let transitions = vec![marker(0, TransitionKind::Wipe, 1)];
        match resolve_output_frame(&manifest, &transitions, 1) {
            ResolvedFrame::Transition { progress, .. } => assert_eq!(progress, 1.0),
            other => panic!("expected transition, got {other:?}"),
        }
    }

    #[test]
    fn last_output_frame_resolves_to_last_manifest_file_with_no_transitions() {
        let manifest = vec![
            ManifestEntry::Frame { file: "a.jpg".into() },
            ManifestEntry::Frame { file: "b.jpg".into() },
        ];
        let total = total_output_frames(&manifest, &[]);
        assert_eq!(
            resolve_output_frame(&manifest, &[], total - 1),
            ResolvedFrame::Source { file: "b.jpg".into() }
        );
    }
}
