// crates/demoforge-render/src/render.rs
//
// Ties the frame resolver, the compositor, and the encoder together. Frames
// are composited in parallel (decode + transition blend are the expensive,
// embarrassingly-parallel part) in fixed-size batches, then handed to the
// encoder in order — the encoder itself is inherently sequential (PTS must
// increase monotonically into one muxer).

use std::path::Path;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use demoforge_core::error::{DemoforgeError, Result};
use demoforge_core::resolver::{resolve_output_frame, total_output_frames};
use demoforge_core::timeline::{ManifestEntry, TransitionMarker};

use crate::compositor::{compose, draw_chrome_overlay, draw_cursor_overlay, ripple_progress_at, FrameCache};
use crate::encoder::{Encoder, EncodeSpec, PlacedAudio};
use demoforge_core::resolver::ResolvedFrame;

/// One cursor waypoint and one click event, already resolved to output-frame
/// time by the caller (the remapper has already run by this point, so these
/// are in output time, not source time).
#[derive(Clone, Copy, Debug)]
pub struct CursorWaypoint {
    pub output_ms: u64,
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Copy, Debug)]
pub struct ClickMarker {
    pub output_ms: u64,
    pub x: i32,
    pub y: i32,
}

/// A scene whose `slide` style was set, in output-frame time — the chrome
/// overlay and cursor are both suppressed for its whole span, same as
/// during a transition.
#[derive(Clone, Debug)]
pub struct SlideWindow {
    pub start_ms: u64,
    pub end_ms: u64,
}

/// The browser-chrome address bar's label as of a given output timestamp —
/// one entry per `navigate()` call, in source order.
#[derive(Clone, Debug)]
pub struct ChromeLabel {
    pub output_ms: u64,
    pub text: String,
}

const BATCH_SIZE: usize = 64;

/// Sizes the render worker pool to roughly 75% of available cores, leaving
/// headroom for the encoder thread and the OS.
fn build_pool() -> ThreadPool {
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    let workers = ((cores * 3) / 4).max(1);
    ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .expect("build render thread pool")
}

pub struct RenderJob<'a> {
    pub manifest: &'a [ManifestEntry],
    pub transitions: &'a [TransitionMarker],
    pub frames_dir: &'a Path,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub cursor_path: &'a [CursorWaypoint],
    pub clicks: &'a [ClickMarker],
    pub slide_windows: &'a [SlideWindow],
    pub chrome_labels: &'a [ChromeLabel],
    pub output: &'a Path,
    pub cursor_overlay_enabled: bool,
}

pub fn render(job: RenderJob, narration: Vec<PlacedAudio>, encoder: &impl Encoder) -> Result<()> {
    let total = total_output_frames(job.manifest, job.transitions);
    if total == 0 {
        return Err(DemoforgeError::RenderFailure("timeline produced zero output frames".into()));
    }

    let cache = FrameCache::new(job.frames_dir.to_path_buf(), job.width, job.height);
    let pool = build_pool();

    let spec = EncodeSpec {
        width: job.width,
        height: job.height,
        fps: job.fps,
        total_frames: total,
        narration,
        output: job.output.to_path_buf(),
    };

    let mut batch_start = 0u64;
    let mut pending: Vec<Vec<u8>> = Vec::new();

    encoder.encode(&spec, |f_out| {
        if pending.is_empty() || f_out >= batch_start + pending.len() as u64 {
            let batch_end = (f_out + BATCH_SIZE as u64).min(total);
            pending = pool.install(|| {
                (f_out..batch_end)
                    .into_par_iter()
                    .map(|f| composite_one_frame(&job, &cache, f))
                    .collect::<Result<Vec<_>>>()
            })?;
            batch_start = f_out;
        }
        let idx = (f_out - batch_start) as usize;
        Ok(std::mem::take(&mut pending[idx]))
    })
}

fn composite_one_frame(job: &RenderJob, cache: &FrameCache, f_out: u64) -> Result<Vec<u8>> {
    let resolved = resolve_output_frame(job.manifest, job.transitions, f_out);
    let mut buf = compose(cache, &resolved, job.width, job.height)?;
    let output_ms = f_out * 1000 / job.fps as u64;
    let in_transition = matches!(resolved, ResolvedFrame::Transition { .. });
    let in_slide = in_slide_window(job.slide_windows, output_ms);
    let y_len = (job.width * job.height) as usize;

    if !in_transition && !in_slide {
        if let Some(label) = chrome_label_at(job.chrome_labels, output_ms) {
            draw_chrome_overlay(&mut buf[..y_len], job.width, job.height, label);
        }
    }

    if job.cursor_overlay_enabled && !in_transition && !in_slide {
        if let Some(pos) = cursor_position_at(job.cursor_path, output_ms) {
            let ripple = job
                .clicks
                .iter()
                .filter(|c| c.output_ms <= output_ms)
                .max_by_key(|c| c.output_ms)
                .and_then(|c| ripple_progress_at(output_ms.saturating_sub(c.output_ms)));
            draw_cursor_overlay(&mut buf[..y_len], job.width, job.height, pos, ripple);
        }
    }

    Ok(buf)
}

fn in_slide_window(windows: &[SlideWindow], output_ms: u64) -> bool {
    windows.iter().any(|w| output_ms >= w.start_ms && output_ms < w.end_ms)
}

/// Most recent navigate label at or before `output_ms`, if any `navigate()`
/// has happened yet.
fn chrome_label_at(labels: &[ChromeLabel], output_ms: u64) -> Option<&str> {
    labels
        .iter()
        .filter(|l| l.output_ms <= output_ms)
        .max_by_key(|l| l.output_ms)
        .map(|l| l.text.as_str())
}

fn cursor_position_at(path: &[CursorWaypoint], output_ms: u64) -> Option<(i32, i32)> {
    if path.is_empty() {
        return None;
    }
    if output_ms <= path[0].output_ms {
        return Some((path[0].x, path[0].y));
    }
    for pair in path.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if output_ms >= a.output_ms && output_ms <= b.output_ms {
            let span = (b.output_ms - a.output_ms).max(1) as f32;
            let t = (output_ms - a.output_ms) as f32 / span;
            return Some(crate::compositor::interpolate_cursor((a.x, a.y), (b.x, b.y), t));
        }
    }
    let last = path.last().unwrap();
    Some((last.x, last.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_position_holds_before_first_waypoint() {
        let path = vec![CursorWaypoint { output_ms: 500, x: 10, y: 10 }];
        assert_eq!(cursor_position_at(&path, 0), Some((10, 10)));
    }

    #[test]
    fn cursor_position_interpolates_between_waypoints() {
        let path = vec![
            CursorWaypoint { output_ms: 0, x: 0, y: 0 },
            CursorWaypoint { output_ms: 1000, x: 100, y: 0 },
        ];
        let (x, _) = cursor_position_at(&path, 500).unwrap();
        assert!(x > 0 && x < 100);
    }

    #[test]
    fn cursor_position_holds_after_last_waypoint() {
        let path = vec![
            CursorWaypoint { output_ms: 0, x: 0, y: 0 },
            CursorWaypoint { output_ms: 1000, x: 100, y: 0 },
        ];
        assert_eq!(cursor_position_at(&path, 5000), Some((100, 0)));
    }

    #[test]
    fn slide_window_covers_its_half_open_range() {
        let windows = vec![SlideWindow { start_ms: 1000, end_ms: 3000 }];
        assert!(!in_slide_window(&windows, 999));
        assert!(in_slide_window(&windows, 1000));
        assert!(in_slide_window(&windows, 2999));
        assert!(!in_slide_window(&windows, 3000));
    }

    #[test]
    fn chrome_label_tracks_most_recent_navigate() {
        let labels = vec![
            ChromeLabel { output_ms: 0, text: "example.com/".into() },
            ChromeLabel { output_ms: 2000, text: "example.com/pricing".into() },
        ];
        assert_eq!(chrome_label_at(&labels, 500), Some("example.com/"));
        assert_eq!(chrome_label_at(&labels, 2500), Some("example.com/pricing"));
        assert_eq!(chrome_label_at(&[], 100), None);
    }
}
