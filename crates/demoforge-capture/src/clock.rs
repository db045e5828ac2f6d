// crates/demoforge-capture/src/clock.rs
//
// The virtual clock and frame manifest builder. Single-writer by design —
// the scenario runner and the clock share one logical task, coordinated by
// a pause flag rather than by sharding capture across threads (mirrors the
// media worker's separation of concerns: one background thread only for the
// slow part, disk I/O, never for the clock itself).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Sender};
use md5::{Digest, Md5};

use demoforge_core::timeline::ManifestEntry;

/// Warn if achieved capture rate falls below this fraction of target fps.
const DRIFT_WARN_THRESHOLD: f64 = 0.85;

struct WriteJob {
    path: PathBuf,
    bytes: Vec<u8>,
}

/// Drains pending frame writes on a dedicated thread so the next screenshot
/// can be taken while the previous one is still hitting disk. At most one
/// write is ever outstanding — the channel has capacity 1.
struct Writer {
    tx: Sender<WriteJob>,
    handle: Option<JoinHandle<()>>,
}

impl Writer {
    fn spawn() -> Writer {
        let (tx, rx) = bounded::<WriteJob>(1);
        let handle = std::thread::spawn(move || {
            while let Ok(job) = rx.recv() {
                if let Err(err) = std::fs::write(&job.path, &job.bytes) {
                    tracing::warn!(path = %job.path.display(), %err, "frame write failed");
                }
            }
        });
        Writer { tx, handle: Some(handle) }
    }

    fn submit(&self, path: PathBuf, bytes: Vec<u8>) {
        // Blocks until the previous write has drained — this is the overlap
        // point: the caller's *next* screenshot already happened while this
        // call was waiting, because the caller takes the screenshot first.
        if self.tx.send(WriteJob { path, bytes }).is_err() {
            tracing::error!("frame writer thread is gone");
        }
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        drop(self.tx.clone());
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Pause/resume handshake shared between whoever drives the scenario and the
/// background tick thread, independent of the `CaptureLoop` mutex — `pause()`
/// blocks the *caller*, and must never itself require the loop's lock, or a
/// tick thread waiting on that same lock to report its poll would deadlock.
#[derive(Clone)]
pub struct PauseControl {
    paused: Arc<AtomicBool>,
    poll_epoch: Arc<AtomicU64>,
}

impl PauseControl {
    fn new() -> PauseControl {
        PauseControl {
            paused: Arc::new(AtomicBool::new(false)),
            poll_epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Called by the background tick thread once per iteration, after it has
    /// either ticked or skipped based on the pause flag it read that round.
    /// `pause()` uses this to know a full iteration has observed the flag.
    pub fn record_poll(&self) {
        self.poll_epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns only once the tick thread has completed a full iteration with
    /// the pause flag observed true, so no further frame gets appended after
    /// this call returns. Waiting two polls rather than one covers the
    /// iteration that may have already read the old (unpaused) value before
    /// the store below became visible to it.
    pub fn pause(&self) {
        let start = self.poll_epoch.load(Ordering::SeqCst);
        self.paused.store(true, Ordering::SeqCst);
        while self.poll_epoch.load(Ordering::SeqCst) < start + 2 {
            std::thread::sleep(std::time::Duration::from_micros(200));
        }
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }
}

pub struct CaptureLoop {
    fps: u32,
    frames_dir: PathBuf,
    writer: Writer,
    manifest: Vec<ManifestEntry>,
    frame_index: u64,
    next_file_seq: u64,
    last_hash: Option<[u8; 16]>,
    control: PauseControl,
    failure_count: u64,
    tick_count: u64,
    started_at: std::time::Instant,
}

impl CaptureLoop {
    pub fn new(fps: u32, frames_dir: impl AsRef<Path>) -> std::io::Result<CaptureLoop> {
        let frames_dir = frames_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&frames_dir)?;
        Ok(CaptureLoop {
            fps,
            frames_dir,
            writer: Writer::spawn(),
            manifest: Vec::new(),
            frame_index: 0,
            next_file_seq: 0,
            last_hash: None,
            control: PauseControl::new(),
            failure_count: 0,
            tick_count: 0,
            started_at: std::time::Instant::now(),
        })
    }

    /// A cloned handle to this loop's pause/resume control, for a caller that
    /// needs to pause/resume without going through the loop's own mutex (see
    /// `PauseControl`).
    pub fn pause_control(&self) -> PauseControl {
        self.control.clone()
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn current_time_ms(&self) -> u64 {
        self.frame_index * 1000 / self.fps as u64
    }

    fn next_filename(&mut self) -> String {
        let name = format!("frame-{:06}.jpg", self.next_file_seq);
        self.next_file_seq += 1;
        name
    }

    /// Feed one screenshot into the loop. Deduplicates against the previous
    /// frame's content hash; on a miss, writes a new file and appends
    /// `Frame`; on a hit, extends the tail `Hold` (or starts one).
    pub fn tick(&mut self, screenshot: Vec<u8>) {
        self.tick_count += 1;
        let hash: [u8; 16] = Md5::digest(&screenshot).into();

        if Some(hash) == self.last_hash {
            self.extend_tail_hold(1);
        } else {
            let filename = self.next_filename();
            self.writer.submit(self.frames_dir.join(&filename), screenshot);
            self.manifest.push(ManifestEntry::Frame { file: filename });
            self.last_hash = Some(hash);
        }

        self.frame_index += 1;
    }

    /// Record a screenshot failure: skip this tick, no manifest entry.
    pub fn record_failure(&mut self) {
        self.failure_count += 1;
    }

    /// Always writes a new frame, bypassing dedup. Used for explicit
    /// before/after boundaries around slides and transitions.
    pub fn capture_one_frame(&mut self, screenshot: Vec<u8>) {
        let hash: [u8; 16] = Md5::digest(&screenshot).into();
        let filename = self.next_filename();
        self.writer.submit(self.frames_dir.join(&filename), screenshot);
        self.manifest.push(ManifestEntry::Frame { file: filename });
        self.last_hash = Some(hash);
        self.frame_index += 1;
    }

    /// Extend the manifest tail by `count` virtual frames with no new I/O.
    pub fn add_hold(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        self.extend_tail_hold(count);
        self.frame_index += count as u64;
    }

    fn extend_tail_hold(&mut self, count: u32) {
        match self.manifest.last_mut() {
            Some(ManifestEntry::Hold { count: c, .. }) => *c += count,
            Some(ManifestEntry::Frame { file }) => {
                let file = file.clone();
                let idx = self.manifest.len() - 1;
                self.manifest[idx] = ManifestEntry::Hold { file, count: count + 1 };
            }
            None => {
                // No prior frame captured yet — nothing to hold onto.
            }
        }
    }

    /// Block (busy-free, via sleep) until the virtual clock has advanced by
    /// at least `ms`. Couples a real wait to captured frames so a loop
    /// running behind target fps doesn't desynchronise time.
    pub fn wait_for_duration_ms(&self, ms: u64) {
        let frames_needed = (ms * self.fps as u64).div_ceil(1000);
        let target = self.frame_index + frames_needed;
        while self.frame_index < target {
            std::thread::sleep(std::time::Duration::from_millis(frame_interval_ms(self.fps)));
        }
    }

    /// Index of the most recently appended manifest entry, if any.
    pub fn last_entry_index(&self) -> Option<usize> {
        if self.manifest.is_empty() {
            None
        } else {
            Some(self.manifest.len() - 1)
        }
    }

    pub fn finish(self) -> (Vec<ManifestEntry>, u64) {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            let achieved_fps = self.tick_count as f64 / elapsed;
            if achieved_fps < self.fps as f64 * DRIFT_WARN_THRESHOLD {
                tracing::warn!(
                    target_fps = self.fps,
                    achieved_fps,
                    "capture ran below target frame rate"
                );
            }
        }
        (self.manifest, self.failure_count)
    }
}

fn frame_interval_ms(fps: u32) -> u64 {
    1000 / fps as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_extends_hold() {
        let dir = tempfile::tempdir().unwrap();
        let mut loop_ = CaptureLoop::new(30, dir.path()).unwrap();
        loop_.tick(vec![1, 2, 3]);
        loop_.tick(vec![1, 2, 3]);
        loop_.tick(vec![1, 2, 3]);
        let (manifest, failures) = loop_.finish();
        assert_eq!(failures, 0);
        assert_eq!(manifest.len(), 1);
        match &manifest[0] {
            ManifestEntry::Hold { count, .. } => assert_eq!(*count, 3),
            other => panic!("expected Hold, got {other:?}"),
        }
    }

    #[test]
    fn distinct_frames_stay_separate() {
        let dir = tempfile::tempdir().unwrap();
        let mut loop_ = CaptureLoop::new(30, dir.path()).unwrap();
        loop_.tick(vec![1]);
        loop_.tick(vec![2]);
        let (manifest, _) = loop_.finish();
        assert_eq!(manifest.len(), 2);
        assert!(manifest.iter().all(|e| matches!(e, ManifestEntry::Frame { .. })));
    }

    #[test]
    fn add_hold_advances_virtual_clock() {
        let dir = tempfile::tempdir().unwrap();
        let mut loop_ = CaptureLoop::new(30, dir.path()).unwrap();
        loop_.tick(vec![1]);
        loop_.add_hold(5);
        assert_eq!(loop_.current_time_ms(), 6 * 1000 / 30);
    }

    #[test]
    fn capture_one_frame_ignores_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let mut loop_ = CaptureLoop::new(30, dir.path()).unwrap();
        loop_.tick(vec![9]);
        loop_.capture_one_frame(vec![9]);
        let (manifest, _) = loop_.finish();
        assert_eq!(manifest.len(), 2);
    }
}
