// crates/demoforge-capture/src/runner.rs
//
// The scenario runner: the instrumentation API a scenario script calls
// against. Owns the driver, the virtual clock, and the small bits of
// mutable state (cursor position, narration cursor, pending transition)
// that the API needs — passed through `&mut self`, never as statics.
//
// A background thread ticks the capture loop at the configured interval
// while it is not paused; the driver itself is shared behind a mutex so the
// loop and the runner never touch it at the same instant — the pause flag
// is what keeps this single-writer in practice, not thread absence.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use demoforge_core::error::{DemoforgeError, Result};
use demoforge_core::timeline::{
    ActionKind, BoundingBox as TimelineBoundingBox, Event, ManifestEntry, SlideStyle,
    TransitionKind, TransitionMarker, WaitReason,
};

use crate::clock::{CaptureLoop, PauseControl};
use crate::collaborators::browser::BrowserDriver;

/// One narration segment handed off by the preprocessor, in playback order.
/// Only the first carries an audio file reference — the rest exist purely
/// to drive per-segment holds during capture (see `narration.rs`).
#[derive(Clone, Debug)]
pub struct PreparedNarration {
    pub text: String,
    pub duration_ms: u64,
    pub audio_file: Option<String>,
}

const CURSOR_MOVE_MIN_MS: u64 = 200;
const CURSOR_MOVE_MAX_MS: u64 = 800;
const DEFAULT_SLIDE_DURATION_MS: u64 = 2000;

pub struct CaptureContext {
    driver: Arc<Mutex<Box<dyn BrowserDriver>>>,
    clock: Arc<Mutex<CaptureLoop>>,
    pause_control: PauseControl,
    shutdown: Arc<AtomicBool>,
    tick_thread: Option<JoinHandle<()>>,
    events: Vec<Event>,
    transition_markers: Vec<TransitionMarker>,
    cursor: (i32, i32),
    event_seq: u64,
    transition_pending: Option<usize>,
    narration_queue: VecDeque<PreparedNarration>,
    narration_index: usize,
    fps: u32,
}

impl CaptureContext {
    pub fn new(
        mut driver: Box<dyn BrowserDriver>,
        clock: CaptureLoop,
        fps: u32,
        viewport: (u32, u32),
        narration: Vec<PreparedNarration>,
    ) -> Result<CaptureContext> {
        driver.launch(viewport.0, viewport.1, 1.0, "en-US", "UTC", crate::collaborators::browser::ColorScheme { dark: false })?;

        let pause_control = clock.pause_control();
        let driver = Arc::new(Mutex::new(driver));
        let clock = Arc::new(Mutex::new(clock));
        let shutdown = Arc::new(AtomicBool::new(false));

        let tick_thread = {
            let driver = Arc::clone(&driver);
            let clock = Arc::clone(&clock);
            let shutdown = Arc::clone(&shutdown);
            let control = pause_control.clone();
            let interval = std::time::Duration::from_millis(1000 / fps as u64);
            Some(std::thread::spawn(move || {
                while !shutdown.load(Ordering::SeqCst) {
                    if !control.is_paused() {
                        let shot = { driver.lock().unwrap().screenshot() };
                        match shot {
                            Ok(bytes) => clock.lock().unwrap().tick(bytes),
                            Err(_) => clock.lock().unwrap().record_failure(),
                        }
                    }
                    // Acknowledged after the lock above is released, so a
                    // concurrent `pause()` (which never takes that lock) can
                    // never deadlock waiting on this.
                    control.record_poll();
                    std::thread::sleep(interval);
                }
            }))
        };

        Ok(CaptureContext {
            driver,
            clock,
            pause_control,
            shutdown,
            tick_thread,
            events: Vec::new(),
            transition_markers: Vec::new(),
            cursor: (viewport.0 as i32 / 2, viewport.1 as i32 / 2),
            event_seq: 0,
            transition_pending: None,
            narration_queue: narration.into_iter().collect(),
            narration_index: 0,
            fps,
        })
    }

    fn next_event_id(&mut self) -> String {
        self.event_seq += 1;
        format!("ev-{:03}", self.event_seq)
    }

    fn pause(&self) {
        self.pause_control.pause();
    }

    fn resume(&self) {
        self.pause_control.resume();
    }

    pub fn current_time_ms(&self) -> u64 {
        self.clock.lock().unwrap().current_time_ms()
    }

    /// If a transition is pending, capture its explicit "after" frame and
    /// resume capture before the caller's own action proceeds.
    fn resolve_pending_transition(&mut self) -> Result<()> {
        if self.transition_pending.take().is_some() {
            let shot = self.driver.lock().unwrap().screenshot()?;
            self.clock.lock().unwrap().capture_one_frame(shot);
            self.resume();
        }
        Ok(())
    }

    fn emit_narration_if_requested(&mut self, narration: Option<&str>) -> Result<()> {
        if let Some(text) = narration {
            self.narrate(text)?;
        }
        Ok(())
    }

    pub fn scene(&mut self, title: &str, description: Option<&str>, slide: Option<SlideStyle>) -> Result<()> {
        self.resolve_pending_transition()?;
        let ts = self.current_time_ms();
        let id = self.next_event_id();
        self.events.push(Event::Scene {
            id,
            timestamp_ms: ts,
            title: title.to_string(),
            description: description.map(str::to_string),
            slide: slide.clone(),
        });

        if let Some(slide) = slide {
            if let Some(text) = &slide.narrate {
                self.narrate(text)?;
            }
            self.pause();
            let css = slide_css(&slide);
            {
                let mut driver = self.driver.lock().unwrap();
                driver.inject_css(&css)?;
            }
            let shot = self.driver.lock().unwrap().screenshot()?;
            {
                let mut clock = self.clock.lock().unwrap();
                clock.capture_one_frame(shot);
                let duration_ms = slide.duration_ms.unwrap_or(DEFAULT_SLIDE_DURATION_MS);
                let total_frames = duration_ms * self.fps as u64 / 1000;
                clock.add_hold((total_frames.saturating_sub(1)) as u32);
            }
            self.driver.lock().unwrap().remove_injected()?;
            // Capture stays paused; the next action resumes it.
        }
        Ok(())
    }

    pub fn navigate(&mut self, url: &str, narration: Option<&str>) -> Result<()> {
        self.resolve_pending_transition()?;
        self.emit_narration_if_requested(narration)?;
        self.driver
            .lock()
            .unwrap()
            .goto(url)
            .map_err(|e| wrap_driver_error(e, Some(url)))?;
        let ts = self.current_time_ms();
        let id = self.next_event_id();
        self.events.push(Event::Action {
            id,
            timestamp_ms: ts,
            kind: ActionKind::Navigate,
            selector: String::new(),
            value: Some(url.to_string()),
            duration_ms: 0,
            bounding_box: None,
            settled_at_ms: Some(self.current_time_ms()),
        });
        Ok(())
    }

    fn perform_targeted_action(
        &mut self,
        kind: ActionKind,
        selector: &str,
        value: Option<&str>,
        narration: Option<&str>,
    ) -> Result<()> {
        self.resolve_pending_transition()?;
        self.emit_narration_if_requested(narration)?;

        let bbox = self.driver.lock().unwrap().bounding_box(selector)?;
        if let Some(b) = bbox {
            self.emit_cursor_move_to(b)?;
        }

        let start_ts = self.current_time_ms();
        {
            let mut driver = self.driver.lock().unwrap();
            let result = match kind {
                ActionKind::Click => driver.click(selector),
                ActionKind::Dblclick => driver.dblclick(selector),
                ActionKind::Hover => driver.hover(selector),
                ActionKind::Fill => driver.fill(selector, value.unwrap_or_default()),
                ActionKind::Press => driver.press(selector, value.unwrap_or_default()),
                ActionKind::Navigate => unreachable!("navigate has its own method"),
            };
            result.map_err(|e| wrap_driver_error(e, None))?;
        }
        let settled_ts = self.current_time_ms();

        let id = self.next_event_id();
        self.events.push(Event::Action {
            id,
            timestamp_ms: start_ts,
            kind,
            selector: selector.to_string(),
            value: value.map(str::to_string),
            duration_ms: settled_ts.saturating_sub(start_ts),
            bounding_box: bbox.map(|b| TimelineBoundingBox { x: b.x, y: b.y, w: b.w, h: b.h }),
            settled_at_ms: Some(settled_ts),
        });
        Ok(())
    }

    pub fn click(&mut self, selector: &str, narration: Option<&str>) -> Result<()> {
        self.perform_targeted_action(ActionKind::Click, selector, None, narration)
    }

    pub fn dblclick(&mut self, selector: &str, narration: Option<&str>) -> Result<()> {
        self.perform_targeted_action(ActionKind::Dblclick, selector, None, narration)
    }

    pub fn hover(&mut self, selector: &str, narration: Option<&str>) -> Result<()> {
        self.perform_targeted_action(ActionKind::Hover, selector, None, narration)
    }

    pub fn press(&mut self, selector: &str, key: &str, narration: Option<&str>) -> Result<()> {
        self.perform_targeted_action(ActionKind::Press, selector, Some(key), narration)
    }

    pub fn fill(&mut self, selector: &str, value: &str, narration: Option<&str>) -> Result<()> {
        // The driver types one character at a time with real per-character
        // delay, which the running capture loop naturally accumulates frames
        // across — no separate pacing needed here.
        self.perform_targeted_action(ActionKind::Fill, selector, Some(value), narration)
    }

    fn emit_cursor_move_to(&mut self, bbox: crate::collaborators::browser::BoundingBox) -> Result<()> {
        let to_x = bbox.x + bbox.w as i32 / 2;
        let to_y = bbox.y + bbox.h as i32 / 2;
        let (from_x, from_y) = self.cursor;

        let dist = (((to_x - from_x).pow(2) + (to_y - from_y).pow(2)) as f64).sqrt();
        let move_duration_ms = (CURSOR_MOVE_MIN_MS + dist as u64).clamp(CURSOR_MOVE_MIN_MS, CURSOR_MOVE_MAX_MS);

        let ts = self.current_time_ms();
        let id = self.next_event_id();
        self.events.push(Event::CursorTarget {
            id,
            timestamp_ms: ts,
            from_x,
            from_y,
            to_x,
            to_y,
            move_duration_ms,
        });
        self.cursor = (to_x, to_y);
        Ok(())
    }

    pub fn wait(&mut self, ms: u64) -> Result<()> {
        let ts = self.current_time_ms();
        let id = self.next_event_id();
        self.events.push(Event::Wait {
            id,
            timestamp_ms: ts,
            duration_ms: ms,
            reason: WaitReason::Pacing,
        });

        if self.clock.lock().unwrap().is_paused() {
            let frames = (ms * self.fps as u64).div_ceil(1000) as u32;
            self.clock.lock().unwrap().add_hold(frames);
        } else {
            std::thread::sleep(std::time::Duration::from_millis(ms));
        }
        Ok(())
    }

    pub fn narrate(&mut self, text: &str) -> Result<()> {
        self.pause();
        let segment = self.narration_queue.pop_front().ok_or_else(|| {
            DemoforgeError::NarrationMismatch {
                expected: self.narration_index,
                actual: self.narration_index + 1,
            }
        })?;
        self.narration_index += 1;

        let shot = self.driver.lock().unwrap().screenshot()?;
        let ts;
        {
            let mut clock = self.clock.lock().unwrap();
            clock.capture_one_frame(shot);
            ts = clock.current_time_ms() - (1000 / self.fps as u64);
            let total_frames = segment.duration_ms * self.fps as u64 / 1000;
            clock.add_hold(total_frames.saturating_sub(1) as u32);
        }

        let id = self.next_event_id();
        self.events.push(Event::Narration {
            id,
            timestamp_ms: ts,
            text: text.to_string(),
            audio_duration_ms: Some(segment.duration_ms),
            audio_file: segment.audio_file,
        });
        self.resume();
        Ok(())
    }

    pub fn transition(&mut self, kind: TransitionKind, duration_ms: u64) -> Result<()> {
        if duration_ms == 0 {
            return Err(DemoforgeError::InvalidArgument(
                "transition duration must be > 0".into(),
            ));
        }

        if let Some(prev_idx) = self.transition_pending.take() {
            tracing::warn!("transition() called again before an intervening action; replacing pending marker");
            self.transition_markers.remove(prev_idx);
        }

        self.pause();
        let after_entry_index = self
            .clock
            .lock()
            .unwrap()
            .last_entry_index()
            .ok_or_else(|| DemoforgeError::InvalidArgument("no frames captured yet".into()))?;

        let duration_frames = (duration_ms * self.fps as u64 / 1000).max(1) as u32;
        self.transition_markers.push(TransitionMarker {
            after_entry_index,
            kind,
            duration_frames,
            consumed_frames: 1,
            before_file: None,
            after_file: None,
        });
        self.transition_pending = Some(self.transition_markers.len() - 1);
        Ok(())
    }

    /// Finalize the run: stop the background tick thread, discard any
    /// transition left pending, and return the recorded pieces.
    pub fn finish(mut self) -> CaptureOutput {
        if let Some(idx) = self.transition_pending.take() {
            tracing::warn!("transition left pending at end of scenario; discarding");
            self.transition_markers.remove(idx);
        }

        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(h) = self.tick_thread.take() {
            let _ = h.join();
        }
        let _ = self.driver.lock().unwrap().close();

        let clock = Arc::try_unwrap(self.clock)
            .unwrap_or_else(|arc| panic!("clock still shared: {} refs", Arc::strong_count(&arc)))
            .into_inner()
            .unwrap();
        let (frame_manifest, failure_count) = clock.finish();

        CaptureOutput {
            events: self.events,
            transition_markers: self.transition_markers,
            frame_manifest,
            failure_count,
        }
    }
}

/// Everything a scenario run produced, handed to the caller to assemble into
/// a `Timeline` and validate before persisting.
pub struct CaptureOutput {
    pub events: Vec<Event>,
    pub transition_markers: Vec<TransitionMarker>,
    pub frame_manifest: Vec<ManifestEntry>,
    pub failure_count: u64,
}

fn wrap_driver_error(err: DemoforgeError, url: Option<&str>) -> DemoforgeError {
    match err {
        DemoforgeError::DriverFailure { action, selector, reason, .. } => DemoforgeError::DriverFailure {
            action,
            url: url.map(str::to_string),
            selector,
            reason,
        },
        other => other,
    }
}

fn slide_css(slide: &SlideStyle) -> String {
    let brand = slide.brand_color.clone().unwrap_or_else(|| "#111827".into());
    let text = slide.text_color.clone().unwrap_or_else(|| "#f9fafb".into());
    let font = slide.font_family.clone().unwrap_or_else(|| "system-ui, sans-serif".into());
    let size = slide.title_font_size.unwrap_or(48);
    format!(
        "body::before {{ content: ''; position: fixed; inset: 0; background: {brand}; z-index: 999998; }} \
         body::after {{ content: ''; position: fixed; inset: 0; z-index: 999999; }} \
         #demoforge-slide-title {{ position: fixed; inset: 0; display: flex; align-items: center; \
         justify-content: center; color: {text}; font-family: {font}; font-size: {size}px; z-index: 999999; }}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::browser::NoOpDriver;

    fn context_with(narration: Vec<PreparedNarration>) -> CaptureContext {
        let dir = tempfile::tempdir().unwrap();
        let clock = CaptureLoop::new(10, dir.path()).unwrap();
        CaptureContext::new(Box::new(NoOpDriver), clock, 10, (640, 480), narration).unwrap()
    }

    #[test]
    fn wait_while_paused_advances_virtual_clock_via_hold() {
        let mut ctx = context_with(vec![]);
        ctx.pause();
        let before = ctx.current_time_ms();
        ctx.wait(500).unwrap();
        assert!(ctx.current_time_ms() > before);
    }

    #[test]
    fn transition_requires_positive_duration() {
        let mut ctx = context_with(vec![]);
        assert!(ctx.transition(TransitionKind::Fade, 0).is_err());
    }
}
