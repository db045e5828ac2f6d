// crates/demoforge-cli/src/compose.rs
//
// Wires the collaborators together and runs the three phases in order:
// narration preprocessing, capture, render. Owns nothing pipeline-specific
// itself — each phase is a call into demoforge-core/-capture/-render.

use std::path::{Path, PathBuf};

use demoforge_core::error::{DemoforgeError, Result};
use demoforge_core::timeline::{Metadata, Timeline, Viewport, TIMELINE_VERSION};

use demoforge_capture::collaborators::browser::HeadlessChromeDriver;
use demoforge_capture::collaborators::duration_probe::FfmpegDurationProbe;
use demoforge_capture::collaborators::silence::FfmpegSilenceDetector;
use demoforge_capture::collaborators::tts::{AlternativeCloudTts, CloudTts, LocalTts, TtsOptions, TtsProvider};
use demoforge_capture::{collect_narration_cues, CaptureContext, CaptureLoop, NarrationCue, NarrationPreprocessor};

use demoforge_render::{render, ChromeLabel, ClickMarker, CursorWaypoint, FfmpegEncoder, PlacedAudio, RenderJob, SlideWindow};

use crate::config::Config;
use crate::paths;
use crate::scenario::{self, Scenario, ScenarioStep};

pub struct ComposeArgs {
    pub scenario_path: PathBuf,
    pub out: Option<PathBuf>,
    pub resolution_override: Option<String>,
    pub no_voiceover: bool,
    pub no_cursor: bool,
    pub reuse_audio: Option<String>,
}

fn build_tts(config: &Config) -> Result<Box<dyn TtsProvider>> {
    match config.tts_provider.as_str() {
        "cloud" => Ok(Box::new(CloudTts::new(
            config.tts_api_key.clone().unwrap_or_default(),
            config
                .tts_endpoint
                .clone()
                .unwrap_or_else(|| "https://api.example-tts.invalid/v1/speak".into()),
        )?)),
        "alternative-cloud" => Ok(Box::new(AlternativeCloudTts::new(
            config.tts_api_key.clone().unwrap_or_default(),
            config
                .tts_endpoint
                .clone()
                .unwrap_or_else(|| "https://api.alt-tts.invalid/v1/synthesize".into()),
        )?)),
        _ => Ok(Box::new(LocalTts::new(
            config.tts_binary.clone().unwrap_or_else(|| "say-offline".into()),
        ))),
    }
}

/// Runs a scenario's steps against a `CaptureContext`, resolving each
/// step's narration argument through the runner's own `narration: Option<&str>`
/// parameter so the emitted order always matches the dry run below.
fn drive_capture(ctx: &mut CaptureContext, scenario: &Scenario) -> Result<()> {
    for step in &scenario.steps {
        match step {
            ScenarioStep::Scene { title, description, slide } => {
                ctx.scene(title, description.as_deref(), slide.clone())?;
            }
            ScenarioStep::Navigate { url, narrate } => ctx.navigate(url, narrate.as_deref())?,
            ScenarioStep::Click { selector, narrate } => ctx.click(selector, narrate.as_deref())?,
            ScenarioStep::Dblclick { selector, narrate } => ctx.dblclick(selector, narrate.as_deref())?,
            ScenarioStep::Hover { selector, narrate } => ctx.hover(selector, narrate.as_deref())?,
            ScenarioStep::Fill { selector, value, narrate } => ctx.fill(selector, value, narrate.as_deref())?,
            ScenarioStep::Press { selector, key, narrate } => ctx.press(selector, key, narrate.as_deref())?,
            ScenarioStep::Wait { ms } => ctx.wait(*ms)?,
            ScenarioStep::Narrate { text } => ctx.narrate(text)?,
            ScenarioStep::Transition { kind, duration_ms } => ctx.transition(*kind, *duration_ms)?,
        }
    }
    Ok(())
}

fn dry_run_cues(scenario: &Scenario) -> Vec<NarrationCue> {
    let texts = scenario::narration_texts(scenario);
    collect_narration_cues(|report| {
        for text in &texts {
            report(text);
        }
    })
}

pub fn run(args: ComposeArgs, config: Config) -> Result<()> {
    let started = std::time::Instant::now();
    let scenario = scenario::load(&args.scenario_path)?;
    let name = paths::scenario_name(&args.scenario_path, scenario.name.as_deref());

    let resolution = if let Some(r) = &args.resolution_override {
        let (w, h) = r
            .split_once('x')
            .ok_or_else(|| DemoforgeError::InvalidArgument(format!("resolution '{r}' is not WxH")))?;
        (
            w.parse().map_err(|_| DemoforgeError::InvalidArgument(format!("resolution '{r}' is not WxH")))?,
            h.parse().map_err(|_| DemoforgeError::InvalidArgument(format!("resolution '{r}' is not WxH")))?,
        )
    } else {
        let r = config.parsed_resolution()?;
        (r.width, r.height)
    };

    let version_dir = paths::next_version_dir(Path::new(&config.output_root), &name)?;
    tracing::info!(dir = %version_dir.root.display(), version = version_dir.version, "starting compose");

    let prepared_narration = if args.no_voiceover {
        tracing::info!("--no-voiceover: skipping narration preprocessing");
        Vec::new()
    } else {
        let cues = dry_run_cues(&scenario);
        if cues.is_empty() {
            Vec::new()
        } else {
            let tts = build_tts(&config)?;
            let silence = FfmpegSilenceDetector;
            let duration = FfmpegDurationProbe;
            let cache_dir = reuse_audio_dir(&args, &config, &name, &version_dir)
                .unwrap_or_else(|| version_dir.audio_dir());
            let pre = NarrationPreprocessor::new(&*tts, &silence, &duration, TtsOptions::default(), cache_dir);
            pre.prepare(&cues)?
        }
    };
    let expected_narration_count = prepared_narration.len();

    tracing::info!("starting capture");
    let fps = config.fps;
    let clock = CaptureLoop::new(fps, version_dir.frames_dir())
        .map_err(|e| DemoforgeError::RenderFailure(format!("cannot prepare frames dir: {e}")))?;
    let driver: Box<dyn demoforge_capture::BrowserDriver> = Box::new(HeadlessChromeDriver::new());
    let mut ctx = CaptureContext::new(driver, clock, fps, resolution, prepared_narration)?;
    drive_capture(&mut ctx, &scenario)?;
    let output = ctx.finish();

    if expected_narration_count > 0 {
        let recorded = output
            .events
            .iter()
            .filter(|e| matches!(e, demoforge_core::timeline::Event::Narration { .. }))
            .count();
        if recorded != expected_narration_count {
            return Err(DemoforgeError::NarrationMismatch { expected: expected_narration_count, actual: recorded });
        }
    }

    if output.failure_count > 0 {
        tracing::warn!(failures = output.failure_count, "some screenshots failed during capture");
    }

    let timeline = Timeline {
        version: TIMELINE_VERSION,
        metadata: Metadata {
            test_file: name.clone(),
            scenario_file: args.scenario_path.display().to_string(),
            recorded_at: "unknown".into(),
            viewport: Viewport { width: resolution.0, height: resolution.1 },
            fps,
            frame_manifest: output.frame_manifest,
            transition_markers: output.transition_markers,
        },
        events: output.events,
    };
    let timeline = demoforge_core::timeline::validate(timeline)?;

    std::fs::write(
        version_dir.timeline_json(),
        serde_json::to_vec_pretty(&timeline)
            .map_err(|e| DemoforgeError::RenderFailure(format!("serialize timeline: {e}")))?,
    )
    .map_err(|e| DemoforgeError::RenderFailure(format!("write timeline.json: {e}")))?;
    std::fs::write(version_dir.script_md(), narration_script_md(&timeline))
        .map_err(|e| DemoforgeError::RenderFailure(format!("write script.md: {e}")))?;

    tracing::info!("starting render");
    let output_path = args.out.clone().unwrap_or_else(|| version_dir.render_path("mp4"));
    let (cursor_path, clicks) = build_cursor_path(&timeline);
    let narration_audio = collect_placed_audio(&timeline);
    let slide_windows = build_slide_windows(&timeline);
    let chrome_labels = build_chrome_labels(&timeline);

    let job = RenderJob {
        manifest: &timeline.metadata.frame_manifest,
        transitions: &timeline.metadata.transition_markers,
        frames_dir: &version_dir.frames_dir(),
        width: resolution.0,
        height: resolution.1,
        fps,
        cursor_path: &cursor_path,
        clicks: &clicks,
        slide_windows: &slide_windows,
        chrome_labels: &chrome_labels,
        output: &output_path,
        cursor_overlay_enabled: !args.no_cursor,
    };
    let encoder = FfmpegEncoder;
    render(job, narration_audio, &encoder)?;

    let elapsed = demoforge_core::helpers::time::format_duration(started.elapsed().as_secs_f64());
    tracing::info!(output = %output_path.display(), elapsed, "compose finished");
    Ok(())
}

fn reuse_audio_dir(args: &ComposeArgs, config: &Config, name: &str, current: &paths::VersionDir) -> Option<PathBuf> {
    let requested = args.reuse_audio.as_ref()?;
    if !requested.is_empty() {
        return Some(PathBuf::from(requested));
    }
    paths::prior_version_dirs(Path::new(&config.output_root), name, current.version)
        .into_iter()
        .map(|dir| dir.join("audio"))
        .find(|dir| dir.exists())
}

fn narration_script_md(timeline: &Timeline) -> String {
    let mut out = String::from("# Narration script\n\n");
    for event in &timeline.events {
        if let demoforge_core::timeline::Event::Narration { text, .. } = event {
            out.push_str("- ");
            out.push_str(text);
            out.push('\n');
        }
    }
    out
}

/// Cursor waypoints and click markers in output time, derived from the
/// recorded `CursorTarget`/`Action` events. Event timestamps already walk
/// the same frame-indexed clock the manifest does (slides and narration
/// holds are baked into the manifest at capture time); frames inserted by a
/// transition are not accounted for here, a deliberate simplification since
/// cursor position during the brief transition window is not load-bearing.
fn build_cursor_path(timeline: &Timeline) -> (Vec<CursorWaypoint>, Vec<ClickMarker>) {
    let mut path = Vec::new();
    let mut clicks = Vec::new();
    for event in &timeline.events {
        match event {
            demoforge_core::timeline::Event::CursorTarget { timestamp_ms, to_x, to_y, move_duration_ms, .. } => {
                path.push(CursorWaypoint { output_ms: timestamp_ms + move_duration_ms, x: *to_x, y: *to_y });
            }
            demoforge_core::timeline::Event::Action { kind, timestamp_ms, bounding_box: Some(b), .. }
                if matches!(kind, demoforge_core::timeline::ActionKind::Click | demoforge_core::timeline::ActionKind::Dblclick) =>
            {
                clicks.push(ClickMarker {
                    output_ms: *timestamp_ms,
                    x: b.x + b.w as i32 / 2,
                    y: b.y + b.h as i32 / 2,
                });
            }
            _ => {}
        }
    }
    (path, clicks)
}

/// One window per scene whose `slide` style was set, running from that
/// scene's timestamp to the next scene's (or the end of the recording, for
/// the last one). The chrome overlay and cursor are both suppressed inside
/// these windows.
fn build_slide_windows(timeline: &Timeline) -> Vec<SlideWindow> {
    let scenes: Vec<(u64, bool)> = timeline
        .events
        .iter()
        .filter_map(|e| match e {
            demoforge_core::timeline::Event::Scene { timestamp_ms, slide, .. } => Some((*timestamp_ms, slide.is_some())),
            _ => None,
        })
        .collect();

    scenes
        .iter()
        .enumerate()
        .filter(|(_, (_, is_slide))| *is_slide)
        .map(|(i, (start_ms, _))| SlideWindow {
            start_ms: *start_ms,
            end_ms: scenes.get(i + 1).map(|(t, _)| *t).unwrap_or(u64::MAX),
        })
        .collect()
}

/// One label per `navigate()` call, carrying the URL's host+path for the
/// chrome overlay's address-bar pill.
fn build_chrome_labels(timeline: &Timeline) -> Vec<ChromeLabel> {
    timeline
        .events
        .iter()
        .filter_map(|e| match e {
            demoforge_core::timeline::Event::Action {
                kind: demoforge_core::timeline::ActionKind::Navigate,
                timestamp_ms,
                value: Some(url),
                ..
            } => Some(ChromeLabel { output_ms: *timestamp_ms, text: host_and_path(url) }),
            _ => None,
        })
        .collect()
}

/// Strips scheme and query/fragment, leaving `host/path` — as much of the
/// address bar's content as this codebase can draw without a glyph
/// rasterizer (see `draw_chrome_overlay`).
fn host_and_path(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let end = without_scheme.find(['?', '#']).unwrap_or(without_scheme.len());
    without_scheme[..end].to_string()
}

fn collect_placed_audio(timeline: &Timeline) -> Vec<PlacedAudio> {
    timeline
        .events
        .iter()
        .filter_map(|e| match e {
            demoforge_core::timeline::Event::Narration { timestamp_ms, audio_file: Some(file), .. } => {
                Some(PlacedAudio { file: PathBuf::from(file), output_start_ms: *timestamp_ms })
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use demoforge_core::timeline::{ActionKind, Event, ManifestEntry, Metadata, SlideStyle, Viewport};

    fn timeline_with(events: Vec<Event>) -> Timeline {
        Timeline {
            version: TIMELINE_VERSION,
            metadata: Metadata {
                test_file: "demo.spec.ts".into(),
                scenario_file: "demo.scenario.ts".into(),
                recorded_at: "2026-01-01T00:00:00Z".into(),
                viewport: Viewport { width: 1280, height: 720 },
                fps: 30,
                frame_manifest: vec![ManifestEntry::Frame { file: "f0.jpg".into() }],
                transition_markers: vec![],
            },
            events,
        }
    }

    #[test]
    fn host_and_path_strips_scheme_and_query() {
        assert_eq!(host_and_path("https://example.com/pricing?ref=demo"), "example.com/pricing");
        assert_eq!(host_and_path("example.com/about#team"), "example.com/about");
    }

    #[test]
    fn slide_window_runs_until_next_scene_or_end() {
        let timeline = timeline_with(vec![
            Event::Scene { id: "ev-001".into(), timestamp_ms: 0, title: "Intro".into(), description: None, slide: None },
            Event::Scene {
                id: "ev-002".into(),
                timestamp_ms: 1000,
                title: "Outro".into(),
                description: None,
                slide: Some(SlideStyle {
                    duration_ms: Some(2000),
                    brand_color: None,
                    text_color: None,
                    font_family: None,
                    title_font_size: None,
                    narrate: None,
                }),
            },
        ]);
        let windows = build_slide_windows(&timeline);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_ms, 1000);
        assert_eq!(windows[0].end_ms, u64::MAX);
    }

    #[test]
    fn chrome_labels_collect_navigate_urls_in_order() {
        let timeline = timeline_with(vec![Event::Action {
            id: "ev-001".into(),
            timestamp_ms: 250,
            kind: ActionKind::Navigate,
            selector: String::new(),
            value: Some("https://example.com/".into()),
            duration_ms: 0,
            bounding_box: None,
            settled_at_ms: Some(250),
        }]);
        let labels = build_chrome_labels(&timeline);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].output_ms, 250);
        assert_eq!(labels[0].text, "example.com/");
    }
}
