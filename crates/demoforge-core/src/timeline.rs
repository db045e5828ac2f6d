// crates/demoforge-core/src/timeline.rs
//
// The timeline is pure data: events recorded during a scenario run, the frame
// manifest built alongside them, and the transition markers layered on top.
// Nothing in this module touches a browser, a file, or FFmpeg — see
// demoforge-capture for the loop that produces one of these and
// demoforge-render for the compositor that consumes one.

use serde::{Deserialize, Serialize};

use crate::error::{DemoforgeError, Result};

/// Wire-format version. Bump and add a migration if the shape changes.
pub const TIMELINE_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// One unit of the captured frame sequence. `Hold` absorbs runs of
/// dedup-identical frames (or explicit dwells) without allocating one entry
/// per virtual frame — see `ExpandedFrame` in `crate::time`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ManifestEntry {
    Frame { file: String },
    Hold { file: String, count: u32 },
}

impl ManifestEntry {
    /// Number of virtual frames this entry expands to.
    pub fn frame_count(&self) -> u32 {
        match self {
            ManifestEntry::Frame { .. } => 1,
            ManifestEntry::Hold { count, .. } => *count,
        }
    }

    pub fn file(&self) -> &str {
        match self {
            ManifestEntry::Frame { file } | ManifestEntry::Hold { file, .. } => file,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionKind {
    Fade,
    Wipe,
    SlideUp,
    SlideLeft,
    Zoom,
    Doorway,
    Swap,
    Cube,
}

fn default_consumed_frames() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransitionMarker {
    pub after_entry_index: usize,
    pub kind: TransitionKind,
    pub duration_frames: u32,
    #[serde(default = "default_consumed_frames")]
    pub consumed_frames: u32,
    pub before_file: Option<String>,
    pub after_file: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SlideStyle {
    #[serde(default)]
    pub duration_ms: Option<u64>,
    pub brand_color: Option<String>,
    pub text_color: Option<String>,
    pub font_family: Option<String>,
    pub title_font_size: Option<u32>,
    pub narrate: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Fill,
    Hover,
    Press,
    Navigate,
    Dblclick,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WaitReason {
    Pacing,
    NarrationSync,
    PageLoad,
}

/// A timestamped fact recorded by the scenario runner. See `crate::time` for
/// what `timestamp_ms` means (scenario source time, always).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    Scene {
        id: String,
        timestamp_ms: u64,
        title: String,
        description: Option<String>,
        slide: Option<SlideStyle>,
    },
    Action {
        id: String,
        timestamp_ms: u64,
        kind: ActionKind,
        selector: String,
        value: Option<String>,
        duration_ms: u64,
        bounding_box: Option<BoundingBox>,
        settled_at_ms: Option<u64>,
    },
    CursorTarget {
        id: String,
        timestamp_ms: u64,
        from_x: i32,
        from_y: i32,
        to_x: i32,
        to_y: i32,
        move_duration_ms: u64,
    },
    Narration {
        id: String,
        timestamp_ms: u64,
        text: String,
        audio_duration_ms: Option<u64>,
        audio_file: Option<String>,
    },
    Wait {
        id: String,
        timestamp_ms: u64,
        duration_ms: u64,
        reason: WaitReason,
    },
}

impl Event {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            Event::Scene { timestamp_ms, .. }
            | Event::Action { timestamp_ms, .. }
            | Event::CursorTarget { timestamp_ms, .. }
            | Event::Narration { timestamp_ms, .. }
            | Event::Wait { timestamp_ms, .. } => *timestamp_ms,
        }
    }

    pub fn with_timestamp_ms(mut self, new_ts: u64) -> Event {
        match &mut self {
            Event::Scene { timestamp_ms, .. }
            | Event::Action { timestamp_ms, .. }
            | Event::CursorTarget { timestamp_ms, .. }
            | Event::Narration { timestamp_ms, .. }
            | Event::Wait { timestamp_ms, .. } => *timestamp_ms = new_ts,
        }
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub test_file: String,
    pub scenario_file: String,
    pub recorded_at: String,
    pub viewport: Viewport,
    pub fps: u32,
    pub frame_manifest: Vec<ManifestEntry>,
    #[serde(default)]
    pub transition_markers: Vec<TransitionMarker>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Timeline {
    pub version: u32,
    pub metadata: Metadata,
    pub events: Vec<Event>,
}

fn is_valid_hex_color(s: &str) -> bool {
    let hex = s.strip_prefix('#').unwrap_or("");
    matches!(hex.len(), 3 | 4 | 6 | 8) && hex.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Validate a timeline against every invariant the rest of the pipeline
/// relies on. Called before persistence and again before rendering — never
/// trust a `Timeline` value that has not passed through here.
pub fn validate(timeline: Timeline) -> Result<Timeline> {
    if timeline.version != TIMELINE_VERSION {
        return Err(DemoforgeError::SchemaViolation {
            field: "version".into(),
            reason: format!(
                "expected {TIMELINE_VERSION}, got {}",
                timeline.version
            ),
        });
    }

    if timeline.metadata.frame_manifest.is_empty() {
        return Err(DemoforgeError::SchemaViolation {
            field: "metadata.frame_manifest".into(),
            reason: "must contain at least one entry".into(),
        });
    }

    for (i, entry) in timeline.metadata.frame_manifest.iter().enumerate() {
        if let ManifestEntry::Hold { count, .. } = entry {
            if *count == 0 {
                return Err(DemoforgeError::SchemaViolation {
                    field: format!("metadata.frame_manifest[{i}].count"),
                    reason: "hold count must be >= 1".into(),
                });
            }
        }
    }

    let manifest_len = timeline.metadata.frame_manifest.len();
    let mut prev_after_index = None;
    for (i, marker) in timeline.metadata.transition_markers.iter().enumerate() {
        if marker.after_entry_index >= manifest_len {
            return Err(DemoforgeError::SchemaViolation {
                field: format!("metadata.transition_markers[{i}].after_entry_index"),
                reason: format!(
                    "index {} out of range for manifest of length {manifest_len}",
                    marker.after_entry_index
                ),
            });
        }
        if marker.duration_frames == 0 {
            return Err(DemoforgeError::SchemaViolation {
                field: format!("metadata.transition_markers[{i}].duration_frames"),
                reason: "must be >= 1".into(),
            });
        }
        if marker.consumed_frames == 0 {
            return Err(DemoforgeError::SchemaViolation {
                field: format!("metadata.transition_markers[{i}].consumed_frames"),
                reason: "must be >= 1".into(),
            });
        }
        if let Some(prev) = prev_after_index {
            if marker.after_entry_index < prev {
                return Err(DemoforgeError::SchemaViolation {
                    field: "metadata.transition_markers".into(),
                    reason: "markers must be sorted by after_entry_index".into(),
                });
            }
        }
        prev_after_index = Some(marker.after_entry_index);
    }

    let mut prev_ts = 0u64;
    for (i, event) in timeline.events.iter().enumerate() {
        let ts = event.timestamp_ms();
        if ts < prev_ts {
            return Err(DemoforgeError::SchemaViolation {
                field: format!("events[{i}].timestamp_ms"),
                reason: format!("{ts} precedes previous event's {prev_ts}"),
            });
        }
        prev_ts = ts;

        match event {
            Event::Scene { title, slide, .. } => {
                if title.is_empty() {
                    return Err(DemoforgeError::SchemaViolation {
                        field: format!("events[{i}].title"),
                        reason: "scene title must not be empty".into(),
                    });
                }
                if let Some(slide) = slide {
                    if let Some(0) = slide.duration_ms {
                        return Err(DemoforgeError::SchemaViolation {
                            field: format!("events[{i}].slide.duration_ms"),
                            reason: "must be > 0 when present".into(),
                        });
                    }
                    for (field, value) in [
                        ("brand_color", &slide.brand_color),
                        ("text_color", &slide.text_color),
                    ] {
                        if let Some(v) = value {
                            if !is_valid_hex_color(v) {
                                return Err(DemoforgeError::SchemaViolation {
                                    field: format!("events[{i}].slide.{field}"),
                                    reason: format!("`{v}` is not a valid hex color"),
                                });
                            }
                        }
                    }
                }
            }
            Event::Action { selector, settled_at_ms, timestamp_ms, .. } => {
                if selector.is_empty() {
                    return Err(DemoforgeError::SchemaViolation {
                        field: format!("events[{i}].selector"),
                        reason: "must not be empty".into(),
                    });
                }
                if let Some(settled) = settled_at_ms {
                    if *settled < *timestamp_ms {
                        return Err(DemoforgeError::SchemaViolation {
                            field: format!("events[{i}].settled_at_ms"),
                            reason: "must be >= timestamp_ms".into(),
                        });
                    }
                }
            }
            Event::CursorTarget { move_duration_ms, .. } => {
                if *move_duration_ms == 0 {
                    return Err(DemoforgeError::SchemaViolation {
                        field: format!("events[{i}].move_duration_ms"),
                        reason: "must be > 0".into(),
                    });
                }
            }
            Event::Narration { text, .. } => {
                if text.is_empty() {
                    return Err(DemoforgeError::SchemaViolation {
                        field: format!("events[{i}].text"),
                        reason: "narration text must not be empty".into(),
                    });
                }
            }
            Event::Wait { duration_ms, .. } => {
                if *duration_ms == 0 {
                    return Err(DemoforgeError::SchemaViolation {
                        field: format!("events[{i}].duration_ms"),
                        reason: "must be > 0".into(),
                    });
                }
            }
        }
    }

    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_timeline() -> Timeline {
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
            events: vec![],
        }
    }

    #[test]
    fn validates_minimal_timeline() {
        assert!(validate(minimal_timeline()).is_ok());
    }

    #[test]
    fn rejects_empty_frame_manifest() {
        let mut t = minimal_timeline();
        t.metadata.frame_manifest.clear();
        assert!(matches!(
            validate(t),
            Err(DemoforgeError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn rejects_non_monotonic_events() {
        let mut t = minimal_timeline();
        t.events.push(Event::Wait {
            id: "ev-001".into(),
            timestamp_ms: 100,
            duration_ms: 10,
            reason: WaitReason::Pacing,
        });
        t.events.push(Event::Wait {
            id: "ev-002".into(),
            timestamp_ms: 50,
            duration_ms: 10,
            reason: WaitReason::Pacing,
        });
        assert!(matches!(
            validate(t),
            Err(DemoforgeError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn rejects_bad_hex_color() {
        let mut t = minimal_timeline();
        t.events.push(Event::Scene {
            id: "ev-001".into(),
            timestamp_ms: 0,
            title: "Intro".into(),
            description: None,
            slide: Some(SlideStyle {
                duration_ms: Some(2000),
                brand_color: Some("not-a-color".into()),
                text_color: None,
                font_family: None,
                title_font_size: None,
                narrate: None,
            }),
        });
        assert!(matches!(
            validate(t),
            Err(DemoforgeError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn rejects_transition_index_out_of_range() {
        let mut t = minimal_timeline();
        t.metadata.transition_markers.push(TransitionMarker {
            after_entry_index: 5,
            kind: TransitionKind::Fade,
            duration_frames: 3,
            consumed_frames: 1,
            before_file: None,
            after_file: None,
        });
        assert!(matches!(
            validate(t),
            Err(DemoforgeError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn round_trip_through_json() {
        let t = minimal_timeline();
        let json = serde_json::to_string(&t).unwrap();
        let back: Timeline = serde_json::from_str(&json).unwrap();
        assert!(validate(back).is_ok());
    }
}
