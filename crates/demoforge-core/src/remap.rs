// crates/demoforge-core/src/remap.rs
//
// Converts between scenario source time and final output time. Slides freeze
// the clock (every output frame inside a slide's window maps back to the
// same source instant); everything after a slide is pushed forward by its
// duration. Pure functions — no mutation of the timeline passed in.

use crate::time::{OutputMs, SourceMs};
use crate::timeline::Event;

/// A slide's effect on the output timeline: it occupies `duration_ms` of
/// output time starting at `scene_ts`, with an optional dead zone right
/// after it during which captured frames are known to still be stale.
#[derive(Clone, Copy, Debug)]
pub struct SlideWindow {
    pub scene_ts: SourceMs,
    pub duration_ms: u64,
    pub dead_after_ms: u64,
}

/// Map an output-time instant back to the source-time instant it was
/// captured at, accounting for every inserted slide before it.
pub fn source_time_ms(output: OutputMs, slides: &[SlideWindow]) -> SourceMs {
    let mut accumulated = 0u64;
    for slide in slides {
        let slide_output_start = OutputMs(slide.scene_ts.as_u64() + accumulated);
        let slide_output_end = OutputMs(slide_output_start.as_u64() + slide.duration_ms);

        if output < slide_output_start {
            return SourceMs(output.as_u64().saturating_sub(accumulated));
        }
        if output < slide_output_end {
            return slide.scene_ts;
        }
        accumulated += slide.duration_ms;
    }

    let mut source = SourceMs(output.as_u64().saturating_sub(accumulated));

    for slide in slides {
        let dead_start = slide.scene_ts;
        let dead_end = SourceMs(dead_start.as_u64() + slide.dead_after_ms);
        if source >= dead_start && source < dead_end {
            source = dead_end;
        }
    }

    source
}

/// Shift every event forward by the cumulative duration of slides whose
/// scene timestamp is at or before the event's own timestamp. Returns a new
/// sequence; the input is left untouched (events are append-only post-capture).
pub fn remap_events(events: &[Event], slides: &[SlideWindow]) -> Vec<Event> {
    events
        .iter()
        .map(|event| {
            let ts = event.timestamp_ms();
            let shift: u64 = slides
                .iter()
                .filter(|s| s.scene_ts.as_u64() <= ts)
                .map(|s| s.duration_ms)
                .sum();
            event.clone().with_timestamp_ms(ts + shift)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::WaitReason;

    #[test]
    fn identity_with_no_slides() {
        assert_eq!(source_time_ms(OutputMs(500), &[]), SourceMs(500));
    }

    #[test]
    fn freezes_during_slide_window() {
        let slides = [SlideWindow { scene_ts: SourceMs(0), duration_ms: 2000, dead_after_ms: 0 }];
        assert_eq!(source_time_ms(OutputMs(0), &slides), SourceMs(0));
        assert_eq!(source_time_ms(OutputMs(1999), &slides), SourceMs(0));
        // Exactly at the boundary: first source-time of the post-slide segment.
        assert_eq!(source_time_ms(OutputMs(2000), &slides), SourceMs(0));
    }

    #[test]
    fn shifts_content_after_slide() {
        let slides = [SlideWindow { scene_ts: SourceMs(0), duration_ms: 2000, dead_after_ms: 0 }];
        assert_eq!(source_time_ms(OutputMs(2100), &slides), SourceMs(100));
    }

    #[test]
    fn dead_zone_clamps_forward() {
        let slides = [SlideWindow { scene_ts: SourceMs(0), duration_ms: 2000, dead_after_ms: 300 }];
        assert_eq!(source_time_ms(OutputMs(2100), &slides), SourceMs(300));
        assert_eq!(source_time_ms(OutputMs(2400), &slides), SourceMs(400));
    }

    #[test]
    fn remap_events_identity_with_no_slides() {
        let events = vec![Event::Wait {
            id: "ev-001".into(),
            timestamp_ms: 50,
            duration_ms: 10,
            reason: WaitReason::Pacing,
        }];
        let remapped = remap_events(&events, &[]);
        assert_eq!(remapped[0].timestamp_ms(), 50);
    }

    #[test]
    fn remap_events_shifts_by_preceding_slides() {
        let events = vec![Event::Wait {
            id: "ev-001".into(),
            timestamp_ms: 100,
            duration_ms: 10,
            reason: WaitReason::Pacing,
        }];
        let slides = [SlideWindow { scene_ts: SourceMs(0), duration_ms: 2000, dead_after_ms: 0 }];
        let remapped = remap_events(&events, &slides);
        assert_eq!(remapped[0].timestamp_ms(), 2100);
    }
}
