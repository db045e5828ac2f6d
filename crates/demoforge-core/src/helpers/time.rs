// crates/demoforge-core/src/helpers/time.rs
//
// Human-readable time formatting, used by the CLI's progress lines and by
// log messages that report elapsed render time.

/// Format a duration in seconds as `MM:SS:FF` (minutes, seconds, frames at
/// the given fps). Used when reporting a position on the output timeline.
///
/// ```
/// use demoforge_core::helpers::time::format_timecode;
/// assert_eq!(format_timecode(0.0, 30),  "00:00:00");
/// assert_eq!(format_timecode(61.5, 30), "01:01:15");
/// ```
pub fn format_timecode(s: f64, fps: u32) -> String {
    let m = (s / 60.0) as u32;
    let sc = (s % 60.0) as u32;
    let fr = ((s * fps as f64) as u32) % fps;
    format!("{m:02}:{sc:02}:{fr:02}")
}

/// Format a duration in seconds as a compact human-readable string.
///
/// | Range    | Format    | Example   |
/// |----------|-----------|-----------|
/// | >= 3600s | `H:MM:SS` | `1:04:35` |
/// | >= 60s   | `M:SS`    | `3:07`    |
/// | < 60s    | `S.Xs`    | `4.2s`    |
///
/// ```
/// use demoforge_core::helpers::time::format_duration;
/// assert_eq!(format_duration(4.2), "4.2s");
/// assert_eq!(format_duration(187.0), "3:07");
/// ```
pub fn format_duration(secs: f64) -> String {
    if secs >= 3600.0 {
        format!(
            "{}:{:02}:{:02}",
            secs as u64 / 3600,
            (secs as u64 % 3600) / 60,
            secs as u64 % 60,
        )
    } else if secs >= 60.0 {
        format!("{}:{:02}", secs as u64 / 60, secs as u64 % 60)
    } else {
        format!("{secs:.1}s")
    }
}
