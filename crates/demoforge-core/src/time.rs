// crates/demoforge-core/src/time.rs
//
// The three time bases never to confuse: scenario source time, the captured
// virtual clock (identical to source time by construction), and the final
// output time after slides and transitions have been inserted. Bare `u64`
// everywhere invites accidental arithmetic across bases — these newtypes
// make the conversion points explicit instead.

use std::ops::{Add, Sub};

/// Milliseconds on the scenario's own clock — what `currentTimeMs()` returns
/// during capture and what every recorded `Event::timestamp_ms` is in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceMs(pub u64);

/// Milliseconds on the final rendered timeline, after slide and transition
/// insertion has shifted everything that follows them forward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputMs(pub u64);

/// A zero-based index into the expanded frame sequence (manifest entries with
/// `Hold` runs unrolled). Distinct from a manifest *entry* index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExpandedFrame(pub u64);

impl SourceMs {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl OutputMs {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl ExpandedFrame {
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Convert a virtual frame index to source time at the given `fps`.
    pub fn to_source_ms(self, fps: u32) -> SourceMs {
        SourceMs(self.0 * 1000 / fps as u64)
    }
}

impl Add<u64> for SourceMs {
    type Output = SourceMs;
    fn add(self, rhs: u64) -> SourceMs {
        SourceMs(self.0 + rhs)
    }
}

impl Sub for SourceMs {
    type Output = u64;
    fn sub(self, rhs: SourceMs) -> u64 {
        self.0.saturating_sub(rhs.0)
    }
}

impl Add<u64> for OutputMs {
    type Output = OutputMs;
    fn add(self, rhs: u64) -> OutputMs {
        OutputMs(self.0 + rhs)
    }
}

impl Sub for OutputMs {
    type Output = u64;
    fn sub(self, rhs: OutputMs) -> u64 {
        self.0.saturating_sub(rhs.0)
    }
}

/// Milliseconds per frame at `fps`, rounded down like the capture loop's tick.
pub fn frame_interval_ms(fps: u32) -> u64 {
    1000 / fps as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expanded_frame_to_source_ms_at_30fps() {
        assert_eq!(ExpandedFrame(0).to_source_ms(30), SourceMs(0));
        assert_eq!(ExpandedFrame(30).to_source_ms(30), SourceMs(1000));
    }

    #[test]
    fn source_ms_ordering() {
        assert!(SourceMs(10) < SourceMs(20));
    }
}
