// crates/demoforge-render/src/lib.rs
//
// Everything that happens after capture: decoding the frame manifest back
// into pixels, blending transitions, overlaying the cursor, and muxing the
// result to an MP4. No browser, no TTS — those are demoforge-capture's job.

pub mod compositor;
pub mod encoder;
pub mod render;
pub mod yuv;

pub use compositor::FrameCache;
pub use encoder::{Encoder, EncodeSpec, FfmpegEncoder, PlacedAudio};
pub use render::{render, ChromeLabel, ClickMarker, CursorWaypoint, RenderJob, SlideWindow};
