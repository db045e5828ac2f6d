// crates/demoforge-core/src/lib.rs
//
// Pure data and pure functions: the timeline model, the time remapper, the
// frame resolver, and the transition math. No browser driver, no FFmpeg, no
// filesystem access — those live in demoforge-capture and demoforge-render.

pub mod error;
pub mod helpers;
pub mod resolver;
pub mod remap;
pub mod time;
pub mod timeline;
pub mod transitions;

pub use error::{DemoforgeError, Result};
pub use time::{ExpandedFrame, OutputMs, SourceMs};
pub use timeline::{
    Event, ManifestEntry, Metadata, Timeline, TransitionMarker, Viewport,
};
