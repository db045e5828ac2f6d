// crates/demoforge-cli/src/validate.rs
//
// The `validate` convenience subcommand: load a persisted timeline.json and
// run it through the same check `compose` runs before ever touching the
// render pass.

use std::path::Path;

use demoforge_core::error::{DemoforgeError, Result};
use demoforge_core::timeline::{self, Timeline};

pub fn run(timeline_path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(timeline_path)
        .map_err(|e| DemoforgeError::Config(format!("cannot read '{}': {e}", timeline_path.display())))?;
    let timeline: Timeline = serde_json::from_str(&raw)
        .map_err(|e| DemoforgeError::SchemaViolation { field: "<root>".into(), reason: e.to_string() })?;

    let timeline = timeline::validate(timeline)?;
    println!(
        "ok: {} event(s), {} manifest entr(y/ies), {} transition(s)",
        timeline.events.len(),
        timeline.metadata.frame_manifest.len(),
        timeline.metadata.transition_markers.len(),
    );
    Ok(())
}
