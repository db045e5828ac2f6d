// crates/demoforge-cli/src/paths.rs
// Single source of truth for where a compose run stores its output.

use std::path::{Path, PathBuf};

use demoforge_core::error::{DemoforgeError, Result};

pub struct VersionDir {
    pub root: PathBuf,
    pub version: u32,
}

impl VersionDir {
    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join("frames")
    }

    pub fn timeline_json(&self) -> PathBuf {
        self.root.join("timeline.json")
    }

    pub fn script_md(&self) -> PathBuf {
        self.root.join("script.md")
    }

    pub fn render_path(&self, container: &str) -> PathBuf {
        self.root.join(format!("render.{container}"))
    }
}

/// `<outputRoot>/<scenarioName>/v<N>/`, with `N` one past the largest
/// existing version directory (or 1 if none exist yet).
pub fn next_version_dir(output_root: &Path, scenario_name: &str) -> Result<VersionDir> {
    let scenario_dir = output_root.join(scenario_name);
    std::fs::create_dir_all(&scenario_dir)
        .map_err(|e| DemoforgeError::Config(format!("cannot create '{}': {e}", scenario_dir.display())))?;

    let mut max_version = 0u32;
    if let Ok(entries) = std::fs::read_dir(&scenario_dir) {
        for entry in entries.flatten() {
            if let Some(n) = entry
                .file_name()
                .to_str()
                .and_then(|s| s.strip_prefix('v'))
                .and_then(|s| s.parse::<u32>().ok())
            {
                max_version = max_version.max(n);
            }
        }
    }

    let version = max_version + 1;
    let root = scenario_dir.join(format!("v{version}"));
    std::fs::create_dir_all(&root)
        .map_err(|e| DemoforgeError::Config(format!("cannot create '{}': {e}", root.display())))?;
    Ok(VersionDir { root, version })
}

/// Prior version directories for the same scenario, newest first, excluding
/// `current`. Used by `--reuse-audio` to locate a matching cached narration.
pub fn prior_version_dirs(output_root: &Path, scenario_name: &str, current: u32) -> Vec<PathBuf> {
    let scenario_dir = output_root.join(scenario_name);
    let mut versions: Vec<(u32, PathBuf)> = std::fs::read_dir(&scenario_dir)
        .map(|entries| {
            entries
                .flatten()
                .filter_map(|e| {
                    let n = e.file_name().to_str()?.strip_prefix('v')?.parse::<u32>().ok()?;
                    (n != current).then_some((n, e.path()))
                })
                .collect()
        })
        .unwrap_or_default();
    versions.sort_by_key(|(n, _)| std::cmp::Reverse(*n));
    versions.into_iter().map(|(_, p)| p).collect()
}

pub fn scenario_name(scenario_path: &Path, declared: Option<&str>) -> String {
    declared
        .map(str::to_string)
        .or_else(|| scenario_path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .unwrap_or_else(|| "scenario".to_string())
}
