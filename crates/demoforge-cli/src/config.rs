// crates/demoforge-cli/src/config.rs
//
// Layered configuration: built-in defaults, then an optional TOML file,
// then `DEMOFORGE_*` environment variables, each overriding the last. Uses
// the `config` crate's layering the way the rest of this codebase reaches
// for an ecosystem crate instead of hand-rolling the merge.

use std::path::{Path, PathBuf};

use demoforge_core::error::{DemoforgeError, Result};
use serde::{Deserialize, Serialize};

fn default_fps() -> u32 {
    30
}

fn default_resolution() -> String {
    "1280x720".into()
}

fn default_output_root() -> String {
    "./out".into()
}

fn default_tts_provider() -> String {
    "local".into()
}

fn default_silence_threshold_db() -> f32 {
    -30.0
}

fn default_min_silence_sec() -> f32 {
    0.3
}

fn default_probe_concurrency() -> usize {
    4
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_output_root")]
    pub output_root: String,
    #[serde(default = "default_tts_provider")]
    pub tts_provider: String,
    #[serde(default)]
    pub tts_api_key: Option<String>,
    #[serde(default)]
    pub tts_endpoint: Option<String>,
    #[serde(default)]
    pub tts_binary: Option<String>,
    #[serde(default = "default_silence_threshold_db")]
    pub silence_threshold_db: f32,
    #[serde(default = "default_min_silence_sec")]
    pub min_silence_sec: f32,
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            fps: default_fps(),
            resolution: default_resolution(),
            output_root: default_output_root(),
            tts_provider: default_tts_provider(),
            tts_api_key: None,
            tts_endpoint: None,
            tts_binary: None,
            silence_threshold_db: default_silence_threshold_db(),
            min_silence_sec: default_min_silence_sec(),
            probe_concurrency: default_probe_concurrency(),
        }
    }
}

pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Config {
    /// Loads defaults, an optional TOML file (`path`, falling back to
    /// `./demoforge.toml` if it exists and no explicit path was given), then
    /// `DEMOFORGE_*` environment variables, and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default()).map_err(config_err)?);

        let file_path = path.map(PathBuf::from).or_else(|| {
            let default = PathBuf::from("demoforge.toml");
            default.exists().then_some(default)
        });

        if let Some(file_path) = file_path {
            builder = builder.add_source(config::File::from(file_path).required(path.is_some()));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DEMOFORGE").try_parsing(true),
        );

        let cfg: Config = builder
            .build()
            .map_err(config_err)?
            .try_deserialize()
            .map_err(config_err)?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(DemoforgeError::Config("fps must be > 0".into()));
        }
        self.parsed_resolution()?;
        if self.probe_concurrency == 0 {
            return Err(DemoforgeError::Config("probe_concurrency must be > 0".into()));
        }
        if self.tts_provider == "cloud" && self.tts_api_key.as_deref().unwrap_or("").is_empty() {
            return Err(DemoforgeError::Config(
                "tts_provider = \"cloud\" requires tts_api_key".into(),
            ));
        }
        Ok(())
    }

    pub fn parsed_resolution(&self) -> Result<Resolution> {
        let (w, h) = self
            .resolution
            .split_once('x')
            .ok_or_else(|| DemoforgeError::Config(format!("resolution '{}' is not WxH", self.resolution)))?;
        let width: u32 = w
            .parse()
            .map_err(|_| DemoforgeError::Config(format!("resolution '{}' is not WxH", self.resolution)))?;
        let height: u32 = h
            .parse()
            .map_err(|_| DemoforgeError::Config(format!("resolution '{}' is not WxH", self.resolution)))?;
        Ok(Resolution { width, height })
    }
}

fn config_err(e: impl std::fmt::Display) -> DemoforgeError {
    DemoforgeError::Config(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_fps() {
        let mut cfg = Config::default();
        cfg.fps = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unparseable_resolution() {
        let mut cfg = Config::default();
        cfg.resolution = "hd".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn cloud_provider_requires_api_key() {
        let mut cfg = Config::default();
        cfg.tts_provider = "cloud".into();
        assert!(cfg.validate().is_err());
        cfg.tts_api_key = Some("sk-test".into());
        assert!(cfg.validate().is_ok());
    }
}
