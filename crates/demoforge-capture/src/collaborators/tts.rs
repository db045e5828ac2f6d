// crates/demoforge-capture/src/collaborators/tts.rs
//
// Text-to-speech provider contract. Implementations differ wildly (HTTP API
// vs. local subprocess) so the trait only promises a synthesised file path
// and its duration — everything else is implementation detail.

use std::path::{Path, PathBuf};
use std::process::Command;

use demoforge_core::error::{DemoforgeError, Result};

#[derive(Clone, Debug, Default)]
pub struct TtsOptions {
    pub voice: Option<String>,
    pub style: Option<String>,
}

pub trait TtsProvider: Send {
    /// Name reported in the persisted narration manifest.
    fn name(&self) -> &'static str;

    fn synthesize(&self, text: &str, options: &TtsOptions, out_path: &Path) -> Result<()>;
}

/// Cloud TTS backend. Credentials are read from the environment at
/// construction time and validated before the first call, not lazily.
pub struct CloudTts {
    api_key: String,
    endpoint: String,
}

impl CloudTts {
    pub fn new(api_key: String, endpoint: String) -> Result<CloudTts> {
        if api_key.trim().is_empty() {
            return Err(DemoforgeError::Config("cloud TTS API key is empty".into()));
        }
        Ok(CloudTts { api_key, endpoint })
    }
}

impl TtsProvider for CloudTts {
    fn name(&self) -> &'static str {
        "cloud"
    }

    fn synthesize(&self, text: &str, options: &TtsOptions, out_path: &Path) -> Result<()> {
        let body = serde_json::json!({
            "text": text,
            "voice": options.voice.clone().unwrap_or_else(|| "narrator".into()),
            "style": options.style,
        });
        let response = ureq::post(&self.endpoint)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(body)
            .map_err(|e| DemoforgeError::TtsFailure(e.to_string()))?;
        let mut reader = response.into_reader();
        let mut bytes = Vec::new();
        std::io::copy(&mut reader, &mut bytes).map_err(|e| DemoforgeError::TtsFailure(e.to_string()))?;
        std::fs::write(out_path, bytes).map_err(|e| DemoforgeError::TtsFailure(e.to_string()))
    }
}

/// An alternative cloud backend with a different request shape — kept
/// separate rather than parameterising `CloudTts` so each provider's quirks
/// (auth header, payload fields) stay local to its own impl.
pub struct AlternativeCloudTts {
    api_key: String,
    endpoint: String,
}

impl AlternativeCloudTts {
    pub fn new(api_key: String, endpoint: String) -> Result<AlternativeCloudTts> {
        if api_key.trim().is_empty() {
            return Err(DemoforgeError::Config("alternative cloud TTS API key is empty".into()));
        }
        Ok(AlternativeCloudTts { api_key, endpoint })
    }
}

impl TtsProvider for AlternativeCloudTts {
    fn name(&self) -> &'static str {
        "alternative-cloud"
    }

    fn synthesize(&self, text: &str, options: &TtsOptions, out_path: &Path) -> Result<()> {
        let body = serde_json::json!({
            "input": { "text": text },
            "voice": { "name": options.voice.clone().unwrap_or_else(|| "default".into()) },
        });
        let response = ureq::post(&self.endpoint)
            .set("x-api-key", &self.api_key)
            .send_json(body)
            .map_err(|e| DemoforgeError::TtsFailure(e.to_string()))?;
        let mut reader = response.into_reader();
        let mut bytes = Vec::new();
        std::io::copy(&mut reader, &mut bytes).map_err(|e| DemoforgeError::TtsFailure(e.to_string()))?;
        std::fs::write(out_path, bytes).map_err(|e| DemoforgeError::TtsFailure(e.to_string()))
    }
}

/// Local, offline TTS invoked as a subprocess — same shelling-out idiom this
/// codebase already uses for ffmpeg, just pointed at a local synthesis binary.
pub struct LocalTts {
    binary: PathBuf,
}

impl LocalTts {
    pub fn new(binary: impl Into<PathBuf>) -> LocalTts {
        LocalTts { binary: binary.into() }
    }
}

impl TtsProvider for LocalTts {
    fn name(&self) -> &'static str {
        "local"
    }

    fn synthesize(&self, text: &str, options: &TtsOptions, out_path: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--text").arg(text).arg("--out").arg(out_path);
        if let Some(voice) = &options.voice {
            cmd.arg("--voice").arg(voice);
        }
        let status = cmd
            .status()
            .map_err(|e| DemoforgeError::TtsFailure(format!("spawn failed: {e}")))?;
        if !status.success() {
            return Err(DemoforgeError::TtsFailure(format!(
                "local tts exited with {status}"
            )));
        }
        Ok(())
    }
}
