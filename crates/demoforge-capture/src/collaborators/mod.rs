// crates/demoforge-capture/src/collaborators/mod.rs
//
// External-collaborator contracts. The runner, the narration preprocessor,
// and the orchestration layer only ever see these traits — no browser SDK
// or TTS client type leaks past this module boundary.

pub mod browser;
pub mod duration_probe;
pub mod silence;
pub mod tts;

pub use browser::BrowserDriver;
pub use duration_probe::DurationProbe;
pub use silence::SilenceDetector;
pub use tts::TtsProvider;
