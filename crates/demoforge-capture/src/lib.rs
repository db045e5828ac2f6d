// crates/demoforge-capture/src/lib.rs
//
// Everything that happens during recording: the virtual clock and frame
// manifest builder (`clock`), the instrumentation API a scenario script
// drives (`runner`), the narration dry-run/synthesis/alignment pass
// (`narration`), and the external-process contracts they all depend on
// (`collaborators`).

pub mod clock;
pub mod collaborators;
pub mod narration;
pub mod runner;

pub use clock::CaptureLoop;
pub use collaborators::{BrowserDriver, DurationProbe, SilenceDetector, TtsProvider};
pub use narration::{collect_narration_cues, NarrationCue, NarrationPreprocessor};
pub use runner::{CaptureContext, CaptureOutput, PreparedNarration};
