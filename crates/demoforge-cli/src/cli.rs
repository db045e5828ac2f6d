// crates/demoforge-cli/src/cli.rs
//
// Argument surface. Owns nothing pipeline-specific — `main.rs` maps this
// straight into `compose::run`/`validate::run`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "demoforge", version, about = "Turn a scripted browser scenario into a demo video.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a TOML config file. Defaults to ./demoforge.toml if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Raise the structured log level.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record a scenario and render it to a demo video.
    Compose {
        /// Path to a scenario TOML file.
        scenario: PathBuf,

        /// Output file path. Defaults to <outputRoot>/<scenarioName>/v<N>/render.mp4.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Override the configured output resolution, as WxH.
        #[arg(long)]
        resolution: Option<String>,

        /// Skip narration synthesis entirely; render silent.
        #[arg(long)]
        no_voiceover: bool,

        /// Skip the cursor and click-ripple overlay.
        #[arg(long)]
        no_cursor: bool,

        /// Reuse a prior version's narration audio if its script hash matches.
        /// An optional directory overrides the default search (the scenario's
        /// own previous version directories).
        #[arg(long, value_name = "DIR", num_args = 0..=1, default_missing_value = "")]
        reuse_audio: Option<String>,
    },

    /// Validate a persisted timeline.json and report the result.
    Validate {
        /// Path to a timeline.json file.
        timeline: PathBuf,
    },
}
