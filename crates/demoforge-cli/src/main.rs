mod cli;
mod compose;
mod config;
mod logging;
mod paths;
mod scenario;
mod validate;

use anyhow::Context;
use clap::Parser;

use cli::{Cli, Command};
use config::Config;

fn main() {
    ffmpeg_the_third::init().expect("FFmpeg init failed");

    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(err) = dispatch(cli) {
        eprintln!("demoforge: {err:#}");
        std::process::exit(1);
    }
}

/// Each step is wrapped in its own context so a failure's stderr line names
/// the phase that failed, not just the underlying taxonomy variant.
fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Compose { scenario, out, resolution, no_voiceover, no_cursor, reuse_audio } => {
            let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
            compose::run(
                compose::ComposeArgs {
                    scenario_path: scenario,
                    out,
                    resolution_override: resolution,
                    no_voiceover,
                    no_cursor,
                    reuse_audio,
                },
                config,
            )
            .context("compose")
        }
        Command::Validate { timeline } => validate::run(&timeline).context("validate"),
    }
}
