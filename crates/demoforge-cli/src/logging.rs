// crates/demoforge-cli/src/logging.rs
//
// Installs the one global tracing subscriber this process gets. Library
// crates (core, capture, render) only ever emit events — this is the only
// place a subscriber is constructed.

pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
