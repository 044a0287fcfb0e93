use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Map a `--loglevel` value to a tracing level. `fatal` and `panic` are
/// accepted as `error`; anything unrecognised falls back to `info`.
pub fn parse_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "fatal" | "panic" => Level::ERROR,
        "warning" => Level::WARN,
        other => other.parse().unwrap_or(Level::INFO),
    }
}

/// Install the global subscriber. `RUST_LOG` still refines the default.
pub fn init(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(parse_level(level).into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
