//! Logger setup for the `hydronet` binary.

use env_logger::{Builder, Env};
use log::LevelFilter;

/// Crates whose messages follow the requested verbosity
const CRATES: [&str; 3] = ["hydronet", "hydronet_core", "hydronet_components"];

/// Level of the hydronet crates for a number of `-v` flags
///
/// Info by default, debug (one line per step) with one flag and trace (integrator
/// sub-steps) with two or more.
pub fn level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Filter used when `RUST_LOG` is not set
///
/// Dependencies only report warnings, the hydronet crates log at [`level`].
pub fn default_filter(verbosity: u8) -> String {
    let level = level(verbosity).to_string().to_lowercase();
    std::iter::once("warn".to_string())
        .chain(CRATES.iter().map(|name| format!("{}={}", name, level)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global logger
///
/// `RUST_LOG` takes precedence over the verbosity, e.g.
/// `RUST_LOG=hydronet_core::integrator=trace` traces the integrator alone.
pub fn init(verbosity: u8) {
    let env = Env::default().default_filter_or(default_filter(verbosity));
    let mut builder = Builder::from_env(env);
    builder.format_timestamp(None);

    // Only fails if a logger is already installed
    let _ = builder.try_init();
}
