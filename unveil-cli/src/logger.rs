//! Logger initialization.

use std::io::Write;

use log::LevelFilter;
use owo_colors::OwoColorize;

/// Map `-v` occurrences onto a level. Without `-v` only warnings and errors,
/// which includes uncaught script exceptions, are shown.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install `env_logger` on stderr.
///
/// `RUST_LOG` is read after the `-v` level is applied, so
/// `RUST_LOG=unveil::console=info` still works on top of the default.
pub fn init(verbosity: u8, color: bool) {
    let mut builder = env_logger::Builder::new();
    let _ = builder
        .filter_level(level_for(verbosity))
        .filter_module("reqwest", LevelFilter::Info)
        .filter_module("hyper", LevelFilter::Info)
        .parse_default_env();

    let _ = builder.format(move |buf, record| {
        let level = record.level();
        if !color {
            return writeln!(buf, "{} [{level}] {}", record.target(), record.args());
        }
        let level = match level {
            log::Level::Error => level.red().to_string(),
            log::Level::Warn => level.yellow().to_string(),
            log::Level::Info => level.green().to_string(),
            log::Level::Debug => level.blue().to_string(),
            log::Level::Trace => level.purple().to_string(),
        };
        writeln!(buf, "{} [{level}] {}", record.target().cyan(), record.args())
    });

    // A second initialization in the same process is harmless.
    let _ = builder.try_init();
}
