//! Logger setup from the operator's log knobs

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

use crate::opts::{LogColor, LogFormat, LogLevel, LogOpts};

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init(opts: &LogOpts) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(opts.level.as_filter()));

    let ansi = match opts.color {
        LogColor::Yes => true,
        LogColor::No => false,
        LogColor::Auto => std::io::stdout().is_terminal(),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_file(opts.source)
        .with_line_number(opts.source)
        .with_target(false);

    match (opts.format, opts.time) {
        (LogFormat::Json, true) => builder.json().init(),
        (LogFormat::Json, false) => builder.json().without_time().init(),
        (LogFormat::Logfmt, true) => builder.init(),
        (LogFormat::Logfmt, false) => builder.without_time().init(),
    }
}
