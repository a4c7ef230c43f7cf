//! Tracing setup shared by both binaries.
//!
//! Logs go to stderr so the client's stdout stays reserved for the REPL.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Map a `-v` count to a default filter directive.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `verbosity`.
///
/// Calling this twice is harmless; the second call is ignored.
pub fn init(verbosity: u8) {
    let level = level_for(verbosity);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("filecast={}", level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_file(verbosity >= 3)
                .with_line_number(verbosity >= 3),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for() {
        assert_eq!(level_for(0), "warn");
        assert_eq!(level_for(1), "info");
        assert_eq!(level_for(2), "debug");
        assert_eq!(level_for(9), "trace");
    }

    #[test]
    fn test_init_twice() {
        init(0);
        init(2);
    }
}
