//! Utilities: logging setup (verbosity -> tracing filter) and small
//! human-readable formatting helpers shared by several commands.
//!
//! Key items:
//!   init_logging / derive_level
//!   human_bytes

/// Logging helpers.
pub mod logging {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::EnvFilter;

    /// Map `-v` count and `--quiet` to a level filter.
    ///
    /// quiet -> ERROR, default -> WARN, -v -> INFO, -vv -> DEBUG, -vvv+ -> TRACE
    pub fn derive_level(verbose: u8, quiet: bool) -> LevelFilter {
        if quiet {
            return LevelFilter::ERROR;
        }
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Install the global subscriber. Logs go to stderr so stdout stays clean
    /// for command output (and `--json`). `RUST_LOG` wins when set.
    pub fn init_logging(level: LevelFilter) {
        let filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();

        // A second init (tests) is harmless.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .try_init();
    }
}

pub use logging::{derive_level, init_logging};

/// Format a byte count as a short human string (binary units).
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn quiet_overrides_verbose() {
        assert_eq!(derive_level(3, true), LevelFilter::ERROR);
    }

    #[test]
    fn verbosity_ladder() {
        assert_eq!(derive_level(0, false), LevelFilter::WARN);
        assert_eq!(derive_level(1, false), LevelFilter::INFO);
        assert_eq!(derive_level(2, false), LevelFilter::DEBUG);
        assert_eq!(derive_level(9, false), LevelFilter::TRACE);
    }

    #[test]
    fn human_bytes_units() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(1536), "1.5 KiB");
        assert_eq!(human_bytes(100 * 1024 * 1024), "100.0 MiB");
    }
}
