//! Logging setup and per-build message deduplication.
//!
//! The library logs through `tracing`; the binary installs a
//! `tracing-subscriber` fmt layer via [`init`]. Per-image warnings can repeat
//! hundreds of times in one build, so [`LogOnce`] remembers message texts and
//! drops repeats.

use std::collections::HashSet;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `-v` raises this crate to debug, `-vv` to trace. `RUST_LOG` still applies
/// to everything else.
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if let Ok(directive) = format!("dated_gallery={level}").parse() {
        filter = filter.add_directive(directive);
    }
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Deduplicates log messages by text for the lifetime of one build.
#[derive(Debug, Default)]
pub struct LogOnce {
    seen: Mutex<HashSet<String>>,
}

impl LogOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `message` is seen.
    pub fn first_time(&self, message: &str) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.insert(message.to_string())
    }

    pub fn warn(&self, message: &str) {
        if self.first_time(message) {
            tracing::warn!("{message}");
        }
    }

    pub fn info(&self, message: &str) {
        if self.first_time(message) {
            tracing::info!("{message}");
        }
    }
}
