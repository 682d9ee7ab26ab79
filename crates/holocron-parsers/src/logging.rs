//! Structured logging for holocron codecs
//!
//! Codecs only emit `tracing` events. Installing a subscriber is left to
//! the host application; [`init_with_config`] is a convenience for the
//! command-line tool and for tests.

use std::io::IsTerminal;
use std::sync::Once;
use std::time::Instant;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::traits::ParseResult;

static SUBSCRIBER: Once = Once::new();

/// Install a stderr subscriber with the default filter
pub fn init_default() {
    init_with_config(TracingConfig::default());
}

/// Install a stderr subscriber
///
/// `RUST_LOG` overrides `config.default_level`. Only the first call in a
/// process has any effect.
pub fn init_with_config(config: TracingConfig) {
    SUBSCRIBER.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level));

        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(config.ansi)
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_source)
            .with_line_number(config.show_source);

        // A host application may have installed its own subscriber already
        let _ = tracing_subscriber::registry().with(layer).with(filter).try_init();
    });
}

/// Subscriber settings
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub default_level: String,
    /// Colored output
    pub ansi: bool,
    /// Module path of each event
    pub show_target: bool,
    /// Worker thread ids, useful when archive names resolve in parallel
    pub show_thread_ids: bool,
    /// Source file and line of each event
    pub show_source: bool,
}

impl TracingConfig {
    /// Settings for a `-v` count on the command line
    ///
    /// No flag shows warnings only; each extra `v` adds a level, and at
    /// three the per-chunk trace events appear with thread and source info.
    pub fn for_verbosity(verbosity: u8) -> Self {
        let default_level = match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        Self {
            default_level: default_level.to_string(),
            show_target: verbosity >= 2,
            show_thread_ids: verbosity >= 3,
            show_source: verbosity >= 3,
            ..Self::default()
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: "warn,holocron=info,holocron_parsers=info".to_string(),
            ansi: std::io::stderr().is_terminal(),
            show_target: true,
            show_thread_ids: false,
            show_source: false,
        }
    }
}

/// Log that a codec is about to read a file
#[macro_export]
macro_rules! log_parse_start {
    ($codec:expr, $path:expr) => {
        tracing::info!(codec = %$codec, file = %$path.display(), "decoding");
    };
}

/// Log a successful file decode with its wall time
#[macro_export]
macro_rules! log_parse_complete {
    ($codec:expr, $path:expr, $elapsed:expr) => {
        tracing::info!(
            codec = %$codec,
            file = %$path.display(),
            elapsed_us = $elapsed.as_micros() as u64,
            "decoded"
        );
    };
}

/// Log a failed file decode
#[macro_export]
macro_rules! log_parse_error {
    ($codec:expr, $path:expr, $error:expr) => {
        tracing::error!(codec = %$codec, file = %$path.display(), error = %$error, "decode failed");
    };
}

/// Run one top-level decode inside a `decode` span
///
/// The span carries the codec name and input size; the outcome and
/// elapsed time are reported at debug level.
pub fn instrument_parse<T>(codec: &str, input_len: usize, decode: impl FnOnce() -> ParseResult<T>) -> ParseResult<T> {
    let span = tracing::info_span!("decode", codec = %codec, bytes = input_len);
    let _entered = span.enter();

    let start = Instant::now();
    let result = decode();
    let elapsed_us = start.elapsed().as_micros() as u64;

    match &result {
        Ok(_) => tracing::debug!(elapsed_us, "decode finished"),
        Err(error) => tracing::debug!(elapsed_us, %error, "decode rejected input"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ParseError;

    #[test]
    fn test_default_filter_names_both_crates() {
        let config = TracingConfig::default();
        assert!(config.default_level.contains("holocron=info"));
        assert!(config.default_level.contains("holocron_parsers=info"));
        assert!(!config.show_source);
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(TracingConfig::for_verbosity(0).default_level, "warn");
        assert!(!TracingConfig::for_verbosity(1).show_target);
        assert_eq!(TracingConfig::for_verbosity(2).default_level, "debug");
        let loud = TracingConfig::for_verbosity(7);
        assert_eq!(loud.default_level, "trace");
        assert!(loud.show_thread_ids && loud.show_source);
    }

    #[test]
    fn test_instrument_passes_result_through() {
        assert_eq!(instrument_parse("test", 4, || Ok(42)).unwrap(), 42);
        let err = instrument_parse::<()>("test", 0, || Err(ParseError::invalid_value("nope"))).unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue(_)));
    }

    #[test]
    fn test_second_init_is_ignored() {
        init_default();
        init_with_config(TracingConfig::for_verbosity(3));
    }
}
