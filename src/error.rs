//! Error taxonomy for configuration and startup failures.
//!
//! Nothing on the audio hot path returns a `Result`: per §7 of the design,
//! the demodulators always keep producing a bit stream whose quality
//! degrades with noise rather than raising a per-sample error. All
//! fallibility lives in one-time construction.

use thiserror::Error;

/// Errors that can occur while validating a [`crate::config::DemodulatorConfig`]
/// or constructing a [`crate::dispatch::ChannelState`] from one.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModemError {
    /// Unknown profile letter, baud/sample-rate out of range, or a
    /// combination of options the data model forbids (e.g. more slicers
    /// than `MAX_SLICERS`, or multiple subchannels combined with multiple
    /// slicers without the `+` flag).
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A computed filter kernel would need more taps than `MAX_FILTER_TAPS`.
    #[error(
        "filter `{filter}` needs {needed} taps, more than MAX_FILTER_TAPS ({max}); \
         raise decimation or sample rate, or enable clamping"
    )]
    FilterTooLarge {
        filter: &'static str,
        needed: usize,
        max: usize,
    },
}

/// Convenience alias used throughout the crate's startup/config paths.
pub type Result<T> = std::result::Result<T, ModemError>;
