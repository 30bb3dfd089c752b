// =============================================================================
// Error taxonomy
// =============================================================================
//
// Fetch errors are non-fatal: the scheduler turns every one of them into a
// NO_DATA report for the affected instrument and moves on.  Configuration
// errors are fatal and surface before the scheduler starts.
//
// Insufficient history is not an error value at all; indicators return
// `None` instead.
// =============================================================================

use thiserror::Error;

/// Why a fetch produced no usable bars for an instrument.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source answered, but with nothing usable (market closed, unknown
    /// instrument, stale or fully-invalid rows).
    #[error("data unavailable for {instrument}: {reason}")]
    DataUnavailable { instrument: String, reason: String },

    /// Network, HTTP or decoding failure after the source exhausted its retries.
    #[error("transport error for {instrument}: {message}")]
    Transport { instrument: String, message: String },
}

impl FetchError {
    pub fn unavailable(instrument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            instrument: instrument.into(),
            reason: reason.into(),
        }
    }

    pub fn transport(instrument: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            instrument: instrument.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable category, used in reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataUnavailable { .. } => "DataUnavailable",
            Self::Transport { .. } => "TransportError",
        }
    }
}

/// Invalid startup configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error("instrument list is empty")]
    NoInstruments,
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}
