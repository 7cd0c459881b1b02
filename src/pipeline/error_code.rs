//! Stable error codes shared by every [`ListBuilderError`](crate::ListBuilderError).
//!
//! Codes serialize as `snake_case` strings and never change meaning, so hosts
//! can match on them without parsing messages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable classification of a builder failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A pluggable invalidated a stage that already ran in the current pass.
    OutOfOrderInvalidation,
    /// A build was requested while another was in flight.
    OverlappingBuild,
    /// Chained rebuilds exceeded `max_consecutive_rebuilds`.
    RebuildLimitExceeded,
    /// A configuration value is out of range.
    InvalidConfig,
    /// JSON input could not be parsed.
    Serialization,
}

impl ErrorCode {
    /// Returns the `snake_case` name used in JSON and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfOrderInvalidation => "out_of_order_invalidation",
            Self::OverlappingBuild => "overlapping_build",
            Self::RebuildLimitExceeded => "rebuild_limit_exceeded",
            Self::InvalidConfig => "invalid_config",
            Self::Serialization => "serialization",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
