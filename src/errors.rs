//! Error types for notif_list_builder
//!
//! Every failure the builder surfaces is a contract violation: a pluggable
//! invalidating a stage whose output has already been consumed, a second
//! build requested while one is in flight, or an invalid configuration.
//! Data anomalies in the leaf set (duplicate summaries, undersized groups)
//! are resolved by the pipeline and never reach this type.

use thiserror::Error;

use crate::pipeline::error_code::ErrorCode;
use crate::pipeline::state::{PipelineState, PluggableChain};

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ListBuilderError>;

/// Main error type for notif_list_builder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListBuilderError {
    /// A pluggable invalidated itself after its stage already ran in the
    /// in-flight pass.
    #[error(
        "Out-of-order invalidation: {chain} '{pluggable}' is bound to {bound_state} \
         but the pipeline is already in {current_state}"
    )]
    OutOfOrderInvalidation {
        pluggable: String,
        chain: PluggableChain,
        bound_state: PipelineState,
        current_state: PipelineState,
    },

    /// A build was requested while another pass was in flight.
    #[error("Overlapping build request: pipeline is in {state}")]
    OverlappingBuild { state: PipelineState },

    /// Invalidations kept scheduling rebuilds past the configured limit.
    #[error("Rebuild limit exceeded: more than {limit} consecutive rebuilds")]
    RebuildLimitExceeded { limit: usize },

    /// Configuration validation failed
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl ListBuilderError {
    /// Create an out-of-order invalidation error
    pub fn out_of_order_invalidation(
        pluggable: impl Into<String>,
        chain: PluggableChain,
        current_state: PipelineState,
    ) -> Self {
        Self::OutOfOrderInvalidation {
            pluggable: pluggable.into(),
            chain,
            bound_state: chain.bound_state(),
            current_state,
        }
    }

    /// Create an overlapping build error
    pub fn overlapping_build(state: PipelineState) -> Self {
        Self::OverlappingBuild { state }
    }

    /// Create a rebuild limit error
    pub fn rebuild_limit_exceeded(limit: usize) -> Self {
        Self::RebuildLimitExceeded { limit }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Stable code for programmatic matching.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::OutOfOrderInvalidation { .. } => ErrorCode::OutOfOrderInvalidation,
            Self::OverlappingBuild { .. } => ErrorCode::OverlappingBuild,
            Self::RebuildLimitExceeded { .. } => ErrorCode::RebuildLimitExceeded,
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            Self::Serialization { .. } => ErrorCode::Serialization,
        }
    }

    /// Check if this error is a pipeline protocol violation
    /// (as opposed to a configuration or serialization problem).
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::OutOfOrderInvalidation { .. }
                | Self::OverlappingBuild { .. }
                | Self::RebuildLimitExceeded { .. }
        )
    }
}

impl From<serde_json::Error> for ListBuilderError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
