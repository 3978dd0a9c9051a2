//! # Modhost Block System Errors
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockSystemError {
    #[error("Block instance {0} not found")]
    InstanceNotFound(i64),

    #[error("Block instance {instance_id} has no position in context {context_id}")]
    PositionNotFound { instance_id: i64, context_id: i64 },

    #[error("Block '{block}' cannot be placed in region '{region}'")]
    UnsupportedRegion { block: String, region: String },

    #[error("Block '{block}' is not enabled")]
    PluginDisabled { block: String },

    #[error("No weight left above {weight} in {region}/{page_type} of context {context_id}")]
    WeightOverflow {
        region: String,
        page_type: String,
        context_id: i64,
        weight: i64,
    },

    #[error("Invalid page type '{0}'")]
    InvalidPageType(String),
}
