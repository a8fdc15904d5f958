//! Error types for topology construction.

use thiserror::Error;

/// Errors raised while turning a case shape into a network topology.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Case '{case_id}' needs at least 2 layers, got {layers}")]
    TooFewLayers { case_id: String, layers: usize },

    #[error("Case '{case_id}' has a zero-width layer at index {index}")]
    ZeroWidthLayer { case_id: String, index: usize },

    #[error(
        "Case '{case_id}' declares a {width}x{height} image input but its first layer width is {declared}"
    )]
    ImageInputMismatch {
        case_id: String,
        width: usize,
        height: usize,
        declared: usize,
    },

    #[error("Case '{case_id}' is too large to size")]
    SizeOverflow { case_id: String },
}
