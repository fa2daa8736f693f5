//! # Error Types
//!
//! Every failure in this crate is a construction-time failure; a build
//! that returns an error leaves nothing behind to recover.

use burn::record::RecorderError;
use thiserror::Error;

/// Result alias for [`ResNetError`].
pub type Result<T, E = ResNetError> = core::result::Result<T, E>;

/// `ResNet` construction and loading errors.
#[derive(Error, Debug)]
pub enum ResNetError {
    /// The requested depth has no entry in the stage table.
    #[error("unsupported ResNet version {version}; expected one of 18, 34, 50, 101, 152")]
    UnsupportedVersion {
        /// The requested depth.
        version: usize,
    },

    /// The configuration is self-contradictory.
    #[error("invalid ResNet configuration: {0}")]
    InvalidConfiguration(String),

    /// A convolution or pooling window does not fit the tracked shape.
    #[error(
        "no legal output size for window: size={size} kernel={kernel} stride={stride} padding={padding}"
    )]
    ShapeUnderflow {
        /// The input size along the failing dimension.
        size: usize,
        /// The kernel size.
        kernel: usize,
        /// The stride.
        stride: usize,
        /// The padding, applied to both sides.
        padding: usize,
    },

    /// A graph node did not have the layout the materializer expects.
    #[error("unexpected node: expected {expected}, found {found}")]
    UnexpectedNode {
        /// Description of the expected layout.
        expected: &'static str,
        /// Description of the node found.
        found: String,
    },

    /// A classification forward pass was requested on a headless network.
    #[error("the network was built without a classification head")]
    MissingHead,

    /// The weights archive could not be read, written, or did not match the topology.
    #[error("weights archive error: {0}")]
    Weights(#[from] RecorderError),
}

impl ResNetError {
    /// Construct an [`ResNetError::InvalidConfiguration`].
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}
