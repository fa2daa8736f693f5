//! # Shape Tracking
//!
//! [`ShapeState`] is the running ``(channels, height, width)`` of the tensor
//! flowing through the network under construction.
//!
//! [`BuildContext`] bundles the shape with the other running totals of a
//! single build, and is threaded by ``&mut`` through every block emitter.

use crate::compat::conv_shape::try_conv_out_shape;
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The tracked shape of a feature map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeState {
    /// Number of channels.
    pub channels: usize,

    /// Spatial width.
    pub width: usize,

    /// Spatial height.
    pub height: usize,
}

impl fmt::Display for ShapeState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "({}, {}, {})", self.channels, self.width, self.height)
    }
}

impl ShapeState {
    /// Create a new shape.
    pub fn new(
        channels: usize,
        width: usize,
        height: usize,
    ) -> Self {
        Self {
            channels,
            width,
            height,
        }
    }

    /// The spatial resolution, ``[height, width]``.
    pub fn resolution(&self) -> [usize; 2] {
        [self.height, self.width]
    }

    /// Replace the spatial resolution, ``[height, width]``.
    pub fn set_resolution(
        &mut self,
        resolution: [usize; 2],
    ) {
        [self.height, self.width] = resolution;
    }

    /// Apply a sliding window (convolution or pooling) to the tracked shape.
    ///
    /// All window arguments are ``[height, width]``.
    ///
    /// # Errors
    ///
    /// [`crate::ResNetError::ShapeUnderflow`] if the window does not fit;
    /// the shape is left unchanged.
    pub fn apply_window(
        &mut self,
        out_channels: usize,
        kernel: [usize; 2],
        stride: [usize; 2],
        padding: [usize; 2],
    ) -> Result<()> {
        let resolution = try_conv_out_shape(self.resolution(), kernel, stride, padding)?;
        self.set_resolution(resolution);
        self.channels = out_channels;
        Ok(())
    }

    /// Number of elements per batch item.
    pub fn numel(&self) -> usize {
        self.channels * self.width * self.height
    }
}

/// The mutable state of one `ResNet` build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// The current tracked shape.
    pub shape: ShapeState,

    /// Channel count the next stage's first block will receive.
    pub downsample_in_size: usize,

    /// Resolution snapshot, ``[height, width]``, taken on entry to the current block.
    ///
    /// Projection shortcuts read this instead of the advanced main-path shape.
    pub downsample_input: [usize; 2],
}

impl BuildContext {
    /// The channel count the first stage expects, after the stem.
    pub const STEM_PLANES: usize = 64;

    /// Create a context for an input of the given shape.
    pub fn new(input: ShapeState) -> Self {
        Self {
            shape: input,
            downsample_in_size: Self::STEM_PLANES,
            downsample_input: input.resolution(),
        }
    }

    /// Record the current resolution as the block-entry snapshot.
    pub fn snapshot(&mut self) {
        self.downsample_input = self.shape.resolution();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ResNetError;

    #[test]
    fn test_shape_state() {
        let mut shape = ShapeState::new(3, 160, 224);
        assert_eq!(shape.resolution(), [224, 160]);
        assert_eq!(shape.numel(), 3 * 160 * 224);
        assert_eq!(shape.to_string(), "(3, 160, 224)");

        shape.apply_window(64, [7, 7], [2, 2], [3, 3]).unwrap();
        assert_eq!(shape, ShapeState::new(64, 80, 112));

        shape.set_resolution([10, 20]);
        assert_eq!(shape.height, 10);
        assert_eq!(shape.width, 20);
    }

    #[test]
    fn test_apply_window_underflow_leaves_shape() {
        let mut shape = ShapeState::new(8, 2, 2);
        let err = shape.apply_window(16, [7, 7], [2, 2], [1, 1]).unwrap_err();
        assert!(matches!(err, ResNetError::ShapeUnderflow { .. }));
        assert_eq!(shape, ShapeState::new(8, 2, 2));
    }

    #[test]
    fn test_build_context() {
        let mut ctx = BuildContext::new(ShapeState::new(3, 32, 48));
        assert_eq!(ctx.downsample_in_size, 64);
        assert_eq!(ctx.downsample_input, [48, 32]);

        ctx.shape.apply_window(8, [3, 3], [2, 2], [1, 1]).unwrap();
        assert_eq!(ctx.downsample_input, [48, 32]);

        ctx.snapshot();
        assert_eq!(ctx.downsample_input, [24, 16]);
    }
}
