//! # Convolution Block
//!
//! [`ConvBlockConfig`] emits one ``Sequential[Convolution, Normalization]``
//! group and advances the tracked shape.

use crate::errors::Result;
use crate::models::resnet::graph::{ConvNode, LayerNode, NormNode};
use crate::models::resnet::shape::BuildContext;
use burn::config::Config;

/// Epsilon for every normalization layer.
pub const NORM_EPSILON: f64 = 1e-5;

/// [`ConvBlockConfig`] emitter config.
///
/// Spatial arguments are ``[height, width]``.
#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Stride.
    #[config(default = "[1, 1]")]
    pub stride: [usize; 2],

    /// Kernel size.
    #[config(default = "[3, 3]")]
    pub kernel: [usize; 2],

    /// Padding, applied to both sides.
    #[config(default = "[1, 1]")]
    pub padding: [usize; 2],

    /// Resolution override for projection shortcuts.
    ///
    /// When set, the tracked resolution is reset to this before the
    /// convolution; a projection reads the block input, not the advanced
    /// main-path shape.
    #[config(default = "None")]
    pub downsample_input: Option<[usize; 2]>,
}

impl ConvBlockConfig {
    /// A ``1x1`` projection with no padding.
    pub fn projection(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
    ) -> Self {
        Self::new(in_channels, out_channels)
            .with_stride([stride, stride])
            .with_kernel([1, 1])
            .with_padding([0, 0])
    }

    /// Build the ``Sequential[Convolution, Normalization]`` node, advancing `ctx.shape`.
    ///
    /// # Errors
    ///
    /// [`crate::ResNetError::ShapeUnderflow`] if the kernel does not fit the tracked shape.
    pub fn build(
        &self,
        ctx: &mut BuildContext,
    ) -> Result<LayerNode> {
        if let Some(resolution) = self.downsample_input {
            tracing::debug!("DownSample (");
            ctx.shape.set_resolution(resolution);
        }

        let input = ctx.shape;
        ctx.shape
            .apply_window(self.out_channels, self.kernel, self.stride, self.padding)?;

        tracing::debug!(
            "Convolution: ({}, {}, {}) ---> {}",
            self.in_channels,
            input.width,
            input.height,
            ctx.shape,
        );
        tracing::debug!(
            "BatchNorm: ({}) ---> ({})",
            self.out_channels,
            self.out_channels
        );
        if self.downsample_input.is_some() {
            tracing::debug!(")");
        }

        Ok(LayerNode::Group(vec![
            LayerNode::Convolution(ConvNode {
                in_channels: self.in_channels,
                out_channels: self.out_channels,
                kernel: self.kernel,
                stride: self.stride,
                padding: self.padding,
                input_resolution: input.resolution(),
                output_resolution: ctx.shape.resolution(),
            }),
            LayerNode::Normalization(NormNode {
                features: self.out_channels,
                epsilon: NORM_EPSILON,
            }),
        ]))
    }

    /// Emit the block into `target`, advancing `ctx.shape`.
    ///
    /// # Errors
    ///
    /// [`crate::ResNetError::ShapeUnderflow`] if the kernel does not fit the tracked shape.
    pub fn emit(
        &self,
        target: &mut Vec<LayerNode>,
        ctx: &mut BuildContext,
    ) -> Result<()> {
        target.push(self.build(ctx)?);
        Ok(())
    }
}
