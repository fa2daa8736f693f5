//! # Bottleneck Block for `ResNet`
//!
//! [`BottleneckConfig`] emits the three-convolution residual unit used by
//! `ResNet-50`, `ResNet-101` and `ResNet-152`:
//!
//! ```text
//! Sequential {
//!   AddMerge {
//!     Sequential {
//!       ConvBlock(in_planes -> width, 1x1)
//!       Activation
//!       ConvBlock(width -> width, 3x3, stride)
//!       Activation
//!       ConvBlock(width -> planes * 4, 1x1)
//!     }
//!     ConvBlock(in_planes -> planes * 4, 1x1, stride) | Identity
//!   }
//!   Activation
//! }
//! ```

use crate::errors::Result;
use crate::layers::activation::ActivationConfig;
use crate::models::resnet::basic_block::{activation_node, residual_unit};
use crate::models::resnet::conv_block::ConvBlockConfig;
use crate::models::resnet::graph::LayerNode;
use crate::models::resnet::residual_block::ResidualBlockMeta;
use crate::models::resnet::shape::BuildContext;
use burn::config::Config;

/// Channel expansion of the bottleneck output.
pub const BOTTLENECK_EXPANSION: usize = 4;

/// [`BottleneckConfig`] emitter config.
///
/// Implements [`ResidualBlockMeta`].
#[derive(Config, Debug, PartialEq)]
pub struct BottleneckConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// Configures `width()` and `out_planes()`.
    pub planes: usize,

    /// The stride of the middle convolution and of the projection.
    #[config(default = 1)]
    pub stride: usize,

    /// Use a projection shortcut instead of identity.
    #[config(default = false)]
    pub downsample: bool,

    /// Width per group, relative to 64.
    #[config(default = 64)]
    pub base_width: usize,

    /// Width multiplier.
    #[config(default = 1)]
    pub groups: usize,

    /// Activation between convolutions and after the merge.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl ResidualBlockMeta for BottleneckConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn planes(&self) -> usize {
        self.planes
    }

    fn expansion_factor(&self) -> usize {
        BOTTLENECK_EXPANSION
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn downsample(&self) -> bool {
        self.downsample
    }
}

impl BottleneckConfig {
    /// Channels of the inner convolutions.
    ///
    /// ``width = trunc((base_width / 64.0) * planes) * groups``
    pub fn width(&self) -> usize {
        ((self.base_width as f64 / 64.0) * self.planes as f64) as usize * self.groups
    }

    /// Emit one residual unit.
    ///
    /// # Errors
    ///
    /// [`crate::ResNetError::ShapeUnderflow`] if a convolution does not fit.
    pub fn build(
        &self,
        ctx: &mut BuildContext,
    ) -> Result<LayerNode> {
        ctx.snapshot();
        let snapshot = ctx.downsample_input;

        let in_planes = self.in_planes();
        let width = self.width();
        let out_planes = self.out_planes();

        let mut main = Vec::with_capacity(5);
        ConvBlockConfig::new(in_planes, width)
            .with_kernel([1, 1])
            .with_padding([0, 0])
            .emit(&mut main, ctx)?;
        main.push(activation_node(self.activation));
        ConvBlockConfig::new(width, width)
            .with_stride([self.stride; 2])
            .emit(&mut main, ctx)?;
        main.push(activation_node(self.activation));
        ConvBlockConfig::new(width, out_planes)
            .with_kernel([1, 1])
            .with_padding([0, 0])
            .emit(&mut main, ctx)?;

        let shortcut = if self.downsample {
            ConvBlockConfig::projection(in_planes, out_planes, self.stride)
                .with_downsample_input(Some(snapshot))
                .build(ctx)?
        } else {
            tracing::debug!("IdentityLayer");
            LayerNode::Identity
        };

        Ok(residual_unit(main, shortcut, self.activation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet::graph::{ConvNode, NodeKind};
    use crate::models::resnet::shape::ShapeState;

    fn convs(node: &LayerNode) -> Vec<ConvNode> {
        let mut convs = Vec::new();
        node.walk(&mut |n| {
            if let LayerNode::Convolution(conv) = n {
                convs.push(conv.clone());
            }
        });
        convs
    }

    #[test]
    fn test_width() {
        let config = BottleneckConfig::new(256, 64);
        assert_eq!(config.width(), 64);
        assert_eq!(config.out_planes(), 256);

        // Wide ResNet.
        assert_eq!(config.clone().with_base_width(128).width(), 128);

        // Truncation, then the group multiplier.
        let config = BottleneckConfig::new(256, 100)
            .with_base_width(40)
            .with_groups(3);
        assert_eq!(config.width(), 62 * 3);
    }

    #[test]
    fn test_first_stage_block() {
        let mut ctx = BuildContext::new(ShapeState::new(64, 56, 56));
        let unit = BottleneckConfig::new(64, 64)
            .with_downsample(true)
            .build(&mut ctx)
            .unwrap();

        assert_eq!(unit.count(NodeKind::Activation), 3);
        let convs = convs(&unit);
        let summary: Vec<_> = convs
            .iter()
            .map(|c| (c.in_channels, c.out_channels, c.kernel[0], c.stride[0]))
            .collect();
        assert_eq!(
            summary,
            vec![
                (64, 64, 1, 1),
                (64, 64, 3, 1),
                (64, 256, 1, 1),
                (64, 256, 1, 1)
            ]
        );
        assert_eq!(ctx.shape, ShapeState::new(256, 56, 56));
    }

    #[test]
    fn test_strided_block() {
        let mut ctx = BuildContext::new(ShapeState::new(256, 56, 56));
        let unit = BottleneckConfig::new(256, 128)
            .with_stride(2)
            .with_downsample(true)
            .build(&mut ctx)
            .unwrap();

        let convs = convs(&unit);
        assert_eq!(convs[0].stride, [1, 1]);
        assert_eq!(convs[0].output_resolution, [56, 56]);
        assert_eq!(convs[1].stride, [2, 2]);
        assert_eq!(convs[1].output_resolution, [28, 28]);
        assert_eq!(convs[2].out_channels, 512);
        assert_eq!(convs[3].input_resolution, [56, 56]);
        assert_eq!(convs[3].output_resolution, [28, 28]);
        assert_eq!(ctx.shape, ShapeState::new(512, 28, 28));
    }

    #[test]
    fn test_identity_block() {
        let mut ctx = BuildContext::new(ShapeState::new(512, 28, 28));
        let unit = BottleneckConfig::new(512, 128).build(&mut ctx).unwrap();
        assert_eq!(unit.count(NodeKind::Identity), 1);
        assert_eq!(unit.count(NodeKind::Convolution), 3);
        assert_eq!(ctx.shape, ShapeState::new(512, 28, 28));
    }
}
