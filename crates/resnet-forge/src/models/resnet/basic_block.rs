//! # Basic Block for `ResNet`
//!
//! [`BasicBlockConfig`] emits the two-convolution residual unit used by
//! `ResNet-18` and `ResNet-34`:
//!
//! ```text
//! Sequential {
//!   AddMerge {
//!     Sequential {
//!       ConvBlock(in_planes -> planes, stride)
//!       Activation
//!       ConvBlock(planes -> planes)
//!     }
//!     ConvBlock(in_planes -> planes, 1x1, stride) | Identity
//!   }
//!   Activation
//! }
//! ```

use crate::errors::Result;
use crate::layers::activation::ActivationConfig;
use crate::models::resnet::conv_block::ConvBlockConfig;
use crate::models::resnet::graph::{LayerNode, MergeNode};
use crate::models::resnet::residual_block::ResidualBlockMeta;
use crate::models::resnet::shape::BuildContext;
use burn::config::Config;

/// [`BasicBlockConfig`] emitter config.
///
/// Implements [`ResidualBlockMeta`].
#[derive(Config, Debug, PartialEq)]
pub struct BasicBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The size of the out channels dimension.
    pub planes: usize,

    /// The stride of the first convolution and of the projection.
    #[config(default = 1)]
    pub stride: usize,

    /// Use a projection shortcut instead of identity.
    #[config(default = false)]
    pub downsample: bool,

    /// Activation between convolutions and after the merge.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl ResidualBlockMeta for BasicBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn planes(&self) -> usize {
        self.planes
    }

    fn expansion_factor(&self) -> usize {
        1
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn downsample(&self) -> bool {
        self.downsample
    }
}

impl BasicBlockConfig {
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
        let out_planes = self.out_planes();
        let stride = [self.stride; 2];

        let mut main = Vec::with_capacity(3);
        ConvBlockConfig::new(in_planes, out_planes)
            .with_stride(stride)
            .emit(&mut main, ctx)?;
        main.push(activation_node(self.activation));
        ConvBlockConfig::new(out_planes, out_planes).emit(&mut main, ctx)?;

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

/// An activation node, logged.
pub(crate) fn activation_node(activation: ActivationConfig) -> LayerNode {
    tracing::debug!("{activation}");
    LayerNode::Activation(activation)
}

/// Wrap a main path and a shortcut into ``Sequential[AddMerge, Activation]``.
pub(crate) fn residual_unit(
    main: Vec<LayerNode>,
    shortcut: LayerNode,
    activation: ActivationConfig,
) -> LayerNode {
    LayerNode::Group(vec![
        LayerNode::Merge(MergeNode {
            main: Box::new(LayerNode::Group(main)),
            shortcut: Box::new(shortcut),
        }),
        activation_node(activation),
    ])
}
