//! # Residual Block Wrapper

use crate::errors::Result;
use crate::layers::activation::ActivationConfig;
use crate::models::resnet::basic_block::BasicBlockConfig;
use crate::models::resnet::bottleneck::{BOTTLENECK_EXPANSION, BottleneckConfig};
use crate::models::resnet::graph::LayerNode;
use crate::models::resnet::shape::BuildContext;
use burn::config::Config;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Residual unit Meta API.
pub trait ResidualBlockMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The nominal width of the unit.
    fn planes(&self) -> usize;

    /// Control factor for `out_planes()`.
    fn expansion_factor(&self) -> usize;

    /// The number of output feature planes.
    ///
    /// ``out_planes = planes * expansion_factor``
    fn out_planes(&self) -> usize {
        self.planes() * self.expansion_factor()
    }

    /// The stride of the unit.
    fn stride(&self) -> usize;

    /// Does the unit use a projection shortcut?
    fn downsample(&self) -> bool;
}

/// The residual unit family of a `ResNet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    /// [`BasicBlockConfig`]; two ``3x3`` convolutions.
    Basic,

    /// [`BottleneckConfig`]; ``1x1``, ``3x3``, ``1x1`` convolutions.
    Bottleneck,
}

impl fmt::Display for BlockKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "basicblock"),
            Self::Bottleneck => write!(f, "bottleneck"),
        }
    }
}

impl BlockKind {
    /// Channel expansion of the unit output.
    pub fn expansion(&self) -> usize {
        match self {
            Self::Basic => 1,
            Self::Bottleneck => BOTTLENECK_EXPANSION,
        }
    }
}

/// Options shared by every unit of a network.
#[derive(Config, Debug, PartialEq)]
pub struct BlockOptions {
    /// Bottleneck width per group, relative to 64.
    #[config(default = 64)]
    pub base_width: usize,

    /// Bottleneck width multiplier.
    #[config(default = 1)]
    pub groups: usize,

    /// Activation used throughout the unit.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl Default for BlockOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`BasicBlockConfig`] or [`BottleneckConfig`].
#[derive(Config, Debug, PartialEq)]
pub enum ResidualBlockConfig {
    /// A `ResNet` basic block.
    Basic(BasicBlockConfig),

    /// A `ResNet` bottleneck block.
    Bottleneck(BottleneckConfig),
}

impl From<BasicBlockConfig> for ResidualBlockConfig {
    fn from(config: BasicBlockConfig) -> Self {
        Self::Basic(config)
    }
}

impl From<BottleneckConfig> for ResidualBlockConfig {
    fn from(config: BottleneckConfig) -> Self {
        Self::Bottleneck(config)
    }
}

impl ResidualBlockMeta for ResidualBlockConfig {
    fn in_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.in_planes(),
            Self::Bottleneck(config) => config.in_planes(),
        }
    }

    fn planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.planes(),
            Self::Bottleneck(config) => config.planes(),
        }
    }

    fn expansion_factor(&self) -> usize {
        match self {
            Self::Basic(config) => config.expansion_factor(),
            Self::Bottleneck(config) => config.expansion_factor(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Basic(config) => config.stride(),
            Self::Bottleneck(config) => config.stride(),
        }
    }

    fn downsample(&self) -> bool {
        match self {
            Self::Basic(config) => config.downsample(),
            Self::Bottleneck(config) => config.downsample(),
        }
    }
}

impl ResidualBlockConfig {
    /// Construct a unit config of the given kind.
    pub fn of_kind(
        kind: BlockKind,
        in_planes: usize,
        planes: usize,
        stride: usize,
        downsample: bool,
        options: &BlockOptions,
    ) -> Self {
        match kind {
            BlockKind::Basic => BasicBlockConfig::new(in_planes, planes)
                .with_stride(stride)
                .with_downsample(downsample)
                .with_activation(options.activation)
                .into(),
            BlockKind::Bottleneck => BottleneckConfig::new(in_planes, planes)
                .with_stride(stride)
                .with_downsample(downsample)
                .with_base_width(options.base_width)
                .with_groups(options.groups)
                .with_activation(options.activation)
                .into(),
        }
    }

    /// The unit family.
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Basic(_) => BlockKind::Basic,
            Self::Bottleneck(_) => BlockKind::Bottleneck,
        }
    }

    /// Emit the unit.
    ///
    /// # Errors
    ///
    /// [`crate::ResNetError::ShapeUnderflow`] if a convolution does not fit.
    pub fn build(
        &self,
        ctx: &mut BuildContext,
    ) -> Result<LayerNode> {
        match self {
            Self::Basic(config) => config.build(ctx),
            Self::Bottleneck(config) => config.build(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_kind() {
        assert_eq!(BlockKind::Basic.expansion(), 1);
        assert_eq!(BlockKind::Bottleneck.expansion(), 4);
        assert_eq!(BlockKind::Basic.to_string(), "basicblock");
        assert_eq!(BlockKind::Bottleneck.to_string(), "bottleneck");
    }

    #[test]
    fn test_of_kind() {
        let options = BlockOptions::new().with_activation(ActivationConfig::Tanh);

        let basic = ResidualBlockConfig::of_kind(BlockKind::Basic, 64, 128, 2, true, &options);
        assert_eq!(basic.kind(), BlockKind::Basic);
        assert_eq!(basic.in_planes(), 64);
        assert_eq!(basic.out_planes(), 128);
        assert_eq!(basic.stride(), 2);
        assert!(basic.downsample());

        let bottleneck =
            ResidualBlockConfig::of_kind(BlockKind::Bottleneck, 256, 128, 1, false, &options);
        assert_eq!(bottleneck.kind(), BlockKind::Bottleneck);
        assert_eq!(bottleneck.planes(), 128);
        assert_eq!(bottleneck.out_planes(), 512);
        assert!(!bottleneck.downsample());
        match bottleneck {
            ResidualBlockConfig::Bottleneck(config) => {
                assert_eq!(config.activation, ActivationConfig::Tanh)
            }
            _ => unreachable!(),
        }
    }
}
