//! # `ResNet` Well-Known Versions
//!
//! The five standard depths, and the stage table each one expands to.
//!
//! | version | block      | units per stage |
//! |---------|------------|-----------------|
//! | 18      | basic      | 2, 2, 2, 2      |
//! | 34      | basic      | 3, 4, 6, 3      |
//! | 50      | bottleneck | 3, 4, 6, 3      |
//! | 101     | bottleneck | 3, 4, 23, 3     |
//! | 152     | bottleneck | 3, 8, 36, 3     |

use crate::errors::ResNetError;
use crate::models::resnet::layer_block::LayerBlockConfig;
use crate::models::resnet::residual_block::BlockKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Nominal widths of the four stages.
pub const STAGE_PLANES: [usize; 4] = [64, 128, 256, 512];

/// First-unit strides of the four stages.
pub const STAGE_STRIDES: [usize; 4] = [1, 2, 2, 2];

/// The stage layout of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageConfig {
    /// The unit family.
    pub block: BlockKind,

    /// The number of units in each of the four stages.
    pub block_counts: [usize; 4],
}

impl StageConfig {
    /// The four stage configs, in order.
    pub fn layer_blocks(&self) -> [LayerBlockConfig; 4] {
        std::array::from_fn(|idx| {
            LayerBlockConfig::new(self.block, STAGE_PLANES[idx], self.block_counts[idx])
                .with_stride(STAGE_STRIDES[idx])
        })
    }

    /// Channels of the final feature map.
    pub fn feature_planes(&self) -> usize {
        STAGE_PLANES[3] * self.block.expansion()
    }
}

/// A supported `ResNet` depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResNetVersion {
    /// `ResNet-18`.
    ResNet18,
    /// `ResNet-34`.
    ResNet34,
    /// `ResNet-50`.
    ResNet50,
    /// `ResNet-101`.
    ResNet101,
    /// `ResNet-152`.
    ResNet152,
}

impl ResNetVersion {
    /// Every supported version, shallowest first.
    pub const ALL: [ResNetVersion; 5] = [
        Self::ResNet18,
        Self::ResNet34,
        Self::ResNet50,
        Self::ResNet101,
        Self::ResNet152,
    ];

    /// The nominal depth.
    pub fn depth(&self) -> usize {
        match self {
            Self::ResNet18 => 18,
            Self::ResNet34 => 34,
            Self::ResNet50 => 50,
            Self::ResNet101 => 101,
            Self::ResNet152 => 152,
        }
    }

    /// The conventional lowercase name, e.g. ``resnet50``.
    pub fn name(&self) -> String {
        format!("resnet{}", self.depth())
    }

    /// The stage layout.
    pub fn stage_config(&self) -> StageConfig {
        let (block, block_counts) = match self {
            Self::ResNet18 => (BlockKind::Basic, [2, 2, 2, 2]),
            Self::ResNet34 => (BlockKind::Basic, [3, 4, 6, 3]),
            Self::ResNet50 => (BlockKind::Bottleneck, [3, 4, 6, 3]),
            Self::ResNet101 => (BlockKind::Bottleneck, [3, 4, 23, 3]),
            Self::ResNet152 => (BlockKind::Bottleneck, [3, 8, 36, 3]),
        };
        StageConfig {
            block,
            block_counts,
        }
    }
}

impl fmt::Display for ResNetVersion {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "ResNet-{}", self.depth())
    }
}

impl TryFrom<usize> for ResNetVersion {
    type Error = ResNetError;

    fn try_from(depth: usize) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|version| version.depth() == depth)
            .ok_or(ResNetError::UnsupportedVersion { version: depth })
    }
}

impl FromStr for ResNetVersion {
    type Err = ResNetError;

    /// Accepts ``50``, ``resnet50``, ``ResNet50`` and ``resnet-50``.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let digits = lower
            .strip_prefix("resnet")
            .map(|rest| rest.trim_start_matches(['-', '_']))
            .unwrap_or(lower.as_str());
        let depth: usize = digits
            .parse()
            .map_err(|_| ResNetError::invalid(format!("not a ResNet version: {s:?}")))?;
        Self::try_from(depth)
    }
}
