//! # `ResNet` Layer Block
//!
//! A layer block (a "stage") is a sequence of residual units of one
//! [`BlockKind`], sharing a nominal `planes` width.
//!
//! [`LayerBlockConfig`] implements [`Config`], and provides
//! [`LayerBlockConfig::plan`] to lay out the unit configs of the stage,
//! and [`LayerBlockConfig::build`] to emit them against a [`BuildContext`].
//!
//! Only the first unit of a stage may stride or project; it projects
//! whenever it strides, or whenever the incoming channel count differs
//! from ``planes * expansion``.

use crate::errors::{ResNetError, Result};
use crate::models::resnet::graph::LayerNode;
use crate::models::resnet::residual_block::{
    BlockKind, BlockOptions, ResidualBlockConfig, ResidualBlockMeta,
};
use crate::models::resnet::shape::{BuildContext, ShapeState};
use burn::config::Config;
use serde::{Deserialize, Serialize};

/// Layer block Meta API.
pub trait LayerBlockMeta {
    /// The number of units.
    fn len(&self) -> usize;

    /// Check if the layer block is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// The stride of the first unit.
    fn stride(&self) -> usize;
}

/// Layer block configuration.
#[derive(Config, Debug, PartialEq)]
pub struct LayerBlockConfig {
    /// The unit family.
    pub block: BlockKind,

    /// The nominal width of every unit.
    pub planes: usize,

    /// The number of units.
    pub num_blocks: usize,

    /// The stride of the first unit.
    #[config(default = 1)]
    pub stride: usize,
}

impl LayerBlockMeta for LayerBlockConfig {
    fn len(&self) -> usize {
        self.num_blocks
    }

    fn out_planes(&self) -> usize {
        self.planes * self.block.expansion()
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl LayerBlockConfig {
    /// Check if the config is valid.
    ///
    /// # Errors
    ///
    /// [`ResNetError::InvalidConfiguration`] on an empty stage, zero planes or zero stride.
    pub fn try_validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(ResNetError::invalid("layer block has no units"));
        }
        if self.planes == 0 {
            return Err(ResNetError::invalid("layer block planes must be positive"));
        }
        if self.stride == 0 {
            return Err(ResNetError::invalid("layer block stride must be positive"));
        }
        Ok(())
    }

    /// Lay out the unit configs of the stage.
    ///
    /// # Arguments
    ///
    /// - `in_planes`: the channel count the stage receives.
    /// - `options`: options threaded into every unit.
    ///
    /// # Errors
    ///
    /// See [`LayerBlockConfig::try_validate`].
    pub fn plan(
        &self,
        in_planes: usize,
        options: &BlockOptions,
    ) -> Result<Vec<ResidualBlockConfig>> {
        self.try_validate()?;

        let out_planes = self.out_planes();
        let downsample = self.stride != 1 || in_planes != out_planes;

        let mut units = Vec::with_capacity(self.num_blocks);
        units.push(ResidualBlockConfig::of_kind(
            self.block,
            in_planes,
            self.planes,
            self.stride,
            downsample,
            options,
        ));
        for _ in 1..self.num_blocks {
            units.push(ResidualBlockConfig::of_kind(
                self.block,
                out_planes,
                self.planes,
                1,
                false,
                options,
            ));
        }
        Ok(units)
    }

    /// Emit the stage, advancing `ctx`.
    ///
    /// The first unit reads `ctx.downsample_in_size`; after it is emitted,
    /// `ctx.downsample_in_size` becomes ``planes * expansion``.
    ///
    /// # Errors
    ///
    /// - [`ResNetError::InvalidConfiguration`] if the config is invalid.
    /// - [`ResNetError::ShapeUnderflow`] if a convolution does not fit.
    pub fn build(
        &self,
        ctx: &mut BuildContext,
        options: &BlockOptions,
    ) -> Result<LayerBlockGraph> {
        let in_planes = ctx.downsample_in_size;
        let units = self.plan(in_planes, options)?;
        let input = ctx.shape;

        let mut blocks = Vec::with_capacity(units.len());
        for (idx, unit) in units.iter().enumerate() {
            blocks.push(unit.build(ctx)?);
            if idx == 0 {
                ctx.downsample_in_size = unit.out_planes();
            }
        }

        tracing::info!(
            "{} x{} planes={} stride={}: {} ---> {}",
            self.block,
            self.num_blocks,
            self.planes,
            self.stride,
            input,
            ctx.shape,
        );

        Ok(LayerBlockGraph {
            config: self.clone(),
            in_planes,
            units,
            blocks,
            input,
            output: ctx.shape,
        })
    }
}

/// One emitted stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerBlockGraph {
    /// The stage config.
    pub config: LayerBlockConfig,

    /// The channel count the stage received.
    pub in_planes: usize,

    /// The planned unit configs.
    pub units: Vec<ResidualBlockConfig>,

    /// The emitted units, one per config.
    pub blocks: Vec<LayerNode>,

    /// The tracked shape on entry.
    pub input: ShapeState,

    /// The tracked shape on exit.
    pub output: ShapeState,
}

impl LayerBlockGraph {
    /// Does the first unit project its shortcut?
    pub fn first_downsample(&self) -> bool {
        self.units.first().is_some_and(|unit| unit.downsample())
    }

    /// The number of output feature planes.
    pub fn out_planes(&self) -> usize {
        self.config.out_planes()
    }
}
