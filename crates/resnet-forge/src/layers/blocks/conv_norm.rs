//! # `ConvNorm` Module
//!
//! A [`ConvNorm`] module is a [`Conv2d`] layer followed by a [`BatchNorm`] layer.

use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig};
use burn::prelude::{Backend, Tensor};

/// [`ConvNorm`] Meta.
pub trait ConvNormMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Get the stride, ``[height, width]``.
    fn stride(&self) -> [usize; 2];
}

/// [`ConvNorm`] Config.
#[derive(Config, Debug)]
pub struct ConvNormConfig {
    /// The [`Conv2d`] config.
    pub conv: Conv2dConfig,

    /// The [`BatchNorm`] epsilon.
    #[config(default = 1e-5)]
    pub epsilon: f64,
}

impl ConvNormMeta for ConvNormConfig {
    fn in_channels(&self) -> usize {
        self.conv.channels[0]
    }

    fn out_channels(&self) -> usize {
        self.conv.channels[1]
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }
}

impl From<Conv2dConfig> for ConvNormConfig {
    fn from(conv: Conv2dConfig) -> Self {
        Self::new(conv)
    }
}

impl ConvNormConfig {
    /// Initialize a [`ConvNorm`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ConvNorm<B> {
        ConvNorm {
            norm: BatchNormConfig::new(self.conv.channels[1])
                .with_epsilon(self.epsilon)
                .init(device),

            conv: self.conv.init(device),
        }
    }
}

/// Grouped [`Conv2d`] and [`BatchNorm`] layer.
#[derive(Module, Debug)]
pub struct ConvNorm<B: Backend> {
    /// Internal Conv2d layer.
    pub conv: Conv2d<B>,

    /// Internal Norm Layer.
    pub norm: BatchNorm<B, 2>,
}

impl<B: Backend> ConvNormMeta for ConvNorm<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.dims()[1] * self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.dims()[0]
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }
}

impl<B: Backend> ConvNorm<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        debug_assert_eq!(input.dims()[1], self.in_channels());

        let x = self.conv.forward(input);

        self.norm.forward(x)
    }
}
