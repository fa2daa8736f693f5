//! # `ResNet` Builder
//!
//! [`ResNetConfig`] implements [`Config`], and describes one network:
//! its depth, its input shape, and whether it carries a classification head.
//!
//! [`ResNetBuilder`] consumes a validated config and emits a [`ResNetGraph`]:
//!
//! ```text
//! stem:   ConvBlock(7x7, /2) -> Activation -> MaxPool(3x3, /2)
//! layer1: planes=64,  stride=1
//! layer2: planes=128, stride=2
//! layer3: planes=256, stride=2
//! layer4: planes=512, stride=2
//! head:   GlobalAvgPool -> Linear -> Output
//! ```

use crate::errors::{ResNetError, Result};
use crate::layers::activation::ActivationConfig;
use crate::models::resnet::basic_block::activation_node;
use crate::models::resnet::conv_block::ConvBlockConfig;
use crate::models::resnet::graph::{LayerNode, LinearNode, PoolNode};
use crate::models::resnet::output::OutputPolicy;
use crate::models::resnet::prefabs::ResNetVersion;
use crate::models::resnet::residual_block::BlockOptions;
use crate::models::resnet::resnet_graph::ResNetGraph;
use crate::models::resnet::resnet_model::ResNet;
use crate::models::resnet::shape::{BuildContext, ShapeState};
use burn::config::Config;
use burn::nn::Initializer;
use burn::prelude::Backend;
use core::f64::consts::SQRT_2;

/// Kaiming-normal, fan-out, tuned for convolutions feeding a ``ReLU``.
pub const CONV_INTO_RELU_INITIALIZER: Initializer = Initializer::KaimingNormal {
    gain: SQRT_2,
    fan_out_only: true,
};

/// [`ResNetBuilder`] configuration.
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Network depth; one of 18, 34, 50, 101, 152.
    pub depth: usize,

    /// Input channels.
    #[config(default = 3)]
    pub input_channels: usize,

    /// Input width.
    #[config(default = 224)]
    pub input_width: usize,

    /// Input height.
    #[config(default = 224)]
    pub input_height: usize,

    /// Append the classification head.
    #[config(default = true)]
    pub include_top: bool,

    /// Load weights from `weights_path` on [`ResNetConfig::init`].
    #[config(default = false)]
    pub pre_trained: bool,

    /// Number of classes of the head.
    #[config(default = 1000)]
    pub num_classes: usize,

    /// Weights archive for `pre_trained`.
    #[config(default = "None")]
    pub weights_path: Option<String>,

    /// Bottleneck width per group, relative to 64.
    #[config(default = 64)]
    pub base_width: usize,

    /// Bottleneck width multiplier.
    #[config(default = 1)]
    pub groups: usize,

    /// Activation used throughout the network.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,

    /// Head output policy.
    #[config(default = "OutputPolicy::CrossEntropy")]
    pub output: OutputPolicy,

    /// Convolution weight initializer.
    #[config(default = "CONV_INTO_RELU_INITIALIZER")]
    pub initializer: Initializer,
}

impl ResNetConfig {
    /// A config for the given version, with defaults otherwise.
    pub fn from_version(version: ResNetVersion) -> Self {
        Self::new(version.depth())
    }

    /// A config for the given version and ``(channels, height, width)`` input.
    pub fn from_shape(
        version: ResNetVersion,
        (channels, height, width): (usize, usize, usize),
    ) -> Self {
        Self::from_version(version)
            .with_input_channels(channels)
            .with_input_height(height)
            .with_input_width(width)
    }

    /// `ResNet-18` with a head of `num_classes`.
    pub fn resnet18(num_classes: usize) -> Self {
        Self::from_version(ResNetVersion::ResNet18).with_num_classes(num_classes)
    }

    /// `ResNet-34` with a head of `num_classes`.
    pub fn resnet34(num_classes: usize) -> Self {
        Self::from_version(ResNetVersion::ResNet34).with_num_classes(num_classes)
    }

    /// `ResNet-50` with a head of `num_classes`.
    pub fn resnet50(num_classes: usize) -> Self {
        Self::from_version(ResNetVersion::ResNet50).with_num_classes(num_classes)
    }

    /// `ResNet-101` with a head of `num_classes`.
    pub fn resnet101(num_classes: usize) -> Self {
        Self::from_version(ResNetVersion::ResNet101).with_num_classes(num_classes)
    }

    /// `ResNet-152` with a head of `num_classes`.
    pub fn resnet152(num_classes: usize) -> Self {
        Self::from_version(ResNetVersion::ResNet152).with_num_classes(num_classes)
    }

    /// The input shape, ``(channels, width, height)``.
    pub fn input_shape(&self) -> ShapeState {
        ShapeState::new(self.input_channels, self.input_width, self.input_height)
    }

    /// Options threaded into every residual unit.
    pub fn block_options(&self) -> BlockOptions {
        BlockOptions::new()
            .with_base_width(self.base_width)
            .with_groups(self.groups)
            .with_activation(self.activation)
    }

    /// Check the config, before anything is emitted.
    ///
    /// # Returns
    ///
    /// The resolved [`ResNetVersion`].
    ///
    /// # Errors
    ///
    /// - [`ResNetError::UnsupportedVersion`] for an unknown depth.
    /// - [`ResNetError::InvalidConfiguration`] for contradictory options.
    pub fn validate(&self) -> Result<ResNetVersion> {
        let version = ResNetVersion::try_from(self.depth)?;

        if self.pre_trained && !self.include_top {
            return Err(ResNetError::invalid(
                "pre_trained weights require include_top",
            ));
        }
        if self.pre_trained && self.weights_path.is_none() {
            return Err(ResNetError::invalid("pre_trained requires a weights_path"));
        }
        if self.include_top && self.num_classes == 0 {
            return Err(ResNetError::invalid(
                "num_classes must be positive with include_top",
            ));
        }
        if self.input_channels == 0 {
            return Err(ResNetError::invalid("input_channels must be positive"));
        }
        if self.base_width == 0 {
            return Err(ResNetError::invalid("base_width must be positive"));
        }
        if self.groups == 0 {
            return Err(ResNetError::invalid("groups must be positive"));
        }

        Ok(version)
    }

    /// Validate and emit the layer graph.
    ///
    /// # Errors
    ///
    /// See [`ResNetConfig::validate`] and [`ResNetBuilder::build`].
    pub fn build_graph(&self) -> Result<ResNetGraph> {
        ResNetBuilder::new(self.clone())?.build()
    }

    /// Emit the graph and materialize it.
    ///
    /// With `pre_trained`, the weights are loaded from `weights_path`.
    ///
    /// # Errors
    ///
    /// - construction errors, see [`ResNetConfig::build_graph`].
    /// - [`ResNetError::Weights`] if the archive cannot be loaded.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<ResNet<B>> {
        let model = self.build_graph()?.init(&self.initializer, device)?;

        match (self.pre_trained, &self.weights_path) {
            (true, Some(path)) => model.load_weights(path, device),
            _ => Ok(model),
        }
    }
}

/// Emits the layer graph of one [`ResNetConfig`].
///
/// A builder owns its [`BuildContext`] and is consumed by [`ResNetBuilder::build`].
#[derive(Debug)]
pub struct ResNetBuilder {
    config: ResNetConfig,
    version: ResNetVersion,
    ctx: BuildContext,
}

impl ResNetBuilder {
    /// Validate `config` and prepare a build.
    ///
    /// # Errors
    ///
    /// See [`ResNetConfig::validate`].
    pub fn new(config: ResNetConfig) -> Result<Self> {
        let version = config.validate()?;
        let ctx = BuildContext::new(config.input_shape());
        Ok(Self {
            config,
            version,
            ctx,
        })
    }

    /// The resolved version.
    pub fn version(&self) -> ResNetVersion {
        self.version
    }

    /// Emit the full graph.
    ///
    /// # Errors
    ///
    /// [`ResNetError::ShapeUnderflow`] if the input is too small for the network.
    pub fn build(mut self) -> Result<ResNetGraph> {
        let span = tracing::info_span!("resnet_build", version = %self.version);
        let _guard = span.enter();

        let input = self.ctx.shape;
        tracing::info!("{} input {input}", self.version);

        let stem = self.stem()?;

        let options = self.config.block_options();
        let mut stages = Vec::with_capacity(4);
        for layer in self.version.stage_config().layer_blocks() {
            stages.push(layer.build(&mut self.ctx, &options)?);
        }
        let features = self.ctx.shape;

        let head = self.config.include_top.then(|| self.head());
        let output = self.ctx.shape;

        tracing::info!("{} features {features} output {output}", self.version);

        Ok(ResNetGraph {
            version: self.version,
            input,
            stem,
            stages,
            head,
            features,
            output,
        })
    }

    fn stem(&mut self) -> Result<Vec<LayerNode>> {
        let mut nodes = Vec::with_capacity(3);

        ConvBlockConfig::new(self.config.input_channels, BuildContext::STEM_PLANES)
            .with_kernel([7, 7])
            .with_stride([2, 2])
            .with_padding([3, 3])
            .emit(&mut nodes, &mut self.ctx)?;
        nodes.push(activation_node(self.config.activation));

        let (kernel, stride, padding) = ([3, 3], [2, 2], [1, 1]);
        let input = self.ctx.shape;
        self.ctx
            .shape
            .apply_window(input.channels, kernel, stride, padding)?;
        tracing::debug!("MaxPool: {input} ---> {}", self.ctx.shape);
        nodes.push(LayerNode::Pool(PoolNode::Max {
            kernel,
            stride,
            padding,
        }));

        Ok(nodes)
    }

    fn head(&mut self) -> Vec<LayerNode> {
        let features = self.ctx.shape;
        self.ctx.shape.set_resolution([1, 1]);
        tracing::debug!("GlobalAvgPool: {features} ---> {}", self.ctx.shape);

        let linear = LinearNode {
            in_features: features.channels,
            out_features: self.config.num_classes,
        };
        self.ctx.shape.channels = linear.out_features;
        tracing::debug!(
            "Linear: ({}) ---> ({})",
            linear.in_features,
            linear.out_features
        );
        tracing::debug!("{}", self.config.output);

        vec![
            LayerNode::Pool(PoolNode::GlobalAverage),
            LayerNode::Linear(linear),
            LayerNode::Output(self.config.output),
        ]
    }
}
