//! # `ResNet` Core Model
//!
//! [`ResNetGraph::init`] materializes an emitted graph into a [`ResNet`]
//! module tree:
//!
//! * [`Stem`] - ``ConvNorm -> Activation -> MaxPool2d``.
//! * [`Stage`] - a sequence of [`ResidualUnit`]s.
//! * [`Head`] - ``AdaptiveAvgPool2d -> Linear -> OutputPolicy``.
//!
//! The graph is kept alongside the module, so the module can describe itself
//! and check weight archives against its own topology.

use crate::errors::{ResNetError, Result};
use crate::layers::activation::{Activation, ActivationConfig};
use crate::layers::blocks::conv_norm::{ConvNorm, ConvNormConfig};
use crate::models::resnet::graph::{ConvNode, LayerNode, LinearNode, NormNode, PoolNode};
use crate::models::resnet::output::OutputPolicy;
use crate::models::resnet::resnet_graph::ResNetGraph;
use burn::module::{Ignored, Module};
use burn::nn::conv::Conv2dConfig;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig};
use burn::nn::{Initializer, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::{Backend, Int, Tensor};

fn unexpected(
    expected: &'static str,
    found: &LayerNode,
) -> ResNetError {
    ResNetError::UnexpectedNode {
        expected,
        found: found.label(),
    }
}

fn conv_norm_config(
    node: &LayerNode,
    initializer: &Initializer,
) -> Result<ConvNormConfig> {
    let group = node
        .as_group()
        .ok_or_else(|| unexpected("Sequential[Convolution, Normalization]", node))?;
    match group {
        [
            LayerNode::Convolution(ConvNode {
                in_channels,
                out_channels,
                kernel,
                stride,
                padding,
                ..
            }),
            LayerNode::Normalization(NormNode { features, epsilon }),
        ] if features == out_channels => {
            let conv = Conv2dConfig::new([*in_channels, *out_channels], *kernel)
                .with_stride(*stride)
                .with_padding(PaddingConfig2d::Explicit(padding[0], padding[1]))
                .with_bias(false)
                .with_initializer(initializer.clone());
            Ok(ConvNormConfig::from(conv).with_epsilon(*epsilon))
        }
        _ => Err(unexpected("Sequential[Convolution, Normalization]", node)),
    }
}

fn activation_config(node: &LayerNode) -> Result<ActivationConfig> {
    match node {
        LayerNode::Activation(act) => Ok(*act),
        _ => Err(unexpected("Activation", node)),
    }
}

/// The `ResNet` input stem.
#[derive(Module, Debug)]
pub struct Stem<B: Backend> {
    /// ``7x7``, stride 2.
    pub conv_norm: ConvNorm<B>,

    /// Stem activation.
    pub act: Activation<B>,

    /// ``3x3``, stride 2.
    pub pool: MaxPool2d,
}

impl<B: Backend> Stem<B> {
    fn init(
        nodes: &[LayerNode],
        initializer: &Initializer,
        device: &B::Device,
    ) -> Result<Self> {
        match nodes {
            [
                conv_norm,
                act,
                LayerNode::Pool(PoolNode::Max {
                    kernel,
                    stride,
                    padding,
                }),
            ] => Ok(Self {
                conv_norm: conv_norm_config(conv_norm, initializer)?.init(device),
                act: activation_config(act)?.init(device),
                pool: MaxPool2dConfig::new(*kernel)
                    .with_strides(*stride)
                    .with_padding(PaddingConfig2d::Explicit(padding[0], padding[1]))
                    .init(),
            }),
            _ => Err(ResNetError::UnexpectedNode {
                expected: "[ConvBlock, Activation, MaxPool]",
                found: format!("{} stem nodes", nodes.len()),
            }),
        }
    }

    /// Forward pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = self.conv_norm.forward(input);
        let x = self.act.forward(x);
        self.pool.forward(x)
    }
}

/// One layer on the main path of a [`ResidualUnit`].
#[derive(Module, Debug)]
pub enum PathLayer<B: Backend> {
    /// A convolution block.
    ConvNorm(ConvNorm<B>),

    /// An inner activation.
    Activation(Activation<B>),
}

impl<B: Backend> PathLayer<B> {
    /// Forward pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Self::ConvNorm(layer) => layer.forward(input),
            Self::Activation(layer) => layer.forward(input),
        }
    }
}

/// A residual unit: ``act(main(x) + shortcut(x))``.
#[derive(Module, Debug)]
pub struct ResidualUnit<B: Backend> {
    /// The main path.
    pub main: Vec<PathLayer<B>>,

    /// The projection shortcut; identity if absent.
    pub shortcut: Option<ConvNorm<B>>,

    /// Post-merge activation.
    pub act: Activation<B>,
}

impl<B: Backend> ResidualUnit<B> {
    fn init(
        node: &LayerNode,
        initializer: &Initializer,
        device: &B::Device,
    ) -> Result<Self> {
        const EXPECTED: &str = "Sequential[AddMerge, Activation]";

        let (merge, act) = match node.as_group() {
            Some([LayerNode::Merge(merge), act]) => (merge, act),
            _ => return Err(unexpected(EXPECTED, node)),
        };

        let main = merge
            .main
            .as_group()
            .ok_or_else(|| unexpected("Sequential main path", &merge.main))?
            .iter()
            .map(|layer| match layer {
                LayerNode::Group(_) => Ok(PathLayer::ConvNorm(
                    conv_norm_config(layer, initializer)?.init(device),
                )),
                LayerNode::Activation(act) => Ok(PathLayer::Activation(act.init(device))),
                _ => Err(unexpected("ConvBlock or Activation", layer)),
            })
            .collect::<Result<Vec<_>>>()?;

        let shortcut = match merge.shortcut.as_ref() {
            LayerNode::Identity => None,
            projection => Some(conv_norm_config(projection, initializer)?.init(device)),
        };

        Ok(Self {
            main,
            shortcut,
            act: activation_config(act)?.init(device),
        })
    }

    /// Forward pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let identity = match &self.shortcut {
            Some(projection) => projection.forward(input.clone()),
            None => input.clone(),
        };

        let x = self
            .main
            .iter()
            .fold(input, |x, layer| layer.forward(x));

        self.act.forward(x + identity)
    }
}

/// A `ResNet` stage.
#[derive(Module, Debug)]
pub struct Stage<B: Backend> {
    /// The units, in order.
    pub units: Vec<ResidualUnit<B>>,
}

impl<B: Backend> Stage<B> {
    /// Forward pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.units.iter().fold(input, |x, unit| unit.forward(x))
    }
}

/// The classification head.
#[derive(Module, Debug)]
pub struct Head<B: Backend> {
    /// Global average pool.
    pub pool: AdaptiveAvgPool2d,

    /// Class projection.
    pub fc: Linear<B>,

    /// Final activation and loss pairing.
    pub output: Ignored<OutputPolicy>,
}

impl<B: Backend> Head<B> {
    fn init(
        nodes: &[LayerNode],
        device: &B::Device,
    ) -> Result<Self> {
        match nodes {
            [
                LayerNode::Pool(PoolNode::GlobalAverage),
                LayerNode::Linear(LinearNode {
                    in_features,
                    out_features,
                }),
                LayerNode::Output(policy),
            ] => Ok(Self {
                pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
                fc: LinearConfig::new(*in_features, *out_features).init(device),
                output: Ignored(*policy),
            }),
            _ => Err(ResNetError::UnexpectedNode {
                expected: "[GlobalAvgPool, Linear, Output]",
                found: format!("{} head nodes", nodes.len()),
            }),
        }
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `features`: ``[batch, channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]``, after the output policy.
    pub fn forward(
        &self,
        features: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let x = self.pool.forward(features);
        // [B, C, 1, 1] -> [B, C]
        let x = x.flatten(1, 3);
        let x = self.fc.forward(x);
        self.output.apply(x)
    }
}

/// `ResNet` model.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    /// The input stem.
    pub stem: Stem<B>,

    /// The four stages.
    pub stages: Vec<Stage<B>>,

    /// The classification head, if any.
    pub head: Option<Head<B>>,

    /// The graph this model was materialized from.
    pub graph: Ignored<ResNetGraph>,
}

impl ResNetGraph {
    /// Materialize the graph as a ``burn`` module.
    ///
    /// # Arguments
    ///
    /// - `initializer`: convolution weight initializer.
    /// - `device`: the target device.
    ///
    /// # Errors
    ///
    /// [`ResNetError::UnexpectedNode`] if the graph does not have the
    /// stem / unit / head layout of a `ResNet`.
    pub fn init<B: Backend>(
        &self,
        initializer: &Initializer,
        device: &B::Device,
    ) -> Result<ResNet<B>> {
        let stem = Stem::init(&self.stem, initializer, device)?;

        let stages = self
            .stages
            .iter()
            .map(|stage| {
                stage
                    .blocks
                    .iter()
                    .map(|block| ResidualUnit::init(block, initializer, device))
                    .collect::<Result<Vec<_>>>()
                    .map(|units| Stage { units })
            })
            .collect::<Result<Vec<_>>>()?;

        let head = self
            .head
            .as_deref()
            .map(|nodes| Head::init(nodes, device))
            .transpose()?;

        tracing::info!("{} materialized: {} params", self.version, self.num_params());

        Ok(ResNet {
            stem,
            stages,
            head,
            graph: Ignored(self.clone()),
        })
    }
}

impl<B: Backend> ResNet<B> {
    /// The graph this model was materialized from.
    pub fn graph(&self) -> &ResNetGraph {
        &self.graph
    }

    /// Stem and stages.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, features.channels, features.height, features.width]``
    pub fn forward_features(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        debug_assert_eq!(input.dims()[1], self.graph.input.channels);

        let x = self.stem.forward(input);
        self.stages.iter().fold(x, |x, stage| stage.forward(x))
    }

    /// Full classification forward pass.
    ///
    /// # Errors
    ///
    /// [`ResNetError::MissingHead`] if the model has no head.
    pub fn try_forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Result<Tensor<B, 2>> {
        let head = self.head.as_ref().ok_or(ResNetError::MissingHead)?;
        Ok(head.forward(self.forward_features(input)))
    }

    /// Full classification forward pass.
    ///
    /// # Panics
    ///
    /// If the model has no head; see [`ResNet::try_forward`].
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        match self.try_forward(input) {
            Ok(output) => output,
            Err(err) => panic!("{err}"),
        }
    }

    /// Mean training loss of the head output against class `targets`.
    ///
    /// # Errors
    ///
    /// [`ResNetError::MissingHead`] if the model has no head.
    pub fn loss(
        &self,
        input: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> Result<Tensor<B, 1>> {
        let output = self.try_forward(input)?;
        let policy = self
            .head
            .as_ref()
            .map_or(OutputPolicy::default(), |head| *head.output);
        Ok(policy.loss(output, targets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet::builder::{CONV_INTO_RELU_INITIALIZER, ResNetConfig};
    use crate::models::resnet::prefabs::ResNetVersion;
    use burn::backend::NdArray;
    use burn::prelude::TensorData;
    use burn::tensor::Distribution;

    type B = NdArray;

    fn small(version: ResNetVersion) -> ResNetConfig {
        ResNetConfig::from_shape(version, (3, 32, 32)).with_num_classes(10)
    }

    #[test]
    fn test_structure() {
        let device = Default::default();
        let graph = small(ResNetVersion::ResNet18).build_graph().unwrap();
        let model: ResNet<B> = graph.init(&CONV_INTO_RELU_INITIALIZER, &device).unwrap();

        assert_eq!(model.stages.len(), 4);
        let units: Vec<usize> = model.stages.iter().map(|s| s.units.len()).collect();
        assert_eq!(units, vec![2, 2, 2, 2]);

        assert!(model.stages[0].units[0].shortcut.is_none());
        assert!(model.stages[1].units[0].shortcut.is_some());
        assert!(model.stages[1].units[1].shortcut.is_none());
        assert_eq!(model.stages[0].units[0].main.len(), 3);
        assert_eq!(model.graph(), &graph);
    }

    #[test]
    fn test_forward_shapes_basic() {
        let device = Default::default();
        let config = small(ResNetVersion::ResNet18);
        let model: ResNet<B> = config.init(&device).unwrap();
        let graph = model.graph().clone();

        let input = Tensor::<B, 4>::random([2, 3, 32, 32], Distribution::Default, &device);

        let features = model.forward_features(input.clone());
        let f = graph.features;
        assert_eq!(features.dims(), [2, f.channels, f.height, f.width]);
        assert_eq!(features.dims(), [2, 512, 1, 1]);

        let output = model.forward(input);
        assert_eq!(output.dims(), [2, 10]);
    }

    #[test]
    fn test_forward_shapes_bottleneck_non_square() {
        let device = Default::default();
        let config = ResNetConfig::from_shape(ResNetVersion::ResNet50, (1, 64, 48))
            .with_num_classes(5)
            .with_output(OutputPolicy::Probabilities);
        let model: ResNet<B> = config.init(&device).unwrap();
        let f = model.graph().features;
        assert_eq!(f.channels, 2048);

        let input = Tensor::<B, 4>::random([1, 1, 64, 48], Distribution::Default, &device);
        let features = model.forward_features(input.clone());
        assert_eq!(features.dims(), [1, f.channels, f.height, f.width]);

        let probs = model.forward(input);
        assert_eq!(probs.dims(), [1, 5]);
        let total: f32 = probs.sum().into_scalar();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_headless() {
        let device = Default::default();
        let model: ResNet<B> = small(ResNetVersion::ResNet18)
            .with_include_top(false)
            .init(&device)
            .unwrap();
        assert!(model.head.is_none());

        let input = Tensor::<B, 4>::zeros([1, 3, 32, 32], &device);
        assert_eq!(model.forward_features(input.clone()).dims(), [1, 512, 1, 1]);
        assert!(matches!(
            model.try_forward(input.clone()),
            Err(ResNetError::MissingHead)
        ));
        assert!(matches!(
            model.loss(input, Tensor::from_data(TensorData::from([0i64]), &device)),
            Err(ResNetError::MissingHead)
        ));
    }

    #[test]
    fn test_loss() {
        let device = Default::default();
        let model: ResNet<B> = small(ResNetVersion::ResNet18)
            .with_output(OutputPolicy::NegativeLogLikelihood)
            .init(&device)
            .unwrap();

        let input = Tensor::<B, 4>::random([3, 3, 32, 32], Distribution::Default, &device);
        let targets = Tensor::<B, 1, Int>::from_data(TensorData::from([0i64, 4, 9]), &device);
        let loss = model.loss(input, targets).unwrap();

        assert_eq!(loss.dims(), [1]);
        let value: f32 = loss.into_scalar();
        assert!(value.is_finite());
        assert!(value >= 0.0);
    }

    #[test]
    fn test_unexpected_node() {
        let device = Default::default();
        let mut graph = small(ResNetVersion::ResNet18).build_graph().unwrap();
        graph.stages[2].blocks[0] = LayerNode::Identity;

        let err = graph
            .init::<B>(&CONV_INTO_RELU_INITIALIZER, &device)
            .unwrap_err();
        match err {
            ResNetError::UnexpectedNode { expected, found } => {
                assert_eq!(expected, "Sequential[AddMerge, Activation]");
                assert_eq!(found, "Identity");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
