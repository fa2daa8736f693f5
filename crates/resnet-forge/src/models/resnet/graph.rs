//! # `ResNet` Layer Graph
//!
//! The builder emits a tree of [`LayerNode`]s. Every node has exactly one
//! parent; residual units are expressed as a [`MergeNode`] over two branches.
//!
//! Spatial arguments (`kernel`, `stride`, `padding`, resolutions) are
//! ``[height, width]``, matching ``burn``.

use crate::layers::activation::ActivationConfig;
use crate::models::resnet::output::OutputPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A convolution node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvNode {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Kernel size.
    pub kernel: [usize; 2],

    /// Stride.
    pub stride: [usize; 2],

    /// Padding, applied to both sides.
    pub padding: [usize; 2],

    /// Resolution the convolution reads.
    pub input_resolution: [usize; 2],

    /// Resolution the convolution produces.
    pub output_resolution: [usize; 2],
}

impl ConvNode {
    /// Weight count; `ResNet` convolutions carry no bias.
    pub fn num_params(&self) -> usize {
        self.in_channels * self.out_channels * self.kernel[0] * self.kernel[1]
    }
}

/// A batch normalization node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormNode {
    /// Number of normalized features.
    pub features: usize,

    /// Numerical stability epsilon.
    pub epsilon: f64,
}

/// A pooling node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolNode {
    /// Windowed max pooling.
    Max {
        /// Kernel size.
        kernel: [usize; 2],
        /// Stride.
        stride: [usize; 2],
        /// Padding, applied to both sides.
        padding: [usize; 2],
    },

    /// Global average pooling to ``1x1``.
    GlobalAverage,
}

/// A fully-connected node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearNode {
    /// Input features.
    pub in_features: usize,

    /// Output features.
    pub out_features: usize,
}

/// An element-wise addition of two branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeNode {
    /// The residual main path.
    pub main: Box<LayerNode>,

    /// The shortcut path; [`LayerNode::Identity`] or a projection.
    pub shortcut: Box<LayerNode>,
}

/// Discriminant of a [`LayerNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// [`LayerNode::Convolution`].
    Convolution,
    /// [`LayerNode::Normalization`].
    Normalization,
    /// [`LayerNode::Activation`].
    Activation,
    /// [`LayerNode::Identity`].
    Identity,
    /// [`LayerNode::Merge`].
    Merge,
    /// [`LayerNode::Group`].
    Group,
    /// [`LayerNode::Pool`].
    Pool,
    /// [`LayerNode::Linear`].
    Linear,
    /// [`LayerNode::Output`].
    Output,
}

/// One emitted layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerNode {
    /// A convolution.
    Convolution(ConvNode),

    /// A batch normalization.
    Normalization(NormNode),

    /// An element-wise activation.
    Activation(ActivationConfig),

    /// Pass-through shortcut.
    Identity,

    /// Residual merge.
    Merge(MergeNode),

    /// A sequential group.
    Group(Vec<LayerNode>),

    /// A pooling reduction.
    Pool(PoolNode),

    /// A fully-connected projection.
    Linear(LinearNode),

    /// The classification output policy.
    Output(OutputPolicy),
}

impl LayerNode {
    /// The node discriminant.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Convolution(_) => NodeKind::Convolution,
            Self::Normalization(_) => NodeKind::Normalization,
            Self::Activation(_) => NodeKind::Activation,
            Self::Identity => NodeKind::Identity,
            Self::Merge(_) => NodeKind::Merge,
            Self::Group(_) => NodeKind::Group,
            Self::Pool(_) => NodeKind::Pool,
            Self::Linear(_) => NodeKind::Linear,
            Self::Output(_) => NodeKind::Output,
        }
    }

    /// Direct children, in order.
    pub fn children(&self) -> Vec<&LayerNode> {
        match self {
            Self::Group(nodes) => nodes.iter().collect(),
            Self::Merge(merge) => vec![merge.main.as_ref(), merge.shortcut.as_ref()],
            _ => Vec::new(),
        }
    }

    /// Visit this node and all descendants, depth-first, pre-order.
    pub fn walk<F>(
        &self,
        f: &mut F,
    ) where
        F: FnMut(&LayerNode),
    {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Count this node and descendants of the given kind.
    pub fn count(
        &self,
        kind: NodeKind,
    ) -> usize {
        let mut total = 0;
        self.walk(&mut |node| {
            if node.kind() == kind {
                total += 1;
            }
        });
        total
    }

    /// Learnable parameter count of this node and its descendants.
    pub fn num_params(&self) -> usize {
        match self {
            Self::Convolution(conv) => conv.num_params(),
            Self::Normalization(norm) => 2 * norm.features,
            Self::Activation(act) => act.num_params(),
            Self::Linear(linear) => linear.in_features * linear.out_features + linear.out_features,
            Self::Group(_) | Self::Merge(_) => {
                self.children().iter().map(|child| child.num_params()).sum()
            }
            Self::Identity | Self::Pool(_) | Self::Output(_) => 0,
        }
    }

    /// The children of a group node.
    pub fn as_group(&self) -> Option<&[LayerNode]> {
        match self {
            Self::Group(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// Short one-line label.
    pub fn label(&self) -> String {
        match self {
            Self::Convolution(conv) => format!(
                "Convolution {} -> {} kernel={:?} stride={:?} padding={:?} {:?} -> {:?}",
                conv.in_channels,
                conv.out_channels,
                conv.kernel,
                conv.stride,
                conv.padding,
                conv.input_resolution,
                conv.output_resolution,
            ),
            Self::Normalization(norm) => {
                format!("BatchNorm {} eps={:e}", norm.features, norm.epsilon)
            }
            Self::Activation(act) => act.to_string(),
            Self::Identity => "Identity".to_string(),
            Self::Merge(_) => "AddMerge".to_string(),
            Self::Group(nodes) => format!("Sequential[{}]", nodes.len()),
            Self::Pool(PoolNode::Max {
                kernel,
                stride,
                padding,
            }) => format!("MaxPool kernel={kernel:?} stride={stride:?} padding={padding:?}"),
            Self::Pool(PoolNode::GlobalAverage) => "GlobalAvgPool".to_string(),
            Self::Linear(linear) => {
                format!("Linear {} -> {}", linear.in_features, linear.out_features)
            }
            Self::Output(policy) => format!("Output {policy}"),
        }
    }

    /// Write an indented tree rendering.
    pub fn write_tree(
        &self,
        f: &mut fmt::Formatter<'_>,
        depth: usize,
    ) -> fmt::Result {
        writeln!(f, "{:indent$}{}", "", self.label(), indent = depth * 2)?;
        for child in self.children() {
            child.write_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for LayerNode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        self.write_tree(f, 0)
    }
}
