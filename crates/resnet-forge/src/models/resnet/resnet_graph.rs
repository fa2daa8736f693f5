//! # `ResNet` Graph
//!
//! [`ResNetGraph`] is the result of a [`crate::models::resnet::builder::ResNetBuilder`]
//! build: the stem, the four stages, and the optional head, with the tracked
//! shapes between them.

use crate::models::resnet::graph::{ConvNode, LayerNode, NodeKind};
use crate::models::resnet::layer_block::LayerBlockGraph;
use crate::models::resnet::output::OutputPolicy;
use crate::models::resnet::prefabs::ResNetVersion;
use crate::models::resnet::shape::ShapeState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An emitted `ResNet` topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResNetGraph {
    /// The network version.
    pub version: ResNetVersion,

    /// The input shape.
    pub input: ShapeState,

    /// ``[ConvBlock, Activation, MaxPool]``.
    pub stem: Vec<LayerNode>,

    /// The four stages.
    pub stages: Vec<LayerBlockGraph>,

    /// ``[GlobalAvgPool, Linear, Output]``, if the head was included.
    pub head: Option<Vec<LayerNode>>,

    /// The shape of the final feature map, before the head.
    pub features: ShapeState,

    /// The shape of the network output.
    pub output: ShapeState,
}

impl ResNetGraph {
    /// Top-level nodes, in order: stem, stage units, head.
    pub fn nodes(&self) -> impl Iterator<Item = &LayerNode> {
        self.stem
            .iter()
            .chain(self.stages.iter().flat_map(|stage| stage.blocks.iter()))
            .chain(self.head.iter().flatten())
    }

    /// Visit every node, depth-first, pre-order.
    pub fn walk<F>(
        &self,
        f: &mut F,
    ) where
        F: FnMut(&LayerNode),
    {
        for node in self.nodes() {
            node.walk(f);
        }
    }

    /// Count the nodes of the given kind.
    pub fn count(
        &self,
        kind: NodeKind,
    ) -> usize {
        self.nodes().map(|node| node.count(kind)).sum()
    }

    /// Every convolution, in emission order.
    pub fn convolutions(&self) -> Vec<&ConvNode> {
        fn collect<'a>(
            node: &'a LayerNode,
            acc: &mut Vec<&'a ConvNode>,
        ) {
            if let LayerNode::Convolution(conv) = node {
                acc.push(conv);
            }
            for child in node.children() {
                collect(child, acc);
            }
        }

        let mut acc = Vec::new();
        for node in self.nodes() {
            collect(node, &mut acc);
        }
        acc
    }

    /// Learnable parameter count.
    pub fn num_params(&self) -> usize {
        self.nodes().map(LayerNode::num_params).sum()
    }

    /// Shapes of every learnable tensor, in emission order.
    ///
    /// Linear weights are ``[in, out]``, matching ``burn``.
    pub fn param_shapes(&self) -> Vec<Vec<usize>> {
        let mut shapes = Vec::new();
        self.walk(&mut |node| match node {
            LayerNode::Convolution(conv) => shapes.push(vec![
                conv.out_channels,
                conv.in_channels,
                conv.kernel[0],
                conv.kernel[1],
            ]),
            LayerNode::Normalization(norm) => {
                shapes.push(vec![norm.features]);
                shapes.push(vec![norm.features]);
            }
            LayerNode::Activation(act) if act.num_params() > 0 => {
                shapes.push(vec![act.num_params()])
            }
            LayerNode::Linear(linear) => {
                shapes.push(vec![linear.in_features, linear.out_features]);
                shapes.push(vec![linear.out_features]);
            }
            _ => {}
        });
        shapes
    }

    /// A compact signature of [`ResNetGraph::param_shapes`].
    ///
    /// Two graphs can share weights iff their fingerprints are equal.
    pub fn fingerprint(&self) -> String {
        self.param_shapes()
            .iter()
            .map(|shape| {
                shape
                    .iter()
                    .map(usize::to_string)
                    .collect::<Vec<_>>()
                    .join("x")
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    /// The shape entering the first stage.
    pub fn stem_output(&self) -> ShapeState {
        self.stages.first().map_or(self.features, |stage| stage.input)
    }

    /// The number of classes, if the head was included.
    pub fn num_classes(&self) -> Option<usize> {
        self.head.as_ref().map(|_| self.output.channels)
    }

    /// The head output policy, if the head was included.
    pub fn output_policy(&self) -> Option<OutputPolicy> {
        self.head.iter().flatten().find_map(|node| match node {
            LayerNode::Output(policy) => Some(*policy),
            _ => None,
        })
    }

    /// Pretty JSON rendering.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ResNetGraph {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        writeln!(f, "{} {} ---> {}", self.version, self.input, self.output)?;

        writeln!(f, "stem {} ---> {}", self.input, self.stem_output())?;
        for node in &self.stem {
            node.write_tree(f, 1)?;
        }

        for (idx, stage) in self.stages.iter().enumerate() {
            writeln!(
                f,
                "layer{} {} x{} planes={} stride={} {} ---> {}",
                idx + 1,
                stage.config.block,
                stage.config.num_blocks,
                stage.config.planes,
                stage.config.stride,
                stage.input,
                stage.output,
            )?;
            for node in &stage.blocks {
                node.write_tree(f, 1)?;
            }
        }

        if let Some(head) = &self.head {
            writeln!(f, "head {} ---> {}", self.features, self.output)?;
            for node in head {
                node.write_tree(f, 1)?;
            }
        }

        writeln!(f, "params: {}", self.num_params())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet::builder::ResNetConfig;
    use hamcrest::prelude::*;

    #[test]
    fn test_torchvision_param_counts() {
        let expected = [
            (ResNetVersion::ResNet18, 11_689_512),
            (ResNetVersion::ResNet34, 21_797_672),
            (ResNetVersion::ResNet50, 25_557_032),
            (ResNetVersion::ResNet101, 44_549_160),
            (ResNetVersion::ResNet152, 60_192_808),
        ];
        for (version, params) in expected {
            let graph = ResNetConfig::from_version(version).build_graph().unwrap();
            assert_that!(graph.num_params(), equal_to(params));
        }
    }

    #[test]
    fn test_param_shapes_cover_num_params() {
        let graph = ResNetConfig::resnet50(10).build_graph().unwrap();
        let total: usize = graph
            .param_shapes()
            .iter()
            .map(|shape| shape.iter().product::<usize>())
            .sum();
        assert_eq!(total, graph.num_params());
    }

    #[test]
    fn test_convolutions() {
        let graph = ResNetConfig::resnet18(1000).build_graph().unwrap();
        let convs = graph.convolutions();

        // stem + 2 per unit + 3 projections.
        assert_eq!(convs.len(), 1 + 2 * 8 + 3);
        assert_eq!(graph.count(NodeKind::Convolution), convs.len());
        assert_eq!(graph.count(NodeKind::Normalization), convs.len());

        let stem = convs[0];
        assert_eq!(stem.in_channels, 3);
        assert_eq!(stem.out_channels, 64);
        assert_eq!(stem.kernel, [7, 7]);
        assert_eq!(stem.output_resolution, [112, 112]);

        let last = convs[convs.len() - 1];
        assert_eq!(last.out_channels, 512);
        assert_eq!(last.output_resolution, [7, 7]);

        let graph = ResNetConfig::resnet50(1000).build_graph().unwrap();
        assert_eq!(graph.convolutions().len(), 1 + 3 * 16 + 4);
    }

    #[test]
    fn test_head_accessors() {
        let graph = ResNetConfig::resnet34(7).build_graph().unwrap();
        assert_eq!(graph.num_classes(), Some(7));
        assert_eq!(graph.output_policy(), Some(OutputPolicy::CrossEntropy));
        assert_eq!(graph.stem_output(), ShapeState::new(64, 56, 56));

        let graph = ResNetConfig::resnet34(7)
            .with_include_top(false)
            .build_graph()
            .unwrap();
        assert_eq!(graph.num_classes(), None);
        assert_eq!(graph.output_policy(), None);
    }

    #[test]
    fn test_fingerprint() {
        let a = ResNetConfig::resnet18(10).build_graph().unwrap();
        let b = ResNetConfig::resnet18(10)
            .with_input_width(96)
            .with_input_height(64)
            .build_graph()
            .unwrap();
        let c = ResNetConfig::resnet18(11).build_graph().unwrap();

        // Resolution does not change the parameters; classes do.
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert!(a.fingerprint().starts_with("64x3x7x7;64;64;"));
    }

    #[test]
    fn test_display() {
        let graph = ResNetConfig::resnet18(10).build_graph().unwrap();
        let text = graph.to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "ResNet-18 (3, 224, 224) ---> (10, 1, 1)");
        assert_eq!(lines[1], "stem (3, 224, 224) ---> (64, 56, 56)");
        assert!(text.contains("layer3 basicblock x2 planes=256 stride=2 (128, 28, 28) ---> (256, 14, 14)"));
        assert!(text.contains("head (512, 7, 7) ---> (10, 1, 1)"));
        assert_eq!(
            lines.last().copied(),
            Some(format!("params: {}", graph.num_params()).as_str())
        );
    }

    #[test]
    fn test_json() {
        let graph = ResNetConfig::resnet50(10)
            .with_include_top(false)
            .build_graph()
            .unwrap();
        let json = graph.to_json().unwrap();
        let back: ResNetGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, graph);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], "ResNet50");
        assert!(value["head"].is_null());
    }
}
