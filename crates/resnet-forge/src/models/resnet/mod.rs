//! # `ResNet`
//!
//! Topology emission for `ResNet-18/34/50/101/152`, and materialization of
//! the emitted graph as a ``burn`` module.
//!
//! ```rust,no_run
//! use burn::backend::NdArray;
//! use resnet_forge::models::resnet::{ResNet, ResNetConfig};
//!
//! let graph = ResNetConfig::resnet50(1000).build_graph()?;
//! println!("{graph}");
//!
//! let model: ResNet<NdArray> = ResNetConfig::resnet18(10).init(&Default::default())?;
//! # Ok::<(), resnet_forge::ResNetError>(())
//! ```

pub mod basic_block;
pub mod bottleneck;
pub mod builder;
pub mod conv_block;
pub mod graph;
pub mod layer_block;
pub mod output;
pub mod prefabs;
pub mod residual_block;
pub mod resnet_graph;
pub mod resnet_model;
pub mod shape;
pub mod weights;

pub use builder::{CONV_INTO_RELU_INITIALIZER, ResNetBuilder, ResNetConfig};
pub use graph::{LayerNode, NodeKind};
pub use output::OutputPolicy;
pub use prefabs::{ResNetVersion, StageConfig};
pub use resnet_graph::ResNetGraph;
pub use resnet_model::ResNet;
