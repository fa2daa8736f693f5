#![warn(missing_docs)]
//!# resnet-forge - `ResNet` Topology Builder for `burn`
//!
//! ## Notable Components
//!
//! * [`compat`] - compat code for ``burn`` shape arithmetic.
//!   * [`compat::conv_shape`] - convolution output size prediction.
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::activation`] - activation layer abstraction wrapper.
//!   * [`layers::blocks::conv_norm`] - ``Conv2d + BatchNorm2d`` block.
//! * [`models`] - complete model families.
//!   * [`models::resnet`] - `ResNet` 18/34/50/101/152.
//!     * [`models::resnet::builder`] - the topology builder.
//!     * [`models::resnet::graph`] - the emitted layer nodes.
//!     * [`models::resnet::resnet_graph`] - the emitted network.
//!     * [`models::resnet::resnet_model`] - the materialized ``burn`` module.
//!     * [`models::resnet::weights`] - weights archive I/O.
//! * [`errors`] - the crate error type.

extern crate core;
/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod compat;
pub mod errors;
pub mod layers;
pub mod models;

pub use errors::{ResNetError, Result};
