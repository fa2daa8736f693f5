//! # Compat Code
//!
//! Shape arithmetic that mirrors what ``burn`` computes internally.

pub mod conv_shape;
