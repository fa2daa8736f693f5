//! # Activation Layer Wrapper
use burn::nn::{Gelu, LeakyRelu, LeakyReluConfig, PRelu, PReluConfig, Relu, Sigmoid, Tanh};
use burn::prelude::{Backend, Module, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// [`Activation`] Configuration.
///
/// This is a plain value so that it can sit inside emitted layer graphs
/// and be compared for equality.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ActivationConfig {
    /// [`Relu`] activation layer.
    #[default]
    Relu,

    /// [`Gelu`] activation layer.
    Gelu,

    /// [`LeakyRelu`] activation layer.
    LeakyRelu {
        /// The negative slope.
        negative_slope: f64,
    },

    /// [`PRelu`] activation layer, with a single shared slope parameter.
    PRelu {
        /// The initial slope.
        alpha: f64,
    },

    /// [`Sigmoid`] activation layer.
    Sigmoid,

    /// [`Tanh`] activation layer.
    Tanh,
}

impl fmt::Display for ActivationConfig {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Relu => write!(f, "Relu"),
            Self::Gelu => write!(f, "Gelu"),
            Self::LeakyRelu { negative_slope } => write!(f, "LeakyRelu({negative_slope})"),
            Self::PRelu { alpha } => write!(f, "PRelu({alpha})"),
            Self::Sigmoid => write!(f, "Sigmoid"),
            Self::Tanh => write!(f, "Tanh"),
        }
    }
}

impl ActivationConfig {
    /// Number of learnable parameters in the initialized layer.
    pub fn num_params(&self) -> usize {
        match self {
            Self::PRelu { .. } => 1,
            _ => 0,
        }
    }

    /// Initialize a wrapped activation layer.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Activation<B> {
        match self {
            Self::Relu => Activation::Relu(Relu::new()),
            Self::Gelu => Activation::Gelu(Gelu::new()),
            Self::LeakyRelu { negative_slope } => Activation::LeakyRelu(
                LeakyReluConfig::new()
                    .with_negative_slope(*negative_slope)
                    .init(),
            ),
            Self::PRelu { alpha } => Activation::PRelu(
                PReluConfig::new()
                    .with_num_parameters(1)
                    .with_alpha(*alpha)
                    .init(device),
            ),
            Self::Sigmoid => Activation::Sigmoid(Sigmoid::new()),
            Self::Tanh => Activation::Tanh(Tanh::new()),
        }
    }
}

/// Activation Layer Wrapper.
///
/// Provides support for several in-built `burn::nn` activations.
#[derive(Module, Debug)]
#[non_exhaustive]
pub enum Activation<B: Backend> {
    /// [`Relu`] activation layer.
    Relu(Relu),

    /// [`Gelu`] activation layer.
    Gelu(Gelu),

    /// [`LeakyRelu`] activation layer.
    LeakyRelu(LeakyRelu),

    /// [`PRelu`] activation layer.
    PRelu(PRelu<B>),

    /// [`Sigmoid`] activation layer.
    Sigmoid(Sigmoid),

    /// [`Tanh`] activation layer.
    Tanh(Tanh),
}

impl<B: Backend> Activation<B> {
    /// Forward pass.
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match self {
            Activation::Relu(layer) => layer.forward(input),
            Activation::Gelu(layer) => layer.forward(input),
            Activation::LeakyRelu(layer) => layer.forward(input),
            Activation::PRelu(layer) => layer.forward(input),
            Activation::Sigmoid(layer) => layer.forward(input),
            Activation::Tanh(layer) => layer.forward(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::activation::{gelu, relu, sigmoid, tanh};

    type TestBackend = NdArray<f32>;

    fn make_input<B: Backend>(device: &B::Device) -> Tensor<B, 2> {
        Tensor::from_data([[-1.0, -0.5, 0.0], [1.0, 0.5, 0.0]], device)
    }

    fn expect_tensor<B: Backend, const D: usize>(
        actual: Tensor<B, D>,
        expected: Tensor<B, D>,
    ) {
        actual.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_default_is_relu() {
        assert_eq!(ActivationConfig::default(), ActivationConfig::Relu);
    }

    #[test]
    fn test_stateless_activations() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        expect_tensor(
            ActivationConfig::Relu
                .init::<TestBackend>(&device)
                .forward(input.clone()),
            relu(input.clone()),
        );
        expect_tensor(
            ActivationConfig::Gelu
                .init::<TestBackend>(&device)
                .forward(input.clone()),
            gelu(input.clone()),
        );
        expect_tensor(
            ActivationConfig::Sigmoid
                .init::<TestBackend>(&device)
                .forward(input.clone()),
            sigmoid(input.clone()),
        );
        expect_tensor(
            ActivationConfig::Tanh
                .init::<TestBackend>(&device)
                .forward(input.clone()),
            tanh(input),
        );
    }

    #[test]
    fn test_leaky_relu() {
        let device = Default::default();
        let input = make_input::<TestBackend>(&device);

        let act = ActivationConfig::LeakyRelu {
            negative_slope: 0.5,
        }
        .init::<TestBackend>(&device);

        expect_tensor(
            act.forward(input),
            Tensor::from_data([[-0.5, -0.25, 0.0], [1.0, 0.5, 0.0]], &device),
        );
    }

    #[test]
    fn test_prelu_params() {
        let device = Default::default();
        let config = ActivationConfig::PRelu { alpha: 0.25 };
        assert_eq!(config.num_params(), 1);
        assert_eq!(ActivationConfig::Relu.num_params(), 0);

        let act = config.init::<TestBackend>(&device);
        assert_eq!(act.num_params(), 1);

        let input = make_input::<TestBackend>(&device);
        expect_tensor(
            act.forward(input),
            Tensor::from_data([[-0.25, -0.125, 0.0], [1.0, 0.5, 0.0]], &device),
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ActivationConfig::Relu.to_string(), "Relu");
        assert_eq!(
            ActivationConfig::LeakyRelu {
                negative_slope: 0.1
            }
            .to_string(),
            "LeakyRelu(0.1)"
        );
    }
}
