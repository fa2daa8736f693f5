//! # Output Policy
//!
//! [`OutputPolicy`] selects what the classification head emits, and the
//! matching training loss.

use burn::nn::loss::CrossEntropyLossConfig;
use burn::prelude::{Backend, Int, Tensor};
use burn::tensor::activation::{log_softmax, softmax};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final activation / loss pairing of the classification head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputPolicy {
    /// Emit raw logits; train with cross-entropy.
    #[default]
    CrossEntropy,

    /// Emit log-probabilities; train with negative log likelihood.
    NegativeLogLikelihood,

    /// Emit probabilities; train with negative log likelihood of the probabilities.
    Probabilities,
}

impl fmt::Display for OutputPolicy {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::CrossEntropy => write!(f, "CrossEntropy(logits)"),
            Self::NegativeLogLikelihood => write!(f, "NegativeLogLikelihood(log_softmax)"),
            Self::Probabilities => write!(f, "Probabilities(softmax)"),
        }
    }
}

impl OutputPolicy {
    /// Apply the final activation to ``[batch, classes]`` logits.
    pub fn apply<B: Backend>(
        &self,
        logits: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        match self {
            Self::CrossEntropy => logits,
            Self::NegativeLogLikelihood => log_softmax(logits, 1),
            Self::Probabilities => softmax(logits, 1),
        }
    }

    /// Compute the mean loss of head `output` against class `targets`.
    ///
    /// # Arguments
    ///
    /// - `output`: ``[batch, classes]``, as produced by [`OutputPolicy::apply`].
    /// - `targets`: ``[batch]`` class indices.
    pub fn loss<B: Backend>(
        &self,
        output: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> Tensor<B, 1> {
        match self {
            Self::CrossEntropy => CrossEntropyLossConfig::new()
                .init(&output.device())
                .forward(output, targets),
            Self::NegativeLogLikelihood => nll(output, targets),
            Self::Probabilities => nll(output.clamp_min(f32::MIN_POSITIVE).log(), targets),
        }
    }
}

fn nll<B: Backend>(
    log_probs: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
) -> Tensor<B, 1> {
    let picked = log_probs.gather(1, targets.unsqueeze_dim(1));
    picked.mean().neg()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    fn assert_close<const D: usize>(
        actual: Tensor<B, D>,
        expected: Tensor<B, D>,
    ) {
        let actual = actual.into_data().to_vec::<f32>().unwrap();
        let expected = expected.into_data().to_vec::<f32>().unwrap();
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-5, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_apply() {
        let device = Default::default();
        let logits: Tensor<B, 2> = Tensor::from_data([[1.0, 2.0, 3.0]], &device);

        OutputPolicy::CrossEntropy
            .apply(logits.clone())
            .to_data()
            .assert_eq(&logits.to_data(), true);

        let probs = OutputPolicy::Probabilities.apply(logits.clone());
        assert_close(probs.clone().sum_dim(1), Tensor::ones([1, 1], &device));

        assert_close(
            OutputPolicy::NegativeLogLikelihood.apply(logits),
            probs.log(),
        );
    }

    #[test]
    fn test_losses_agree() {
        let device = Default::default();
        let logits: Tensor<B, 2> =
            Tensor::from_data([[1.0, 2.0, 0.5], [0.1, -1.0, 2.0]], &device);
        let targets: Tensor<B, 1, Int> = Tensor::from_data([1, 2], &device);

        let reference = OutputPolicy::CrossEntropy.loss(logits.clone(), targets.clone());

        for policy in [
            OutputPolicy::NegativeLogLikelihood,
            OutputPolicy::Probabilities,
        ] {
            let output = policy.apply(logits.clone());
            assert_close(policy.loss(output, targets.clone()), reference.clone());
        }
    }

    #[test]
    fn test_probabilities_loss_saturated() {
        let device = Default::default();
        let logits: Tensor<B, 2> = Tensor::from_data([[0.0, 200.0]], &device);
        let targets: Tensor<B, 1, Int> = Tensor::from_data([0], &device);

        let reference = OutputPolicy::CrossEntropy
            .loss(logits.clone(), targets.clone())
            .into_scalar();
        assert!(reference.is_finite());

        let policy = OutputPolicy::Probabilities;
        let loss = policy
            .loss(policy.apply(logits), targets)
            .into_scalar();
        assert!(loss.is_finite(), "loss = {loss}");
        assert!(loss > 0.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(OutputPolicy::default(), OutputPolicy::CrossEntropy);
        assert_eq!(
            OutputPolicy::NegativeLogLikelihood.to_string(),
            "NegativeLogLikelihood(log_softmax)"
        );
    }
}
