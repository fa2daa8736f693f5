//! # Convolution Shape Utilities
//!
//! Utilities for computing the output shape of convolution and pooling windows.
//!
//! All predictions assume a dilation of 1, which is all `ResNet` uses.

use crate::errors::{ResNetError, Result};

/// Predict the output size of a 1D convolution operation.
///
/// ```text
/// out_size = floor( (in_size - kernel_size + 2*padding) / stride ) + 1
/// ```
///
/// # Reference
///
/// - [conv_arithmetic diagram](https://github.com/vdumoulin/conv_arithmetic/blob/master/README.md)
///   visual explanations of these convolution parameters.
///
/// # Arguments
///
/// - `input_size`: The input dimension size.
/// - `kernel_size`: The kernel size.
/// - `stride`: The stride of the convolution.
/// - `padding`: The padding of the convolution, added evenly to both sides of the input.
///
/// # Returns
///
/// An `Option<usize>` representing the output size; or `None` when there is
/// no legal output (a zero argument, or a kernel wider than the padded input).
pub fn maybe_conv_out_size(
    input_size: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
) -> Option<usize> {
    if input_size == 0 || kernel_size == 0 || stride == 0 {
        return None;
    }

    let effective_size = padding
        .checked_mul(2)
        .and_then(|pad| pad.checked_add(input_size))?;
    if effective_size < kernel_size {
        return None;
    }
    Some((effective_size - kernel_size) / stride + 1)
}

/// Predict the output size of a 1D convolution operation.
///
/// This is the [`Result`] variant of [`maybe_conv_out_size`].
///
/// # Errors
///
/// [`ResNetError::ShapeUnderflow`] if there is no legal output size.
pub fn try_conv_out_size(
    input_size: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
) -> Result<usize> {
    maybe_conv_out_size(input_size, kernel_size, stride, padding).ok_or(
        ResNetError::ShapeUnderflow {
            size: input_size,
            kernel: kernel_size,
            stride,
            padding,
        },
    )
}

/// Predict the output shape of a D convolution operation.
///
/// This is the generalization of [`try_conv_out_size`] to D dimensions;
/// each dimension is computed independently.
///
/// # Errors
///
/// [`ResNetError::ShapeUnderflow`] for the first dimension with no legal output size.
pub fn try_conv_out_shape<const D: usize>(
    input_shape: [usize; D],
    kernel_shape: [usize; D],
    stride: [usize; D],
    padding: [usize; D],
) -> Result<[usize; D]> {
    let mut output_shape = input_shape;
    for i in 0..D {
        output_shape[i] = try_conv_out_size(input_shape[i], kernel_shape[i], stride[i], padding[i])?;
    }
    Ok(output_shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::PaddingConfig2d;
    use burn::nn::conv::Conv2dConfig;
    use burn::prelude::Tensor;

    #[test]
    fn test_conv_out_size() {
        pub fn conv_out_size_reference(
            input_size: usize,
            kernel_size: usize,
            stride: usize,
            padding: usize,
        ) -> Option<usize> {
            let input_size = input_size as f64;
            let kernel_size = kernel_size as f64;
            let stride = stride as f64;
            let padding = padding as f64;

            let x = (((input_size - kernel_size + 2.0 * padding) / stride) + 1.0).floor();
            if x < 1.0 { None } else { Some(x as usize) }
        }

        for input_size in 1..12 {
            for stride in 1..4 {
                for kernel_size in 1..8 {
                    for padding in 0..4 {
                        assert_eq!(
                            maybe_conv_out_size(input_size, kernel_size, stride, padding),
                            conv_out_size_reference(input_size, kernel_size, stride, padding),
                            "size={input_size} kernel={kernel_size} stride={stride} padding={padding}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_resnet_stem_sizes() {
        assert_eq!(try_conv_out_size(224, 7, 2, 3).unwrap(), 112);
        assert_eq!(try_conv_out_size(112, 3, 2, 1).unwrap(), 56);
        assert_eq!(try_conv_out_size(56, 1, 2, 0).unwrap(), 28);
        assert_eq!(try_conv_out_size(7, 3, 1, 1).unwrap(), 7);
    }

    #[test]
    fn test_underflow() {
        assert!(maybe_conv_out_size(0, 3, 1, 1).is_none());
        assert!(maybe_conv_out_size(4, 0, 1, 1).is_none());
        assert!(maybe_conv_out_size(4, 3, 0, 1).is_none());

        let err = try_conv_out_size(2, 7, 2, 1).unwrap_err();
        assert!(matches!(
            err,
            ResNetError::ShapeUnderflow {
                size: 2,
                kernel: 7,
                stride: 2,
                padding: 1
            }
        ));
    }

    #[test]
    fn test_padding_overflow() {
        assert!(maybe_conv_out_size(4, 3, 1, usize::MAX).is_none());
        assert!(maybe_conv_out_size(usize::MAX, 3, 1, 1).is_none());

        let err = try_conv_out_size(4, 3, 1, usize::MAX / 2 + 1).unwrap_err();
        assert!(matches!(err, ResNetError::ShapeUnderflow { size: 4, .. }));
    }

    #[test]
    fn test_try_conv_out_shape() {
        assert_eq!(
            try_conv_out_shape([224, 160], [7, 7], [2, 2], [3, 3]).unwrap(),
            [112, 80]
        );
        assert_eq!(
            try_conv_out_shape([9, 9], [3, 1], [1, 2], [0, 0]).unwrap(),
            [7, 5]
        );
        assert!(try_conv_out_shape([9, 1], [3, 3], [1, 1], [1, 0]).is_err());
    }

    #[test]
    fn test_matches_burn_conv2d() {
        type B = NdArray<f32>;
        let device = Default::default();

        for (size, kernel, stride, padding) in [(13, 3, 2, 1), (16, 7, 2, 3), (9, 1, 2, 0)] {
            let conv = Conv2dConfig::new([1, 1], [kernel, kernel])
                .with_stride([stride, stride])
                .with_padding(PaddingConfig2d::Explicit(padding, padding))
                .init::<B>(&device);

            let input: Tensor<B, 4> = Tensor::ones([1, 1, size, size], &device);
            let [_, _, h, w] = conv.forward(input).dims();

            let expected = try_conv_out_size(size, kernel, stride, padding).unwrap();
            assert_eq!([h, w], [expected, expected]);
        }
    }
}
