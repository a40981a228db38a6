//! # `ResNet` Utilities
//!
//! Convolution descriptor factories and length bookkeeping shared by the blocks.

use burn::nn::conv::Conv1dConfig;
use burn::nn::{Initializer, PaddingConfig1d};

/// Fan-out Kaiming-normal std for a conv feeding a `ReLU`.
///
/// ``sqrt(2 / (channels_out * kernel_size))``; grouping does not change the fan-out.
pub fn conv_into_relu_std(
    channels_out: usize,
    kernel_size: usize,
) -> f64 {
    (2.0 / (channels_out * kernel_size) as f64).sqrt()
}

/// Fan-out Kaiming-normal initializer for a conv feeding a `ReLU`.
///
/// `Conv1dConfig::init` only passes the fan-in to its initializer,
/// so the fan-out std is resolved here into a plain normal.
pub fn conv_into_relu_initializer(
    channels_out: usize,
    kernel_size: usize,
) -> Initializer {
    Initializer::Normal {
        mean: 0.0,
        std: conv_into_relu_std(channels_out, kernel_size),
    }
}

/// Build a kernel-3 [`Conv1dConfig`].
///
/// Padding tracks dilation, so a stride-1 conv preserves the sequence length.
pub fn conv3(
    in_planes: usize,
    out_planes: usize,
    stride: usize,
    groups: usize,
    dilation: usize,
) -> Conv1dConfig {
    Conv1dConfig::new(in_planes, out_planes, 3)
        .with_stride(stride)
        .with_padding(PaddingConfig1d::Explicit(dilation))
        .with_groups(groups)
        .with_dilation(dilation)
        .with_bias(false)
        .with_initializer(conv_into_relu_initializer(out_planes, 3))
}

/// Build a kernel-1 [`Conv1dConfig`].
pub fn conv1(
    in_planes: usize,
    out_planes: usize,
    stride: usize,
) -> Conv1dConfig {
    Conv1dConfig::new(in_planes, out_planes, 1)
        .with_stride(stride)
        .with_bias(false)
        .with_initializer(conv_into_relu_initializer(out_planes, 1))
}

/// Output length of a 1d convolution or pooling window.
///
/// ``(length + 2 * padding - dilation * (kernel_size - 1) - 1) / stride + 1``
pub fn conv_output_length(
    length: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
    dilation: usize,
) -> usize {
    (length + 2 * padding - dilation * (kernel_size - 1) - 1) / stride + 1
}

/// Get the output length for a given input length.
///
/// Every strided layer in the family is a "same"-padded window,
/// so this is ``ceil(length / stride)``.
#[inline(always)]
pub fn stride_div_output_length(
    input_length: usize,
    stride: usize,
) -> usize {
    input_length.div_ceil(stride)
}
