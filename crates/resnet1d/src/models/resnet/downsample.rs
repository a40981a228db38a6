//! # The `ResNet` Downsample (Shortcut) Implementation.
//!
//! The shortcut reshapes the identity path of a residual block
//! to the block's output shape: a kernel-1 conv (carrying the block stride)
//! followed by normalization, with no activation.

use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::conv_norm::{ConvNorm1d, ConvNorm1dConfig, ConvNorm1dMeta};
use crate::models::resnet::util::{conv1, stride_div_output_length};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Shortcut insertion policy.
///
/// A block needs a downsample path iff it changes the sequence length
/// or the channel count.
pub fn needs_downsample(
    in_planes: usize,
    out_planes: usize,
    stride: usize,
) -> bool {
    stride != 1 || in_planes != out_planes
}

/// [`ResNetDownsample`] Meta trait.
pub trait ResNetDownsampleMeta {
    /// The size of the in channels dimension.
    fn in_channels(&self) -> usize;

    /// The size of the out channels dimension.
    fn out_channels(&self) -> usize;

    /// The stride of the downsample layer.
    fn stride(&self) -> usize;

    /// Get the output length for a given input length.
    fn output_length(
        &self,
        input_length: usize,
    ) -> usize {
        stride_div_output_length(input_length, self.stride())
    }
}

/// [`ResNetDownsample`] configuration.
///
/// Implements [`ResNetDownsampleMeta`].
#[derive(Config, Debug)]
pub struct ResNetDownsampleConfig {
    /// The size of the in channels dimension.
    pub in_channels: usize,

    /// The size of the out channels dimension.
    pub out_channels: usize,

    /// The stride of the downsample layer.
    #[config(default = 1)]
    pub stride: usize,

    /// The [`crate::compat::normalization_wrapper::Normalization`] config.
    ///
    /// The feature size will be auto-matched.
    #[config(default = "NormalizationConfig::default()")]
    pub norm: NormalizationConfig,
}

impl ResNetDownsampleMeta for ResNetDownsampleConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl ResNetDownsampleConfig {
    /// Initialize a [`ResNetDownsample`] `Module`.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResNetDownsample<B> {
        let config = ConvNorm1dConfig::new(conv1(self.in_channels, self.out_channels, self.stride))
            .with_norm(self.norm.clone());

        ResNetDownsample {
            conv_norm: config.init(device),
        }
    }
}

/// Downsample layer applies a kernel-1 conv to reduce the length and adjust the number of channels.
///
/// Maps ``[batch, in_channels, in_length]`` to
/// ``[batch, out_channels, out_length=ceil(in_length/stride)]`` tensors.
#[derive(Module, Debug)]
pub struct ResNetDownsample<B: Backend> {
    /// Embedded conv/norm.
    pub conv_norm: ConvNorm1d<B>,
}

impl<B: Backend> ResNetDownsampleMeta for ResNetDownsample<B> {
    fn in_channels(&self) -> usize {
        self.conv_norm.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.conv_norm.out_channels()
    }

    fn stride(&self) -> usize {
        self.conv_norm.stride()
    }
}

impl<B: Backend> ResNetDownsample<B> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: a ``[batch, in_channels, in_length]`` tensor.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_channels, out_length]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        let [batch, in_length] = unpack_shape_contract!(
            ["batch", "in_channels", "in_length"],
            &input,
            &["batch", "in_length"],
            &[("in_channels", self.in_channels())]
        );

        let out = self.conv_norm.forward(input);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_length"],
            &out,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_length", self.output_length(in_length))
            ]
        );

        out
    }
}
