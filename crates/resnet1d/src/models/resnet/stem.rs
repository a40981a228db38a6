//! # Input Stem
//!
//! The `ResNet` input stem:
//! ```text,ignore
//!   conv(k=7, s=2, p=3) -> norm -> act -> maxpool(k=3, s=2, p=1)
//! ```
//!
//! The stem activation and the pool are exposed separately,
//! as the partial forward pass can stop between them.

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{CNA1d, CNA1dConfig, CNA1dMeta};
use crate::models::resnet::util::{conv_into_relu_initializer, stride_div_output_length};
use burn::module::Module;
use burn::nn::PaddingConfig1d;
use burn::nn::conv::Conv1dConfig;
use burn::nn::pool::{MaxPool1d, MaxPool1dConfig};
use burn::prelude::{Backend, Config, Tensor};

/// Default stem width; the input planes of the first stage.
pub const STEM_WIDTH: usize = 64;

/// [`ResNetStem`] Config.
#[derive(Config, Debug)]
pub struct ResNetStemConfig {
    /// Input signal channels.
    pub in_channels: usize,

    /// Stem output channels.
    #[config(default = "STEM_WIDTH")]
    pub out_channels: usize,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl ResNetStemConfig {
    /// The conv/norm/act config of the stem.
    pub fn cna_config(&self) -> CNA1dConfig {
        CNA1dConfig::new(
            Conv1dConfig::new(self.in_channels, self.out_channels, 7)
                .with_stride(2)
                .with_padding(PaddingConfig1d::Explicit(3))
                .with_bias(false)
                .with_initializer(conv_into_relu_initializer(self.out_channels, 7)),
            self.normalization.clone(),
        )
        .with_act(self.activation.clone())
    }

    /// The pool config of the stem.
    pub fn pool_config(&self) -> MaxPool1dConfig {
        MaxPool1dConfig::new(3)
            .with_stride(2)
            .with_padding(PaddingConfig1d::Explicit(1))
    }

    /// Initialize a [`ResNetStem`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResNetStem<B> {
        ResNetStem {
            cna: self.cna_config().init(device),
            pool: self.pool_config().init(),
        }
    }
}

/// `ResNet` input stem.
#[derive(Module, Debug)]
pub struct ResNetStem<B: Backend> {
    /// The stem conv/norm/act.
    pub cna: CNA1d<B>,

    /// The stem pooling.
    pub pool: MaxPool1d,
}

impl<B: Backend> ResNetStem<B> {
    /// Input signal channels.
    pub fn in_channels(&self) -> usize {
        self.cna.in_channels()
    }

    /// Stem output channels.
    pub fn out_channels(&self) -> usize {
        self.cna.out_channels()
    }

    /// Length after the stem activation.
    pub fn activation_length(
        &self,
        input_length: usize,
    ) -> usize {
        stride_div_output_length(input_length, 2)
    }

    /// Length after the stem pool.
    pub fn output_length(
        &self,
        input_length: usize,
    ) -> usize {
        stride_div_output_length(self.activation_length(input_length), 2)
    }

    /// Apply conv/norm/act; stops before the pool.
    pub fn forward_activation(
        &self,
        input: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        self.cna.forward(input)
    }

    /// Apply the pool to the stem activation.
    pub fn forward_pool(
        &self,
        input: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        self.pool.forward(input)
    }

    /// Full stem forward pass.
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        self.forward_pool(self.forward_activation(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    #[test]
    fn test_stem_config() {
        let config = ResNetStemConfig::new(3);
        let cna = config.cna_config();
        assert_eq!(cna.in_channels(), 3);
        assert_eq!(cna.out_channels(), STEM_WIDTH);
        assert_eq!(cna.stride(), 2);
        assert_eq!(cna.conv.kernel_size, 7);
        assert!(!cna.conv.bias);

        let pool = config.pool_config();
        assert_eq!(pool.kernel_size, 3);
        assert_eq!(pool.stride, 2);
    }

    #[test]
    fn test_stem_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let stem: ResNetStem<B> = ResNetStemConfig::new(2).init(&device);
        assert_eq!(stem.in_channels(), 2);
        assert_eq!(stem.out_channels(), 64);

        for length in [7, 32, 33, 100] {
            let input = Tensor::random([2, 2, length], Distribution::Default, &device);

            let act = stem.forward_activation(input.clone());
            assert_eq!(act.dims(), [2, 64, stem.activation_length(length)]);

            let out = stem.forward(input);
            assert_eq!(out.dims(), [2, 64, stem.output_length(length)]);

            let expected = stem.forward_pool(act);
            out.to_data().assert_eq(&expected.to_data(), true);
        }
        assert_eq!(stem.output_length(100), 25);
        assert_eq!(stem.output_length(7), 2);
    }
}
