//! # `ConvNorm1d` Module
//!
//! A [`ConvNorm1d`] module is a [`Conv1d`] layer followed by a [`Normalization`] layer.

use crate::compat::normalization_wrapper::{Normalization, NormalizationConfig};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::prelude::{Backend, Tensor};

/// [`ConvNorm1d`] Meta.
pub trait ConvNorm1dMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of groups.
    fn groups(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Get the stride.
    fn stride(&self) -> usize;
}

/// [`ConvNorm1d`] Config.
#[derive(Config, Debug)]
pub struct ConvNorm1dConfig {
    /// The [`Conv1d`] config.
    pub conv: Conv1dConfig,

    /// The [`Normalization`] config.
    ///
    /// Feature matched to the conv output on init.
    #[config(default = "NormalizationConfig::default()")]
    pub norm: NormalizationConfig,
}

impl ConvNorm1dMeta for ConvNorm1dConfig {
    fn in_channels(&self) -> usize {
        self.conv.channels_in
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.channels_out
    }

    fn stride(&self) -> usize {
        self.conv.stride
    }
}

impl From<Conv1dConfig> for ConvNorm1dConfig {
    fn from(conv: Conv1dConfig) -> Self {
        Self::new(conv)
    }
}

impl ConvNorm1dConfig {
    /// Initialize a [`ConvNorm1d`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ConvNorm1d<B> {
        let features = self.out_channels();
        ConvNorm1d {
            conv: self.conv.init(device),
            norm: self.norm.with_num_features(features).init(device),
        }
    }
}

/// [`Conv1d`] and [`Normalization`] layer.
#[derive(Module, Debug)]
pub struct ConvNorm1d<B: Backend> {
    /// Internal Conv1d layer.
    pub conv: Conv1d<B>,

    /// Internal Norm Layer.
    pub norm: Normalization<B>,
}

impl<B: Backend> ConvNorm1dMeta for ConvNorm1d<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[1] * self.groups()
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn stride(&self) -> usize {
        self.conv.stride
    }
}

impl<B: Backend> ConvNorm1d<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_length]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_length]``
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_channels", "in_length"],
            &input,
            &["batch"],
            &[("in_channels", self.in_channels())]
        );
        let x = self.conv.forward(input);

        let x = self.norm.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_length"],
            &x,
            &[("batch", batch), ("out_channels", self.out_channels())]
        );

        x
    }
}
