//! # Normalization Wrapper
//!
//! Provides support for built-in ``burn::nn::norm`` norm layers
//! which normalize over the channel dimension of ``[batch, channels, length]`` inputs:
//! * [`Batch`] - [`BatchNorm`]
//! * [`Group`] - [`GroupNorm`]
//! * [`Instance`] - [`InstanceNorm`]
//!
//! ## [`LayerNorm`](burn::nn::LayerNorm) is not supported.
//!
//! It normalizes the trailing (length) dimension, not channels.
//!
//! The enum is non-exhaustive, to prepare for future additions.

use burn::module::Param;
use burn::nn::{
    BatchNorm, BatchNormConfig, GroupNorm, GroupNormConfig, InstanceNorm, InstanceNormConfig,
};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`Normalization`] Configuration.
///
/// The feature size carried by the inner config is a placeholder
/// until [`NormalizationConfig::with_num_features`] sizes it to a layer.
#[derive(Config, Debug)]
#[non_exhaustive]
pub enum NormalizationConfig {
    /// [`BatchNorm`] Configuration.
    Batch(BatchNormConfig),

    /// [`GroupNorm`] Configuration.
    Group(GroupNormConfig),

    /// [`InstanceNorm`] Configuration.
    Instance(InstanceNormConfig),
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self::Batch(BatchNormConfig::new(0))
    }
}

impl From<BatchNormConfig> for NormalizationConfig {
    fn from(config: BatchNormConfig) -> Self {
        Self::Batch(config)
    }
}

impl From<GroupNormConfig> for NormalizationConfig {
    fn from(config: GroupNormConfig) -> Self {
        Self::Group(config)
    }
}

impl From<InstanceNormConfig> for NormalizationConfig {
    fn from(config: InstanceNormConfig) -> Self {
        Self::Instance(config)
    }
}

impl NormalizationConfig {
    /// Initialize a [`Normalization`] layer.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Normalization<B> {
        match self {
            NormalizationConfig::Batch(config) => config.init(device).into(),
            NormalizationConfig::Group(config) => config.init(device).into(),
            NormalizationConfig::Instance(config) => config.init(device).into(),
        }
    }

    /// Adjust a norm config to the feature size.
    pub fn with_num_features(
        self,
        num_features: usize,
    ) -> Self {
        match self {
            NormalizationConfig::Batch(config) => BatchNormConfig {
                num_features,
                ..config
            }
            .into(),
            NormalizationConfig::Group(config) => GroupNormConfig {
                num_channels: num_features,
                ..config
            }
            .into(),
            NormalizationConfig::Instance(config) => InstanceNormConfig {
                num_channels: num_features,
                ..config
            }
            .into(),
        }
    }

    /// Get the number of features.
    pub fn num_features(&self) -> usize {
        match self {
            NormalizationConfig::Batch(config) => config.num_features,
            NormalizationConfig::Group(config) => config.num_channels,
            NormalizationConfig::Instance(config) => config.num_channels,
        }
    }
}

/// Normalization Layer Wrapper
///
/// Provides support for built-in ``burn::nn::norm`` norm layers:
/// * [`Batch`] - [`BatchNorm`]
/// * [`Group`] - [`GroupNorm`]
/// * [`Instance`] - [`InstanceNorm`]
///
/// The enum is non-exhaustive, to prepare for future additions.
#[derive(Module, Debug)]
#[non_exhaustive]
pub enum Normalization<B: Backend> {
    /// [`BatchNorm`] layer; restricted to `BatchNorm`<1>.
    Batch(BatchNorm<B, 1>),

    /// [`GroupNorm`] layer.
    Group(GroupNorm<B>),

    /// [`InstanceNorm`] layer.
    Instance(InstanceNorm<B>),
}

impl<B: Backend> From<BatchNorm<B, 1>> for Normalization<B> {
    fn from(layer: BatchNorm<B, 1>) -> Self {
        Self::Batch(layer)
    }
}

impl<B: Backend> From<GroupNorm<B>> for Normalization<B> {
    fn from(layer: GroupNorm<B>) -> Self {
        Self::Group(layer)
    }
}

impl<B: Backend> From<InstanceNorm<B>> for Normalization<B> {
    fn from(layer: InstanceNorm<B>) -> Self {
        Self::Instance(layer)
    }
}

fn zero_param<B: Backend>(param: Param<Tensor<B, 1>>) -> Param<Tensor<B, 1>> {
    param.map(|tensor| tensor.zeros_like())
}

impl<B: Backend> Normalization<B> {
    /// Applies normalization to a ``[batch, channels, length]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        match self {
            Normalization::Batch(norm) => norm.forward(input),
            Normalization::Group(norm) => norm.forward(input),
            Normalization::Instance(norm) => norm.forward(input),
        }
    }

    /// The affine scale parameter, if the layer has one.
    pub fn weight(&self) -> Option<Tensor<B, 1>> {
        match self {
            Normalization::Batch(norm) => Some(norm.gamma.val()),
            Normalization::Group(norm) => norm.gamma.as_ref().map(|p| p.val()),
            Normalization::Instance(norm) => norm.gamma.as_ref().map(|p| p.val()),
        }
    }

    /// The affine shift parameter, if the layer has one.
    pub fn bias(&self) -> Option<Tensor<B, 1>> {
        match self {
            Normalization::Batch(norm) => Some(norm.beta.val()),
            Normalization::Group(norm) => norm.beta.as_ref().map(|p| p.val()),
            Normalization::Instance(norm) => norm.beta.as_ref().map(|p| p.val()),
        }
    }

    /// Zero initialize the affine scale.
    ///
    /// Layers without an affine transform are left unchanged.
    pub fn zero_init_weight(self) -> Self {
        match self {
            Normalization::Batch(mut norm) => {
                norm.gamma = zero_param(norm.gamma);
                norm.into()
            }
            Normalization::Group(mut norm) => {
                norm.gamma = norm.gamma.map(zero_param);
                norm.into()
            }
            Normalization::Instance(mut norm) => {
                norm.gamma = norm.gamma.map(zero_param);
                norm.into()
            }
        }
    }
}
