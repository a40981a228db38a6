//! # Residual Activation Wrapper
//!
//! The activation applied after every conv/norm pair, and after the residual add.
//!
//! Only rectifier-family activations are offered; they keep the channel count,
//! pass positive inputs through, and match the fan-out `ReLU` conv init.
//!
//! [`ActivationConfig::PRelu`] learns one slope per channel;
//! [`ActivationConfig::with_num_channels`] sizes it to the layer it follows,
//! as [`crate::compat::normalization_wrapper::NormalizationConfig::with_num_features`]
//! does for norms.
use burn::nn::{Gelu, LeakyRelu, LeakyReluConfig, PRelu, PReluConfig, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`Activation`] Configuration.
#[derive(Config, Debug)]
#[non_exhaustive]
pub enum ActivationConfig {
    /// [`Relu`]; the `ResNet` default.
    Relu,

    /// [`LeakyRelu`] with a fixed negative slope.
    LeakyRelu(LeakyReluConfig),

    /// [`PRelu`] with learned negative slopes.
    ///
    /// The parameter count is matched to the channel count on init.
    PRelu(PReluConfig),

    /// [`Gelu`].
    Gelu,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self::Relu
    }
}

impl From<LeakyReluConfig> for ActivationConfig {
    fn from(config: LeakyReluConfig) -> Self {
        Self::LeakyRelu(config)
    }
}

impl From<PReluConfig> for ActivationConfig {
    fn from(config: PReluConfig) -> Self {
        Self::PRelu(config)
    }
}

impl ActivationConfig {
    /// Size per-channel parameters to `num_channels`.
    ///
    /// Parameter-free activations are unchanged.
    pub fn with_num_channels(
        self,
        num_channels: usize,
    ) -> Self {
        match self {
            Self::PRelu(config) => Self::PRelu(PReluConfig {
                num_parameters: num_channels,
                ..config
            }),
            other => other,
        }
    }

    /// Initialize a wrapped activation layer.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Activation<B> {
        match self {
            Self::Relu => Activation::Relu(Relu::new()),
            Self::LeakyRelu(config) => Activation::LeakyRelu(config.init()),
            Self::PRelu(config) => Activation::PRelu(config.init(device)),
            Self::Gelu => Activation::Gelu(Gelu::new()),
        }
    }
}

/// Residual activation layer.
#[derive(Module, Debug)]
#[non_exhaustive]
pub enum Activation<B: Backend> {
    /// [`Relu`] layer.
    Relu(Relu),

    /// [`LeakyRelu`] layer.
    LeakyRelu(LeakyRelu),

    /// [`PRelu`] layer.
    PRelu(PRelu<B>),

    /// [`Gelu`] layer.
    Gelu(Gelu),
}

impl<B: Backend> Activation<B> {
    /// Applies the activation to a ``[batch, channels, length]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        match self {
            Self::Relu(layer) => layer.forward(input),
            Self::LeakyRelu(layer) => layer.forward(input),
            Self::PRelu(layer) => layer.forward(input),
            Self::Gelu(layer) => layer.forward(input),
        }
    }
}
