//! # `CNA1d` - conv/norm/activation block.
//!
//! A [`CNA1d`] module is:
//! * a [`GroupedConv1d`] layer,
//! * a [`Normalization`] layer,
//! * a [`Activation`] layer.
//!
//! With support for hooking the forward method,
//! to run code between the norm and activation layers.

use crate::compat::activation_wrapper::{Activation, ActivationConfig};
use crate::compat::grouped_conv1d::{GroupedConv1d, GroupedConv1dConfig};
use crate::compat::normalization_wrapper::{Normalization, NormalizationConfig};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::Conv1dConfig;
use burn::prelude::{Backend, Tensor};

/// Abstract policy for [`CNA1d`] Config.
///
/// Defines a [`NormalizationConfig`] and [`ActivationConfig`],
/// and can be lifted to a [`CNA1dConfig`] to match a [`Conv1dConfig`].
///
/// The abstract [`NormalizationConfig`] will be feature matched
/// with the target [`Conv1dConfig`].
#[derive(Config, Debug)]
pub struct AbstractCNA1dConfig {
    /// The [`Normalization`] config.
    pub norm: NormalizationConfig,

    /// Activation Config.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,
}

impl AbstractCNA1dConfig {
    /// Merge with a [`Conv1dConfig`] to construct a [`CNA1dConfig`].
    ///
    /// The abstract [`NormalizationConfig`] will be feature matched
    /// with the target [`Conv1dConfig`], resulting in a normalization
    /// layer sized appropriately for the input convolution.
    pub fn build_config(
        &self,
        conv: Conv1dConfig,
    ) -> CNA1dConfig {
        CNA1dConfig {
            conv,
            norm: self.norm.clone(),
            act: self.act.clone(),
        }
        .match_features()
    }
}

/// [`CNA1d`] Meta.
pub trait CNA1dMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of groups.
    fn groups(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Get the stride.
    fn stride(&self) -> usize;

    /// Get the dilation.
    fn dilation(&self) -> usize;
}

/// [`CNA1d`] Config.
///
/// Implements [`CNA1dMeta`].
#[derive(Config, Debug)]
pub struct CNA1dConfig {
    /// The conv config; may be grouped.
    pub conv: Conv1dConfig,

    /// The [`Normalization`] config.
    pub norm: NormalizationConfig,

    /// The [`Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,
}

impl CNA1dMeta for CNA1dConfig {
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

    fn dilation(&self) -> usize {
        self.conv.dilation
    }
}

impl CNA1dConfig {
    /// Initialize a [`CNA1d`].
    ///
    /// Auto-matches the norm layer input channels
    /// to the conv layer's output channels.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> CNA1d<B> {
        let cfg = self.match_features();
        CNA1d {
            conv: GroupedConv1dConfig::from(cfg.conv).init(device),
            norm: cfg.norm.init(device),
            act: cfg.act.init(device),
        }
    }

    /// Adjust the norm features, and any per-channel activation
    /// parameters, to match the conv output size.
    ///
    /// [`CNA1dConfig::init`] does this automatically.
    pub fn match_features(self) -> Self {
        let features = self.out_channels();
        let norm = self.norm.with_num_features(features);
        let act = self.act.with_num_channels(features);
        Self { norm, act, ..self }
    }
}

/// Sequenced conv/norm/activation block.
///
/// Implements [`CNA1dMeta`].
#[derive(Module, Debug)]
pub struct CNA1d<B: Backend> {
    /// Internal conv layer.
    pub conv: GroupedConv1d<B>,

    /// Internal Norm Layer.
    pub norm: Normalization<B>,

    /// Activation layer.
    pub act: Activation<B>,
}

impl<B: Backend> CNA1dMeta for CNA1d<B> {
    fn in_channels(&self) -> usize {
        self.conv.in_channels()
    }

    fn groups(&self) -> usize {
        self.conv.groups()
    }

    fn out_channels(&self) -> usize {
        self.conv.out_channels()
    }

    fn stride(&self) -> usize {
        self.conv.stride()
    }

    fn dilation(&self) -> usize {
        self.conv.dilation()
    }
}

impl<B: Backend> CNA1d<B> {
    /// Forward Pass.
    ///
    /// Applies the conv/norm/act layers in sequence:
    ///
    /// ```rust,ignore
    /// let x = self.conv.forward(input);
    /// let x = self.norm.forward(x);
    /// let x = self.act.forward(x);
    /// return x
    /// ```
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
        self.hook_forward(input, |x| x)
    }

    /// Hooked Forward Pass.
    ///
    /// Applies the hook after normalization but before activation.
    ///
    /// ```rust,ignore
    /// let x = self.conv.forward(input);
    /// let x = self.norm.forward(x);
    /// let x = hook(x);
    /// let x = self.act.forward(x);
    /// return x
    /// ```
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_length]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_length]``
    pub fn hook_forward<F>(
        &self,
        input: Tensor<B, 3>,
        hook: F,
    ) -> Tensor<B, 3>
    where
        F: FnOnce(Tensor<B, 3>) -> Tensor<B, 3>,
    {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_channels", "in_length"],
            &input,
            &["batch"],
            &[("in_channels", self.in_channels())]
        );

        let x = self.conv.forward(input);

        let [out_length] = unpack_shape_contract!(
            ["batch", "out_channels", "out_length"],
            &x,
            &["out_length"],
            &[("batch", batch), ("out_channels", self.out_channels())]
        );

        let x = self.norm.forward(x);

        let x = hook(x);

        let x = self.act.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_length"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_length", out_length)
            ]
        );

        x
    }
}
