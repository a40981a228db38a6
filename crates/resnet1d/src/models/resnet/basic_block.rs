//! # Basic Block for `ResNet`
//!
//! [`BasicBlock`] is the two-convolution `ResNet` residual unit.
//!
//! [`BasicBlockMeta`] defines a common meta API for [`BasicBlock`]
//! and [`BasicBlockConfig`].
//!
//! [`BasicBlockConfig`] implements [`Config`], and provides
//! [`BasicBlockConfig::try_init`] to initialize a [`BasicBlock`].
//!
//! [`BasicBlock`] implements [`Module`], and provides
//! [`BasicBlock::forward`].

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{AbstractCNA1dConfig, CNA1d, CNA1dConfig, CNA1dMeta};
use crate::models::resnet::downsample::{
    ResNetDownsample, ResNetDownsampleConfig, ResNetDownsampleMeta, needs_downsample,
};
use crate::models::resnet::error::ResNetError;
use crate::models::resnet::util::{conv3, stride_div_output_length};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};

/// The channel expansion of a [`BasicBlock`].
pub const BASIC_BLOCK_EXPANSION: usize = 1;

/// [`BasicBlock`] Meta trait.
pub trait BasicBlockMeta {
    /// The size of the in channels dimension.
    fn in_planes(&self) -> usize;

    /// Configures the size of `out_planes`.
    fn planes(&self) -> usize;

    /// The size of the out channels dimension.
    ///
    /// ``out_planes = planes * expansion``
    fn out_planes(&self) -> usize {
        self.planes() * BASIC_BLOCK_EXPANSION
    }

    /// The stride of the first convolution.
    ///
    /// Affects downsample behavior.
    fn stride(&self) -> usize;

    /// Dilation rate for conv layers.
    fn dilation(&self) -> usize;

    /// Get the output length for a given input length.
    fn output_length(
        &self,
        input_length: usize,
    ) -> usize {
        stride_div_output_length(input_length, self.stride())
    }
}

/// [`BasicBlock`] Config.
///
/// Implements [`BasicBlockMeta`].
#[derive(Config, Debug)]
pub struct BasicBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The output channels of both convolutions.
    pub planes: usize,

    /// The stride of the first conv and the downsample layer.
    #[config(default = 1)]
    pub stride: usize,

    /// Conv groups; must be 1.
    #[config(default = 1)]
    pub groups: usize,

    /// Base width; must be 64.
    #[config(default = 64)]
    pub base_width: usize,

    /// Dilation rate; must be 1.
    #[config(default = 1)]
    pub dilation: usize,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    ///
    /// The feature size of this config will be replaced
    /// with the appropriate feature size for the input layer.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl BasicBlockMeta for BasicBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn planes(&self) -> usize {
        self.planes
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn dilation(&self) -> usize {
        self.dilation
    }
}

impl BasicBlockConfig {
    /// Check the block options.
    ///
    /// # Errors
    ///
    /// - [`ResNetError::BasicBlockShape`] unless ``groups == 1 && base_width == 64``.
    /// - [`ResNetError::BasicBlockDilation`] if ``dilation > 1``.
    /// - [`ResNetError::ZeroStride`] if ``stride == 0``.
    pub fn try_validate(&self) -> Result<(), ResNetError> {
        if self.groups != 1 || self.base_width != 64 {
            return Err(ResNetError::BasicBlockShape {
                groups: self.groups,
                base_width: self.base_width,
            });
        }
        if self.dilation > 1 {
            return Err(ResNetError::BasicBlockDilation {
                dilation: self.dilation,
            });
        }
        if self.stride == 0 {
            return Err(ResNetError::ZeroStride);
        }
        Ok(())
    }

    /// Initialize a [`BasicBlock`].
    ///
    /// # Errors
    ///
    /// See [`BasicBlockConfig::try_validate`].
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Result<BasicBlock<B>, ResNetError> {
        self.try_validate()?;

        let in_planes = self.in_planes();
        let out_planes = self.out_planes();
        let stride = self.stride();

        let downsample = if needs_downsample(in_planes, out_planes, stride) {
            Some(
                ResNetDownsampleConfig::new(in_planes, out_planes)
                    .with_stride(stride)
                    .with_norm(self.normalization.clone()),
            )
        } else {
            None
        };

        let cna_builder = AbstractCNA1dConfig {
            norm: self.normalization.clone(),
            act: self.activation.clone(),
        };

        let cna1: CNA1dConfig =
            cna_builder.build_config(conv3(in_planes, self.planes, stride, 1, 1));
        let cna2: CNA1dConfig =
            cna_builder.build_config(conv3(self.planes, out_planes, 1, 1, 1));

        Ok(BasicBlock {
            downsample: downsample.map(|cfg| cfg.init(device)),
            cna1: cna1.init(device),
            cna2: cna2.init(device),
        })
    }
}

/// Basic Block for `ResNet`.
///
/// Implements [`BasicBlockMeta`].
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    /// Optional `DownSample` layer; for the residual connection.
    pub downsample: Option<ResNetDownsample<B>>,

    /// First Conv/Norm/Act Block.
    pub cna1: CNA1d<B>,

    /// Second Conv/Norm/Act Block.
    pub cna2: CNA1d<B>,
}

impl<B: Backend> BasicBlockMeta for BasicBlock<B> {
    fn in_planes(&self) -> usize {
        self.cna1.in_channels()
    }

    fn planes(&self) -> usize {
        self.cna1.out_channels()
    }

    fn out_planes(&self) -> usize {
        self.cna2.out_channels()
    }

    fn stride(&self) -> usize {
        self.cna1.stride()
    }

    fn dilation(&self) -> usize {
        self.cna1.dilation()
    }
}

impl<B: Backend> BasicBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_length]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes=planes, out_length=ceil(in_length/stride)]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        let [batch, in_length] = unpack_shape_contract!(
            ["batch", "in_planes", "in_length"],
            &input,
            &["batch", "in_length"],
            &[("in_planes", self.in_planes())]
        );
        let out_length = self.output_length(in_length);

        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };

        let x = self.cna1.forward(input);
        let x = self.cna2.hook_forward(x, |x| x + identity);

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_length"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_length", out_length)
            ]
        );

        x
    }

    /// Zero the affine scale of the terminal norm layer.
    ///
    /// The residual branch then contributes only the norm shift,
    /// and a block without a downsample starts as ``act(identity)``.
    pub fn zero_init_residual(self) -> Self {
        let mut cna2 = self.cna2;
        cna2.norm = cna2.norm.zero_init_weight();
        Self { cna2, ..self }
    }

    /// Does this block carry a downsample on the identity path?
    pub fn has_downsample(&self) -> bool {
        self.downsample.is_some()
    }

    /// The stride of the downsample path, if any.
    pub fn downsample_stride(&self) -> Option<usize> {
        self.downsample.as_ref().map(|d| d.stride())
    }
}
