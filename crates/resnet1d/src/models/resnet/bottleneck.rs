//! # [`BottleneckBlock`] Block for `ResNet`
//!
//! [`BottleneckBlock`] is the reduce/process/expand form of the `ResNet` residual unit.
//!
//! The stride sits on the middle (kernel-3) convolution, rather than the first
//! kernel-1 reduction; the "v1.5" placement.
//!
//! [`BottleneckBlockMeta`] defines a common meta-API for [`BottleneckBlock`]
//! and [`BottleneckBlockConfig`].
//!
//! [`BottleneckBlockConfig`] implements [`Config`] and provides
//! [`BottleneckBlockConfig::try_init`] to initialize a [`BottleneckBlock`].
//!
//! [`BottleneckBlock`] implements [`Module`] and provides
//! [`BottleneckBlock::forward`].

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{AbstractCNA1dConfig, CNA1d, CNA1dConfig, CNA1dMeta};
use crate::models::resnet::downsample::{
    ResNetDownsample, ResNetDownsampleConfig, ResNetDownsampleMeta, needs_downsample,
};
use crate::models::resnet::error::ResNetError;
use crate::models::resnet::util::{conv1, conv3, stride_div_output_length};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};

/// The channel expansion of a [`BottleneckBlock`].
pub const BOTTLENECK_EXPANSION: usize = 4;

/// Grouped bottleneck width.
///
/// ``floor(planes * base_width / 64) * groups``
pub fn bottleneck_width(
    planes: usize,
    base_width: usize,
    groups: usize,
) -> usize {
    (planes * base_width / 64) * groups
}

/// [`BottleneckBlock`] Meta trait.
pub trait BottleneckBlockMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// Configures the size of `out_planes`.
    fn planes(&self) -> usize;

    /// The number of output feature planes.
    ///
    /// ``out_planes = planes * expansion``
    fn out_planes(&self) -> usize {
        self.planes() * BOTTLENECK_EXPANSION
    }

    /// Groups of the middle conv.
    fn groups(&self) -> usize;

    /// Control factor for `width()`.
    fn base_width(&self) -> usize;

    /// Internal width of the bottleneck.
    fn width(&self) -> usize {
        bottleneck_width(self.planes(), self.base_width(), self.groups())
    }

    /// Dilation rate of the middle conv.
    fn dilation(&self) -> usize;

    /// The stride of the middle conv.
    ///
    /// Affects downsample behavior.
    fn stride(&self) -> usize;

    /// Get the output length for a given input length.
    fn output_length(
        &self,
        input_length: usize,
    ) -> usize {
        stride_div_output_length(input_length, self.stride())
    }
}

/// [`BottleneckBlock`] Config.
///
/// Implements [`BottleneckBlockMeta`].
#[derive(Config, Debug)]
pub struct BottleneckBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// Configures `out_planes = planes * 4`.
    pub planes: usize,

    /// The stride of the middle conv and the downsample layer.
    #[config(default = 1)]
    pub stride: usize,

    /// Groups of the middle conv.
    #[config(default = 1)]
    pub groups: usize,

    /// Base width used to determine the internal width.
    #[config(default = 64)]
    pub base_width: usize,

    /// Dilation rate of the middle conv.
    #[config(default = 1)]
    pub dilation: usize,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl BottleneckBlockMeta for BottleneckBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn planes(&self) -> usize {
        self.planes
    }

    fn groups(&self) -> usize {
        self.groups
    }

    fn base_width(&self) -> usize {
        self.base_width
    }

    fn dilation(&self) -> usize {
        self.dilation
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl BottleneckBlockConfig {
    /// Check the block options.
    ///
    /// # Errors
    ///
    /// - [`ResNetError::ZeroStride`] if ``stride == 0``.
    /// - [`ResNetError::ZeroWidth`] if the grouped width is zero.
    pub fn try_validate(&self) -> Result<(), ResNetError> {
        if self.stride == 0 {
            return Err(ResNetError::ZeroStride);
        }
        if self.width() == 0 {
            return Err(ResNetError::ZeroWidth {
                planes: self.planes,
                base_width: self.base_width,
                groups: self.groups,
            });
        }
        Ok(())
    }

    /// Initialize a [`BottleneckBlock`].
    ///
    /// # Errors
    ///
    /// See [`BottleneckBlockConfig::try_validate`].
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Result<BottleneckBlock<B>, ResNetError> {
        self.try_validate()?;

        let in_planes = self.in_planes();
        let width = self.width();
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

        let cna1: CNA1dConfig = cna_builder.build_config(conv1(in_planes, width, 1));
        let cna2: CNA1dConfig = cna_builder.build_config(conv3(
            width,
            width,
            stride,
            self.groups,
            self.dilation,
        ));
        let cna3: CNA1dConfig = cna_builder.build_config(conv1(width, out_planes, 1));

        Ok(BottleneckBlock {
            base_width: self.base_width,
            downsample: downsample.map(|cfg| cfg.init(device)),
            cna1: cna1.init(device),
            cna2: cna2.init(device),
            cna3: cna3.init(device),
        })
    }
}

/// [`BottleneckBlock`] `ResNet` unit.
///
/// Implements [`BottleneckBlockMeta`].
#[derive(Module, Debug)]
pub struct BottleneckBlock<B: Backend> {
    /// Base width.
    pub base_width: usize,

    /// Optional `DownSample` layer; for the residual connection.
    pub downsample: Option<ResNetDownsample<B>>,

    /// First conv/norm/act layer; reduces to `width`.
    pub cna1: CNA1d<B>,

    /// Second conv/norm/act layer; carries stride, groups and dilation.
    pub cna2: CNA1d<B>,

    /// Third conv/norm/act layer; expands to `out_planes`.
    pub cna3: CNA1d<B>,
}

impl<B: Backend> BottleneckBlockMeta for BottleneckBlock<B> {
    fn in_planes(&self) -> usize {
        self.cna1.in_channels()
    }

    fn planes(&self) -> usize {
        self.out_planes() / BOTTLENECK_EXPANSION
    }

    fn out_planes(&self) -> usize {
        self.cna3.out_channels()
    }

    fn groups(&self) -> usize {
        self.cna2.groups()
    }

    fn base_width(&self) -> usize {
        self.base_width
    }

    fn width(&self) -> usize {
        self.cna2.out_channels()
    }

    fn dilation(&self) -> usize {
        self.cna2.dilation()
    }

    fn stride(&self) -> usize {
        self.cna2.stride()
    }
}

impl<B: Backend> BottleneckBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_length]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes=planes*4, out_length=ceil(in_length/stride)]`` tensor.
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

        assert_shape_contract_periodically!(
            ["batch", "width", "in_length"],
            &x,
            &[
                ("batch", batch),
                ("width", self.width()),
                ("in_length", in_length)
            ]
        );

        let x = self.cna2.forward(x);
        let x = self.cna3.hook_forward(x, |x| x + identity);

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
    pub fn zero_init_residual(self) -> Self {
        let mut cna3 = self.cna3;
        cna3.norm = cna3.norm.zero_init_weight();
        Self { cna3, ..self }
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
