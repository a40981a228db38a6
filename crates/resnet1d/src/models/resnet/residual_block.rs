//! # Residual Block Wrapper

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::models::resnet::basic_block::{
    BASIC_BLOCK_EXPANSION, BasicBlock, BasicBlockConfig, BasicBlockMeta,
};
use crate::models::resnet::bottleneck::{
    BOTTLENECK_EXPANSION, BottleneckBlock, BottleneckBlockConfig, BottleneckBlockMeta,
};
use crate::models::resnet::error::ResNetError;
use crate::models::resnet::util::stride_div_output_length;
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};
use serde::{Deserialize, Serialize};

/// The kind of residual unit a `ResNet` is built from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum BlockKind {
    /// [`BasicBlock`]; two kernel-3 convs, expansion 1.
    Basic,

    /// [`BottleneckBlock`]; reduce/process/expand, expansion 4.
    Bottleneck,
}

impl BlockKind {
    /// The output channel multiplier for this block kind.
    pub fn expansion(&self) -> usize {
        match self {
            Self::Basic => BASIC_BLOCK_EXPANSION,
            Self::Bottleneck => BOTTLENECK_EXPANSION,
        }
    }
}

/// [`ResidualBlock`] Meta API.
pub trait ResidualBlockMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// The stride of convolution.
    ///
    /// Affects downsample behavior.
    fn stride(&self) -> usize;

    /// The dilation of the strided convolution.
    fn dilation(&self) -> usize;

    /// Get the output length for a given input length.
    fn output_length(
        &self,
        input_length: usize,
    ) -> usize {
        stride_div_output_length(input_length, self.stride())
    }
}

/// [`ResidualBlock`] Config.
#[derive(Config, Debug)]
pub enum ResidualBlockConfig {
    /// A `ResNet` [`BasicBlock`].
    Basic(BasicBlockConfig),

    /// A `ResNet` [`BottleneckBlock`].
    Bottleneck(BottleneckBlockConfig),
}

impl ResidualBlockMeta for ResidualBlockConfig {
    fn in_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.in_planes(),
            Self::Bottleneck(config) => config.in_planes(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.out_planes(),
            Self::Bottleneck(config) => config.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Basic(config) => config.stride(),
            Self::Bottleneck(config) => config.stride(),
        }
    }

    fn dilation(&self) -> usize {
        match self {
            Self::Basic(config) => BasicBlockMeta::dilation(config),
            Self::Bottleneck(config) => BottleneckBlockMeta::dilation(config),
        }
    }
}

impl From<BasicBlockConfig> for ResidualBlockConfig {
    fn from(config: BasicBlockConfig) -> Self {
        Self::Basic(config)
    }
}

impl From<BottleneckBlockConfig> for ResidualBlockConfig {
    fn from(config: BottleneckBlockConfig) -> Self {
        Self::Bottleneck(config)
    }
}

/// Options shared by every block of a `ResNet`.
#[derive(Config, Debug)]
pub struct ResidualBlockOptions {
    /// Conv groups.
    #[config(default = 1)]
    pub groups: usize,

    /// Base width.
    #[config(default = 64)]
    pub base_width: usize,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl Default for ResidualBlockOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ResidualBlockConfig {
    /// Build a block config of the given kind.
    pub fn for_kind(
        kind: BlockKind,
        in_planes: usize,
        planes: usize,
        stride: usize,
        dilation: usize,
        options: &ResidualBlockOptions,
    ) -> Self {
        match kind {
            BlockKind::Basic => BasicBlockConfig::new(in_planes, planes)
                .with_stride(stride)
                .with_dilation(dilation)
                .with_groups(options.groups)
                .with_base_width(options.base_width)
                .with_normalization(options.normalization.clone())
                .with_activation(options.activation.clone())
                .into(),
            BlockKind::Bottleneck => BottleneckBlockConfig::new(in_planes, planes)
                .with_stride(stride)
                .with_dilation(dilation)
                .with_groups(options.groups)
                .with_base_width(options.base_width)
                .with_normalization(options.normalization.clone())
                .with_activation(options.activation.clone())
                .into(),
        }
    }

    /// The wrapped block kind.
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Basic(_) => BlockKind::Basic,
            Self::Bottleneck(_) => BlockKind::Bottleneck,
        }
    }

    /// Check the wrapped block options.
    pub fn try_validate(&self) -> Result<(), ResNetError> {
        match self {
            Self::Basic(config) => config.try_validate(),
            Self::Bottleneck(config) => config.try_validate(),
        }
    }

    /// Initialize a [`ResidualBlock`].
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<ResidualBlock<B>, ResNetError> {
        Ok(match self {
            Self::Basic(config) => config.clone().try_init(device)?.into(),
            Self::Bottleneck(config) => config.clone().try_init(device)?.into(),
        })
    }
}

/// A `ResNet` [`BasicBlock`] or [`BottleneckBlock`] wrapper.
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum ResidualBlock<B: Backend> {
    /// A `ResNet` [`BasicBlock`].
    Basic(BasicBlock<B>),

    /// A `ResNet` [`BottleneckBlock`].
    Bottleneck(BottleneckBlock<B>),
}

impl<B: Backend> From<BasicBlock<B>> for ResidualBlock<B> {
    fn from(block: BasicBlock<B>) -> Self {
        Self::Basic(block)
    }
}

impl<B: Backend> From<BottleneckBlock<B>> for ResidualBlock<B> {
    fn from(block: BottleneckBlock<B>) -> Self {
        Self::Bottleneck(block)
    }
}

impl<B: Backend> ResidualBlockMeta for ResidualBlock<B> {
    fn in_planes(&self) -> usize {
        match self {
            Self::Basic(block) => block.in_planes(),
            Self::Bottleneck(block) => block.in_planes(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Basic(block) => block.out_planes(),
            Self::Bottleneck(block) => block.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Basic(block) => block.stride(),
            Self::Bottleneck(block) => block.stride(),
        }
    }

    fn dilation(&self) -> usize {
        match self {
            Self::Basic(block) => BasicBlockMeta::dilation(block),
            Self::Bottleneck(block) => BottleneckBlockMeta::dilation(block),
        }
    }
}

impl<B: Backend> ResidualBlock<B> {
    /// Apply the wrapped block to the input.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_length]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes=planes*expansion, out_length]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        match self {
            Self::Basic(block) => block.forward(input),
            Self::Bottleneck(block) => block.forward(input),
        }
    }

    /// The wrapped block kind.
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Basic(_) => BlockKind::Basic,
            Self::Bottleneck(_) => BlockKind::Bottleneck,
        }
    }

    /// Does the wrapped block carry a downsample on the identity path?
    pub fn has_downsample(&self) -> bool {
        match self {
            Self::Basic(block) => block.has_downsample(),
            Self::Bottleneck(block) => block.has_downsample(),
        }
    }

    /// Zero the terminal norm scale of the wrapped block's main path.
    pub fn zero_init_residual(self) -> Self {
        match self {
            Self::Basic(block) => block.zero_init_residual().into(),
            Self::Bottleneck(block) => block.zero_init_residual().into(),
        }
    }

    /// The affine scale of the terminal norm of the main path.
    pub fn terminal_norm_weight(&self) -> Option<Tensor<B, 1>> {
        match self {
            Self::Basic(block) => block.cna2.norm.weight(),
            Self::Bottleneck(block) => block.cna3.norm.weight(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;
    use std::str::FromStr;

    #[test]
    fn test_block_kind() {
        assert_eq!(BlockKind::Basic.expansion(), 1);
        assert_eq!(BlockKind::Bottleneck.expansion(), 4);
        assert_eq!(BlockKind::from_str("bottleneck"), Ok(BlockKind::Bottleneck));
        assert_eq!(BlockKind::Basic.to_string(), "basic");
    }

    #[test]
    fn test_residual_block_config() {
        let in_planes = 16;
        let planes = 32;
        let options = ResidualBlockOptions::default();

        {
            let cfg = ResidualBlockConfig::for_kind(BlockKind::Basic, in_planes, planes, 2, 1, &options);
            assert!(matches!(cfg, ResidualBlockConfig::Basic(_)));
            assert_eq!(cfg.kind(), BlockKind::Basic);
            assert_eq!(cfg.in_planes(), in_planes);
            assert_eq!(cfg.out_planes(), planes);
            assert_eq!(cfg.stride(), 2);
            assert_eq!(cfg.output_length(20), 10);
            assert_eq!(cfg.try_validate(), Ok(()));
        }

        {
            let cfg =
                ResidualBlockConfig::for_kind(BlockKind::Bottleneck, in_planes, planes, 2, 2, &options);
            assert!(matches!(cfg, ResidualBlockConfig::Bottleneck(_)));
            assert_eq!(cfg.in_planes(), in_planes);
            assert_eq!(cfg.out_planes(), planes * 4);
            assert_eq!(cfg.stride(), 2);
            assert_eq!(cfg.dilation(), 2);
            assert_eq!(cfg.output_length(21), 11);
        }
    }

    #[test]
    fn test_residual_block_forwards_errors() {
        let options = ResidualBlockOptions::new().with_groups(2);
        let cfg = ResidualBlockConfig::for_kind(BlockKind::Basic, 8, 8, 1, 1, &options);
        assert!(matches!(
            cfg.try_init::<NdArray>(&Default::default()),
            Err(ResNetError::BasicBlockShape { groups: 2, .. })
        ));
    }

    #[test]
    fn test_residual_block_basic_block() {
        type B = NdArray;
        let device = Default::default();

        let batch_size = 2;
        let in_planes = 4;
        let planes = 8;
        let in_length = 8;

        let cfg: ResidualBlockConfig = BasicBlockConfig::new(in_planes, planes)
            .with_stride(2)
            .into();

        let block: ResidualBlock<B> = cfg.try_init(&device).unwrap();
        assert_eq!(block.kind(), BlockKind::Basic);
        assert_eq!(block.in_planes(), in_planes);
        assert_eq!(block.out_planes(), planes);
        assert_eq!(block.stride(), 2);
        assert!(block.has_downsample());

        let input = Tensor::ones([batch_size, in_planes, in_length], &device);
        let output = block.forward(input);

        assert_shape_contract!(
            ["batch", "out_planes", "out_length"],
            &output,
            &[
                ("batch", batch_size),
                ("out_planes", planes),
                ("out_length", 4)
            ]
        );
    }

    #[test]
    fn test_residual_block_bottleneck_block() {
        type B = NdArray;
        let device = Default::default();

        let batch_size = 2;
        let in_planes = 4;
        let planes = 2;
        let in_length = 8;

        let cfg: ResidualBlockConfig = BottleneckBlockConfig::new(in_planes, planes)
            .with_stride(2)
            .into();

        let block: ResidualBlock<B> = cfg.try_init(&device).unwrap();
        assert_eq!(block.kind(), BlockKind::Bottleneck);
        assert_eq!(block.in_planes(), in_planes);
        assert_eq!(block.out_planes(), planes * 4);
        assert_eq!(block.stride(), 2);

        let input = Tensor::ones([batch_size, in_planes, in_length], &device);
        let output = block.forward(input);

        assert_shape_contract!(
            ["batch", "out_planes", "out_length"],
            &output,
            &[
                ("batch", batch_size),
                ("out_planes", planes * 4),
                ("out_length", 4)
            ]
        );
    }

    #[test]
    fn test_zero_init_residual() {
        type B = NdArray;
        let device = Default::default();

        for kind in [BlockKind::Basic, BlockKind::Bottleneck] {
            let cfg = ResidualBlockConfig::for_kind(kind, 8, 8, 1, 1, &Default::default());
            let block: ResidualBlock<B> = cfg.try_init(&device).unwrap();

            let out_planes = block.out_planes();
            block
                .terminal_norm_weight()
                .unwrap()
                .to_data()
                .assert_eq(&Tensor::<B, 1>::ones([out_planes], &device).to_data(), true);

            let block = block.zero_init_residual();
            block
                .terminal_norm_weight()
                .unwrap()
                .to_data()
                .assert_eq(&Tensor::<B, 1>::zeros([out_planes], &device).to_data(), true);
        }
    }
}
