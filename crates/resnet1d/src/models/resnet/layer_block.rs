//! # `ResNet` Layer Block
//!
//! A [`LayerBlock`] is a sequence of [`ResidualBlock`]s; one `ResNet` stage.
//!
//! [`LayerBlockMeta`] defines a common meta API for [`LayerBlock`]
//! and [`LayerBlockConfig`].
//!
//! [`LayerBlockConfig`] implements [`Config`], and provides
//! [`LayerBlockConfig::try_init`] to initialize a [`LayerBlock`].
//!
//! [`LayerBlock`] implements [`Module`], and provides
//! [`LayerBlock::forward`].

use crate::models::resnet::error::ResNetError;
use crate::models::resnet::residual_block::{
    BlockKind, ResidualBlock, ResidualBlockConfig, ResidualBlockMeta, ResidualBlockOptions,
};
use crate::models::resnet::util::stride_div_output_length;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`LayerBlock`] Meta API.
pub trait LayerBlockMeta {
    /// The number of blocks.
    fn len(&self) -> usize;

    /// Check if the layer block is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// Get the effective stride of the layers.
    fn stride(&self) -> usize;

    /// Get the output length for a given input length.
    fn output_length(
        &self,
        input_length: usize,
    ) -> usize {
        stride_div_output_length(input_length, self.stride())
    }
}

/// Stage assembly parameters for [`LayerBlockConfig::build_stage`].
#[derive(Config, Debug)]
pub struct StagePlan {
    /// The residual unit kind.
    pub kind: BlockKind,

    /// The number of blocks.
    pub num_blocks: usize,

    /// Input planes of the first block.
    pub in_planes: usize,

    /// Stage planes; blocks output ``planes * expansion``.
    pub planes: usize,

    /// Stride of the first block.
    #[config(default = 1)]
    pub stride: usize,

    /// Dilation of the first block.
    #[config(default = 1)]
    pub first_dilation: usize,

    /// Dilation of the remaining blocks.
    #[config(default = 1)]
    pub dilation: usize,
}

/// [`LayerBlock`] Configuration.
#[derive(Config, Debug)]
pub struct LayerBlockConfig {
    /// The component blocks.
    pub blocks: Vec<ResidualBlockConfig>,
}

impl From<Vec<ResidualBlockConfig>> for LayerBlockConfig {
    fn from(blocks: Vec<ResidualBlockConfig>) -> Self {
        Self { blocks }
    }
}

impl LayerBlockMeta for LayerBlockConfig {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks.first().map_or(0, |b| b.in_planes())
    }

    fn out_planes(&self) -> usize {
        self.blocks.last().map_or(0, |b| b.out_planes())
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl LayerBlockConfig {
    /// Build a stage config.
    ///
    /// The first block takes the stage stride, ``first_dilation``,
    /// and is the only block which may carry a downsample.
    /// Later blocks run at stride 1 with ``dilation``.
    pub fn build_stage(
        plan: &StagePlan,
        options: &ResidualBlockOptions,
    ) -> Self {
        let out_planes = plan.planes * plan.kind.expansion();
        let blocks = (0..plan.num_blocks)
            .map(|b| {
                if b == 0 {
                    ResidualBlockConfig::for_kind(
                        plan.kind,
                        plan.in_planes,
                        plan.planes,
                        plan.stride,
                        plan.first_dilation,
                        options,
                    )
                } else {
                    ResidualBlockConfig::for_kind(
                        plan.kind,
                        out_planes,
                        plan.planes,
                        1,
                        plan.dilation,
                        options,
                    )
                }
            })
            .collect();

        Self { blocks }
    }

    /// Check if the config is valid.
    ///
    /// # Errors
    ///
    /// - [`ResNetError::EmptyLayerBlock`] if there are no blocks.
    /// - [`ResNetError::BlockChain`] if adjacent blocks disagree on planes.
    /// - any error of the component blocks.
    pub fn try_validate(&self) -> Result<(), ResNetError> {
        if self.is_empty() {
            return Err(ResNetError::EmptyLayerBlock);
        }

        for idx in 1..self.blocks.len() {
            let prev = &self.blocks[idx - 1];
            let curr = &self.blocks[idx];
            if prev.out_planes() != curr.in_planes() {
                return Err(ResNetError::BlockChain {
                    prev: idx - 1,
                    out_planes: prev.out_planes(),
                    next: idx,
                    in_planes: curr.in_planes(),
                });
            }
        }

        self.blocks.iter().try_for_each(|block| block.try_validate())
    }

    /// Initialize a new [`LayerBlock`].
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Result<LayerBlock<B>, ResNetError> {
        self.try_validate()?;

        let blocks = self
            .blocks
            .iter()
            .enumerate()
            .map(|(idx, cfg)| {
                tracing::trace!(
                    block = idx,
                    kind = %cfg.kind(),
                    in_planes = cfg.in_planes(),
                    out_planes = cfg.out_planes(),
                    stride = cfg.stride(),
                    dilation = cfg.dilation(),
                    "init residual block"
                );
                cfg.try_init(device)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LayerBlock { blocks })
    }
}

/// Layer block.
#[derive(Module, Debug)]
pub struct LayerBlock<B: Backend> {
    /// Internal blocks.
    pub blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> LayerBlockMeta for LayerBlock<B> {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks.first().map_or(0, |b| b.in_planes())
    }

    fn out_planes(&self) -> usize {
        self.blocks.last().map_or(0, |b| b.out_planes())
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl<B: Backend> LayerBlock<B> {
    /// Apply the layer block.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_length]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes, out_length=ceil(in_length/stride)]`` tensor.
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

        let x = self.blocks.iter().fold(input, |x, block| block.forward(x));

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_length"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_length", self.output_length(in_length))
            ]
        );

        x
    }

    /// Apply a mapping over the blocks.
    pub fn map_blocks<F>(
        self,
        f: &mut F,
    ) -> Self
    where
        F: FnMut(usize, ResidualBlock<B>) -> ResidualBlock<B>,
    {
        Self {
            blocks: self
                .blocks
                .into_iter()
                .enumerate()
                .map(|(idx, block)| f(idx, block))
                .collect(),
        }
    }

    /// Zero the terminal norm scale of every block.
    pub fn zero_init_residual(self) -> Self {
        self.map_blocks(&mut |_, block| block.zero_init_residual())
    }
}
