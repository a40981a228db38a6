//! # `ResNet` Construction Errors

use thiserror::Error;

/// Errors raised while assembling a `ResNet` topology.
///
/// All of these are raised at construction time; the forward pass never
/// produces a [`ResNetError`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResNetError {
    /// A [`super::basic_block::BasicBlock`] was asked for a grouped or widened form.
    #[error("BasicBlock only supports groups=1 and base_width=64, got groups={groups}, base_width={base_width}")]
    BasicBlockShape {
        /// The requested conv groups.
        groups: usize,
        /// The requested base width.
        base_width: usize,
    },

    /// A [`super::basic_block::BasicBlock`] was asked for a dilated convolution.
    #[error("dilation > 1 not supported in BasicBlock, got dilation={dilation}")]
    BasicBlockDilation {
        /// The requested dilation.
        dilation: usize,
    },

    /// The stride-for-dilation flags must cover exactly stages 2, 3 and 4.
    #[error("replace_stride_with_dilation should have 3 elements, got {0:?}")]
    StrideDilationFlags(Vec<bool>),

    /// A stage was configured with no blocks.
    #[error("stage {stage} has no blocks")]
    EmptyStage {
        /// The stage index (0-based).
        stage: usize,
    },

    /// A bare layer block was configured with no blocks.
    #[error("layer block has no blocks")]
    EmptyLayerBlock,

    /// A block was configured with a zero stride.
    #[error("stride must be positive")]
    ZeroStride,

    /// The grouped bottleneck width collapsed to zero.
    #[error(
        "bottleneck width is zero: planes={planes}, base_width={base_width}, groups={groups}"
    )]
    ZeroWidth {
        /// The stage planes.
        planes: usize,
        /// The base width.
        base_width: usize,
        /// The conv groups.
        groups: usize,
    },

    /// Adjacent blocks of a stage do not agree on channel counts.
    #[error("block[{prev}].out_planes({out_planes}) != block[{next}].in_planes({in_planes})")]
    BlockChain {
        /// Index of the producing block.
        prev: usize,
        /// Output planes of the producing block.
        out_planes: usize,
        /// Index of the consuming block.
        next: usize,
        /// Input planes of the consuming block.
        in_planes: usize,
    },

    /// Adjacent stages do not agree on channel counts.
    #[error("stage[{prev}].out_planes({out_planes}) != stage[{next}].in_planes({in_planes})")]
    StageChain {
        /// Index of the producing stage; ``0`` is the stem.
        prev: usize,
        /// Output planes of the producing stage.
        out_planes: usize,
        /// Index of the consuming stage.
        next: usize,
        /// Input planes of the consuming stage.
        in_planes: usize,
    },

    /// A numeric stop layer outside ``0..=7``.
    #[error("stop layer must be in 0..=7, got {0}")]
    StopLayer(usize),

    /// A partial forward asked to resume from a layer deeper than its target.
    #[error("cannot run from {from} to {to}: target precedes source")]
    StopOrder {
        /// The layer the activation was taken at.
        from: usize,
        /// The requested target layer.
        to: usize,
    },
}
