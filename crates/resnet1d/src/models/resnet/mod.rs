//! # `ResNet`
//!
//! 1d residual networks over ``[batch, channels, length]`` signals.
//!
//! * [`ResNetAbstractConfig`] - the high-level model config, and the named presets.
//! * [`ResNetStructureConfig`] - the concrete per-stage structure.
//! * [`ResNet`] - the model, with full and partial forward passes.

pub mod basic_block;
pub mod bottleneck;
pub mod downsample;
pub mod error;
pub mod layer_block;
pub mod prefabs;
pub mod residual_block;
pub mod resnet_model;
pub mod stem;
pub mod util;

pub use error::ResNetError;
pub use prefabs::ResNetPreset;
pub use residual_block::BlockKind;
pub use resnet_model::{
    ForwardStop, RESNET18_BLOCKS, RESNET34_BLOCKS, RESNET50_BLOCKS, RESNET101_BLOCKS,
    RESNET152_BLOCKS, ResNet, ResNetAbstractConfig, ResNetActivation, ResNetStructureConfig,
};
