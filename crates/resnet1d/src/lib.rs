#![warn(missing_docs)]
//!# resnet1d - 1d `ResNet` models for Burn
//!
//! ## Notable Components
//!
//! * [`compat`] - layer selection wrappers over ``burn::nn``.
//!   * [`compat::activation_wrapper::Activation`] - activation layer abstraction wrapper.
//!   * [`compat::normalization_wrapper::Normalization`] - norm layer abstraction wrapper.
//!   * [`compat::grouped_conv1d::GroupedConv1d`] - grouped ``Conv1d``, run per group.
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::blocks`] - miscellaneous blocks.
//!     * [`layers::blocks::cna`] - ``GroupedConv1d + Norm + Act`` block, with a residual hook.
//!     * [`layers::blocks::conv_norm`] - ``Conv1d + Norm`` block.
//! * [`models`] - complete model families.
//!   * [`models::resnet`] - `ResNet`, `ResNeXt` and wide `ResNet`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use resnet1d::models::resnet::{ForwardStop, ResNet, ResNetPreset};
//!
//! let model: ResNet<B> = ResNetPreset::ResNet18
//!     .config(num_classes, num_input_channels, input_size)
//!     .try_init(&device)?;
//!
//! let logits = model.forward(input.clone());
//! let features = model.forward_until(input, ForwardStop::Flatten);
//! ```

pub mod compat;
pub mod layers;
pub mod models;
