//! # Grouped 1d Convolution
//!
//! Grouped [`Conv1d`] forward passes are broken on the burn 0.18 ndarray backend
//! (the kernel indexes past the weight for ``groups > 1``).
//!
//! [`GroupedConv1d`] runs one ungrouped [`Conv1d`] per group over a channel
//! chunk of the input and concatenates the results along the channel dimension;
//! which is the definition of a grouped convolution.
//!
//! With ``groups == 1`` this is a single [`Conv1d`].

use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::prelude::{Backend, Tensor};

/// [`GroupedConv1d`] Config.
///
/// Wraps a (possibly grouped) [`Conv1dConfig`].
#[derive(Config, Debug)]
pub struct GroupedConv1dConfig {
    /// The grouped conv config.
    pub conv: Conv1dConfig,
}

impl From<Conv1dConfig> for GroupedConv1dConfig {
    fn from(conv: Conv1dConfig) -> Self {
        Self { conv }
    }
}

impl GroupedConv1dConfig {
    /// The ungrouped conv config run on each channel chunk.
    ///
    /// The initializer is carried over unchanged, so a fan-out std
    /// resolved for the full conv is preserved.
    pub fn group_config(&self) -> Conv1dConfig {
        let groups = self.conv.groups;
        Conv1dConfig {
            channels_in: self.conv.channels_in / groups,
            channels_out: self.conv.channels_out / groups,
            groups: 1,
            ..self.conv.clone()
        }
    }

    /// Initialize a [`GroupedConv1d`].
    ///
    /// # Panics
    ///
    /// If ``groups`` is zero, or does not divide both channel counts;
    /// as [`Conv1dConfig::init`] does.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> GroupedConv1d<B> {
        let groups = self.conv.groups;
        assert!(
            groups > 0
                && self.conv.channels_in % groups == 0
                && self.conv.channels_out % groups == 0,
            "groups={groups} must divide channels_in={} and channels_out={}",
            self.conv.channels_in,
            self.conv.channels_out,
        );

        let group_config = self.group_config();
        GroupedConv1d {
            convs: (0..groups).map(|_| group_config.init(device)).collect(),
        }
    }
}

/// Grouped [`Conv1d`], run as one conv per channel group.
#[derive(Module, Debug)]
pub struct GroupedConv1d<B: Backend> {
    /// Per-group convolutions, in channel order.
    pub convs: Vec<Conv1d<B>>,
}

impl<B: Backend> GroupedConv1d<B> {
    fn first(&self) -> Option<&Conv1d<B>> {
        self.convs.first()
    }

    /// Number of groups.
    pub fn groups(&self) -> usize {
        self.convs.len()
    }

    /// Number of input channels, over all groups.
    pub fn in_channels(&self) -> usize {
        self.convs
            .iter()
            .map(|conv| conv.weight.shape().dims[1])
            .sum()
    }

    /// Number of output channels, over all groups.
    pub fn out_channels(&self) -> usize {
        self.convs
            .iter()
            .map(|conv| conv.weight.shape().dims[0])
            .sum()
    }

    /// Kernel size.
    pub fn kernel_size(&self) -> usize {
        self.first().map_or(0, |conv| conv.kernel_size)
    }

    /// Stride.
    pub fn stride(&self) -> usize {
        self.first().map_or(1, |conv| conv.stride)
    }

    /// Dilation.
    pub fn dilation(&self) -> usize {
        self.first().map_or(1, |conv| conv.dilation)
    }

    /// Forward pass.
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
        let [batch] = unpack_shape_contract!(
            ["batch", "in_channels", "in_length"],
            &input,
            &["batch"],
            &[("in_channels", self.in_channels())]
        );

        let x = match self.convs.as_slice() {
            [conv] => conv.forward(input),
            convs => {
                let chunks = input.chunk(convs.len(), 1);
                let outputs = convs
                    .iter()
                    .zip(chunks)
                    .map(|(conv, chunk)| conv.forward(chunk))
                    .collect::<Vec<_>>();
                Tensor::cat(outputs, 1)
            }
        };

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_length"],
            &x,
            &[("batch", batch), ("out_channels", self.out_channels())]
        );

        x
    }
}
