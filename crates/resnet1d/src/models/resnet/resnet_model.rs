//! # `ResNet` Core Model
//!
//! [`ResNet`] is the core 1d `ResNet` module.
//!
//! [`ResNetAbstractConfig`] implements [`Config`], and provides
//! a high-level configuration interface.
//! It provides [`ResNetAbstractConfig::try_to_structure`] to convert
//! to a [`ResNetStructureConfig`].
//!
//! [`ResNetStructureConfig`] implements [`Config`], and provides
//! [`ResNetStructureConfig::try_init`] to initialize a [`ResNet`].
//!
//! [`ResNet`] implements [`Module`], and provides
//! [`ResNet::forward`], and the partial passes
//! [`ResNet::forward_until`] and [`ResNet::forward_between`].

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::models::resnet::error::ResNetError;
use crate::models::resnet::layer_block::{
    LayerBlock, LayerBlockConfig, LayerBlockMeta, StagePlan,
};
use crate::models::resnet::residual_block::{BlockKind, ResidualBlock, ResidualBlockOptions};
use crate::models::resnet::stem::{ResNetStem, ResNetStemConfig, STEM_WIDTH};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::module::Module;
use burn::nn::pool::{AdaptiveAvgPool1d, AdaptiveAvgPool1dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::{Backend, Config, Tensor};

/// ResNet-18 block depths.
pub const RESNET18_BLOCKS: [usize; 4] = [2, 2, 2, 2];
/// ResNet-34 block depths.
pub const RESNET34_BLOCKS: [usize; 4] = [3, 4, 6, 3];
/// ResNet-50 block depths.
pub const RESNET50_BLOCKS: [usize; 4] = [3, 4, 6, 3];
/// ResNet-101 block depths.
pub const RESNET101_BLOCKS: [usize; 4] = [3, 4, 23, 3];
/// ResNet-152 block depths.
pub const RESNET152_BLOCKS: [usize; 4] = [3, 8, 36, 3];

/// Per-stage planes.
pub const STAGE_PLANES: [usize; 4] = [64, 128, 256, 512];
/// Per-stage first-block strides.
pub const STAGE_STRIDES: [usize; 4] = [1, 2, 2, 2];

/// The legacy `input_size` which widens the classifier input by 4.
pub const WIDE_HEAD_INPUT_SIZE: usize = 64;

/// Where a partial forward pass stops.
///
/// Numbered ``0..=7`` in forward order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumIter,
)]
pub enum ForwardStop {
    /// 0: the input, unchanged.
    Input,
    /// 1: after the stem activation, before the stem pool.
    Stem,
    /// 2: after the stem pool and stage 1.
    Stage1,
    /// 3: after stage 2.
    Stage2,
    /// 4: after stage 3.
    Stage3,
    /// 5: after stage 4.
    Stage4,
    /// 6: after the global pool and flatten.
    Flatten,
    /// 7: classifier logits.
    Logits,
}

impl ForwardStop {
    /// The numeric stop layer.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Is the activation at this stop a ``[batch, channels, length]`` sequence?
    ///
    /// Otherwise it is a flat ``[batch, features]`` tensor.
    pub fn is_sequence(self) -> bool {
        self <= Self::Stage4
    }
}

impl TryFrom<usize> for ForwardStop {
    type Error = ResNetError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Input,
            1 => Self::Stem,
            2 => Self::Stage1,
            3 => Self::Stage2,
            4 => Self::Stage3,
            5 => Self::Stage4,
            6 => Self::Flatten,
            7 => Self::Logits,
            _ => return Err(ResNetError::StopLayer(value)),
        })
    }
}

impl From<ForwardStop> for usize {
    fn from(stop: ForwardStop) -> Self {
        stop.index()
    }
}

#[derive(Debug, Clone)]
enum ActivationValue<B: Backend> {
    Sequence(Tensor<B, 3>),
    Flat(Tensor<B, 2>),
}

/// An intermediate [`ResNet`] activation, tagged with the stop it was taken at.
///
/// Stops up to [`ForwardStop::Stage4`] hold ``[batch, channels, length]`` tensors;
/// later stops hold ``[batch, features]`` tensors.
#[derive(Debug, Clone)]
pub struct ResNetActivation<B: Backend> {
    stop: ForwardStop,
    value: ActivationValue<B>,
}

impl<B: Backend> ResNetActivation<B> {
    /// Wrap a model input.
    pub fn input(input: Tensor<B, 3>) -> Self {
        Self {
            stop: ForwardStop::Input,
            value: ActivationValue::Sequence(input),
        }
    }

    /// Wrap a sequence activation taken at `stop`.
    ///
    /// Returns `None` if `stop` does not hold a sequence.
    pub fn sequence(
        stop: ForwardStop,
        tensor: Tensor<B, 3>,
    ) -> Option<Self> {
        stop.is_sequence().then_some(Self {
            stop,
            value: ActivationValue::Sequence(tensor),
        })
    }

    /// Wrap a flat activation taken at `stop`.
    ///
    /// Returns `None` if `stop` does not hold a flat tensor.
    pub fn flat(
        stop: ForwardStop,
        tensor: Tensor<B, 2>,
    ) -> Option<Self> {
        (!stop.is_sequence()).then_some(Self {
            stop,
            value: ActivationValue::Flat(tensor),
        })
    }

    /// The stop this activation was taken at.
    pub fn stop(&self) -> ForwardStop {
        self.stop
    }

    /// The activation shape.
    pub fn dims(&self) -> Vec<usize> {
        match &self.value {
            ActivationValue::Sequence(x) => x.dims().to_vec(),
            ActivationValue::Flat(x) => x.dims().to_vec(),
        }
    }

    /// Unwrap a ``[batch, channels, length]`` activation.
    pub fn into_sequence(self) -> Option<Tensor<B, 3>> {
        match self.value {
            ActivationValue::Sequence(x) => Some(x),
            ActivationValue::Flat(_) => None,
        }
    }

    /// Unwrap a ``[batch, features]`` activation.
    pub fn into_flat(self) -> Option<Tensor<B, 2>> {
        match self.value {
            ActivationValue::Flat(x) => Some(x),
            ActivationValue::Sequence(_) => None,
        }
    }
}

/// High-level `ResNet` model configuration.
#[derive(Config, Debug)]
pub struct ResNetAbstractConfig {
    /// The residual unit kind.
    pub block: BlockKind,

    /// Layer block depths.
    pub layers: [usize; 4],

    /// Number of classification classes.
    pub num_classes: usize,

    /// Number of input signal channels.
    pub num_input_channels: usize,

    /// Legacy input length hint.
    ///
    /// A value of [`WIDE_HEAD_INPUT_SIZE`] multiplies the classifier input width by 4;
    /// no other value has any effect.
    #[config(default = 32)]
    pub input_size: usize,

    /// Zero the terminal norm scale of every residual branch.
    #[config(default = false)]
    pub zero_init_residual: bool,

    /// Conv groups of every block.
    #[config(default = 1)]
    pub groups: usize,

    /// Base width of every block.
    #[config(default = 64)]
    pub width_per_group: usize,

    /// Per-stage flags for stages 2, 3 and 4;
    /// a set flag trades that stage's stride for dilation.
    #[config(default = "None")]
    pub replace_stride_with_dilation: Option<Vec<bool>>,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl ResNetAbstractConfig {
    /// The channel expansion of the configured blocks.
    pub fn expansion(&self) -> usize {
        self.block.expansion()
    }

    /// The resolved stride-for-dilation flags.
    ///
    /// # Errors
    ///
    /// [`ResNetError::StrideDilationFlags`] unless there are exactly 3 flags.
    pub fn stride_dilation_flags(&self) -> Result<[bool; 3], ResNetError> {
        match &self.replace_stride_with_dilation {
            None => Ok([false; 3]),
            Some(flags) => <[bool; 3]>::try_from(flags.as_slice())
                .map_err(|_| ResNetError::StrideDilationFlags(flags.clone())),
        }
    }

    /// Convert to a [`ResNetStructureConfig`].
    ///
    /// # Errors
    ///
    /// Any configuration error of the flags, stages, or blocks.
    pub fn try_to_structure(&self) -> Result<ResNetStructureConfig, ResNetError> {
        let flags = self.stride_dilation_flags()?;
        if let Some(stage) = self.layers.iter().position(|&n| n == 0) {
            return Err(ResNetError::EmptyStage { stage });
        }

        let options = ResidualBlockOptions::new()
            .with_groups(self.groups)
            .with_base_width(self.width_per_group)
            .with_normalization(self.normalization.clone())
            .with_activation(self.activation.clone());

        let expansion = self.expansion();
        let mut in_planes = STEM_WIDTH;
        let mut dilation = 1;

        let mut build_stage = |stage: usize| {
            let previous_dilation = dilation;
            let mut stride = STAGE_STRIDES[stage];
            if stage > 0 && flags[stage - 1] {
                dilation *= stride;
                stride = 1;
            }

            let plan = StagePlan::new(self.block, self.layers[stage], in_planes, STAGE_PLANES[stage])
                .with_stride(stride)
                .with_first_dilation(previous_dilation)
                .with_dilation(dilation);

            tracing::debug!(
                stage,
                kind = %self.block,
                num_blocks = plan.num_blocks,
                in_planes,
                out_planes = plan.planes * expansion,
                stride,
                dilation,
                "assemble stage"
            );

            in_planes = STAGE_PLANES[stage] * expansion;
            LayerBlockConfig::build_stage(&plan, &options)
        };

        let layer1 = build_stage(0);
        let layer2 = build_stage(1);
        let layer3 = build_stage(2);
        let layer4 = build_stage(3);

        let head_scale = if self.input_size == WIDE_HEAD_INPUT_SIZE {
            4
        } else {
            1
        };

        let structure = ResNetStructureConfig::new(
            ResNetStemConfig::new(self.num_input_channels)
                .with_normalization(self.normalization.clone())
                .with_activation(self.activation.clone()),
            layer1,
            layer2,
            layer3,
            layer4,
            STAGE_PLANES[3] * expansion * head_scale,
            self.num_classes,
        )
        .with_zero_init_residual(self.zero_init_residual);

        structure.try_validate()?;
        Ok(structure)
    }

    /// Initialize a [`ResNet`] model.
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<ResNet<B>, ResNetError> {
        self.try_to_structure()?.try_init(device)
    }
}

/// [`ResNet`] Structure Config.
///
/// This config defines the concrete structure of a `ResNet` model;
/// [`ResNetStructureConfig::try_validate`] checks that the stages chain.
#[derive(Config, Debug)]
pub struct ResNetStructureConfig {
    /// The input stem.
    pub stem: ResNetStemConfig,

    /// Stage 1.
    pub layer1: LayerBlockConfig,
    /// Stage 2.
    pub layer2: LayerBlockConfig,
    /// Stage 3.
    pub layer3: LayerBlockConfig,
    /// Stage 4.
    pub layer4: LayerBlockConfig,

    /// Classifier input width.
    pub head_planes: usize,

    /// The number of classes.
    pub num_classes: usize,

    /// Zero the terminal norm scale of every residual branch.
    #[config(default = false)]
    pub zero_init_residual: bool,
}

impl ResNetStructureConfig {
    /// The stage configs, in order.
    pub fn stages(&self) -> [&LayerBlockConfig; 4] {
        [&self.layer1, &self.layer2, &self.layer3, &self.layer4]
    }

    /// Check that the stages are valid and chain from the stem.
    ///
    /// # Errors
    ///
    /// - [`ResNetError::EmptyStage`] for a stage with no blocks.
    /// - [`ResNetError::StageChain`] for a channel mismatch between stages.
    /// - any error of the component blocks.
    pub fn try_validate(&self) -> Result<(), ResNetError> {
        let mut prev_planes = self.stem.out_channels;
        for (stage, layer) in self.stages().into_iter().enumerate() {
            if layer.is_empty() {
                return Err(ResNetError::EmptyStage { stage });
            }
            layer.try_validate()?;
            if layer.in_planes() != prev_planes {
                return Err(ResNetError::StageChain {
                    prev: stage,
                    out_planes: prev_planes,
                    next: stage + 1,
                    in_planes: layer.in_planes(),
                });
            }
            prev_planes = layer.out_planes();
        }
        Ok(())
    }

    /// Initialize a [`ResNet`] model.
    ///
    /// Applies the zero-init pass when configured.
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Result<ResNet<B>, ResNetError> {
        self.try_validate()?;

        let model = ResNet {
            stem: self.stem.init(device),
            layer1: self.layer1.try_init(device)?,
            layer2: self.layer2.try_init(device)?,
            layer3: self.layer3.try_init(device)?,
            layer4: self.layer4.try_init(device)?,
            avgpool: AdaptiveAvgPool1dConfig::new(1).init(),
            fc: LinearConfig::new(self.head_planes, self.num_classes).init(device),
        };

        let model = if self.zero_init_residual {
            model.zero_init_residual()
        } else {
            model
        };

        tracing::info!(
            in_channels = model.in_channels(),
            blocks = ?model.stages().map(|s| s.len()),
            feature_planes = model.feature_planes(),
            num_classes = self.num_classes,
            zero_init_residual = self.zero_init_residual,
            num_params = model.num_params(),
            "built ResNet"
        );

        Ok(model)
    }
}

/// 1d `ResNet` model.
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    /// Input stem.
    pub stem: ResNetStem<B>,

    /// Stage 1.
    pub layer1: LayerBlock<B>,
    /// Stage 2.
    pub layer2: LayerBlock<B>,
    /// Stage 3.
    pub layer3: LayerBlock<B>,
    /// Stage 4.
    pub layer4: LayerBlock<B>,

    /// Head pooling.
    pub avgpool: AdaptiveAvgPool1d,
    /// Head classifier.
    pub fc: Linear<B>,
}

impl<B: Backend> ResNet<B> {
    /// Input signal channels.
    pub fn in_channels(&self) -> usize {
        self.stem.in_channels()
    }

    /// Channels of the final stage; the flattened feature width.
    pub fn feature_planes(&self) -> usize {
        self.layer4.out_planes()
    }

    /// Classifier input width.
    ///
    /// Differs from [`ResNet::feature_planes`] only under the legacy
    /// [`WIDE_HEAD_INPUT_SIZE`] flag, where the classifier cannot consume the features.
    pub fn head_planes(&self) -> usize {
        self.fc.weight.dims()[0]
    }

    /// Number of classifier outputs.
    pub fn num_classes(&self) -> usize {
        self.fc.weight.dims()[1]
    }

    /// The stages, in order.
    pub fn stages(&self) -> [&LayerBlock<B>; 4] {
        [&self.layer1, &self.layer2, &self.layer3, &self.layer4]
    }

    /// Every residual block, in forward order.
    pub fn blocks(&self) -> impl Iterator<Item = &ResidualBlock<B>> {
        self.stages()
            .into_iter()
            .flat_map(|stage| stage.blocks.iter())
    }

    /// Zero the terminal norm scale of every residual block.
    pub fn zero_init_residual(self) -> Self {
        Self {
            layer1: self.layer1.zero_init_residual(),
            layer2: self.layer2.zero_init_residual(),
            layer3: self.layer3.zero_init_residual(),
            layer4: self.layer4.zero_init_residual(),
            ..self
        }
    }

    /// Full forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, length]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]`` logits.
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
    ) -> Tensor<B, 2> {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_channels", "length"],
            &input,
            &["batch"],
            &[("in_channels", self.in_channels())]
        );

        let x = self.stem.forward(input);
        let x = self.layer1.forward(x);
        let x = self.layer2.forward(x);
        let x = self.layer3.forward(x);
        let x = self.layer4.forward(x);

        let x = self.avgpool.forward(x);
        // [batch, channels, 1] -> [batch, channels]
        let x: Tensor<B, 2> = x.flatten(1, 2);
        let x = self.fc.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "num_classes"],
            &x,
            &[("batch", batch), ("num_classes", self.num_classes())]
        );

        x
    }

    /// Forward pass which stops at `stop`.
    pub fn forward_until(
        &self,
        input: Tensor<B, 3>,
        stop: ForwardStop,
    ) -> ResNetActivation<B> {
        assert_shape_contract_periodically!(
            ["batch", "in_channels", "length"],
            &input,
            &[("in_channels", self.in_channels())]
        );

        let from = ResNetActivation::input(input);
        self.advance(from, stop)
    }

    /// Resume a partial forward pass, continuing to `to`.
    ///
    /// Resuming from an activation produced by [`ResNet::forward_until`]
    /// reproduces the full forward pass.
    ///
    /// # Errors
    ///
    /// [`ResNetError::StopOrder`] if `to` precedes the activation's stop.
    pub fn forward_between(
        &self,
        activation: ResNetActivation<B>,
        to: ForwardStop,
    ) -> Result<ResNetActivation<B>, ResNetError> {
        if to < activation.stop() {
            return Err(ResNetError::StopOrder {
                from: activation.stop().index(),
                to: to.index(),
            });
        }
        Ok(self.advance(activation, to))
    }

    fn advance(
        &self,
        activation: ResNetActivation<B>,
        to: ForwardStop,
    ) -> ResNetActivation<B> {
        let ResNetActivation { stop, mut value } = activation;
        for target in (stop.index() + 1)..=to.index() {
            value = self.step(target, value);
        }
        ResNetActivation {
            stop: stop.max(to),
            value,
        }
    }

    /// Run the layer(s) ending at stop layer `target`.
    fn step(
        &self,
        target: usize,
        value: ActivationValue<B>,
    ) -> ActivationValue<B> {
        use ActivationValue::{Flat, Sequence};

        match (target, value) {
            (1, Sequence(x)) => Sequence(self.stem.forward_activation(x)),
            (2, Sequence(x)) => Sequence(self.layer1.forward(self.stem.forward_pool(x))),
            (3, Sequence(x)) => Sequence(self.layer2.forward(x)),
            (4, Sequence(x)) => Sequence(self.layer3.forward(x)),
            (5, Sequence(x)) => Sequence(self.layer4.forward(x)),
            (6, Sequence(x)) => Flat(self.avgpool.forward(x).flatten(1, 2)),
            (7, Flat(x)) => Flat(self.fc.forward(x)),
            // the stop tag fixes the variant; unreachable for tagged activations.
            (_, value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet::residual_block::ResidualBlockMeta;
    use crate::compat::activation_wrapper::Activation;
    use burn::backend::NdArray;
    use burn::nn::PReluConfig;
    use burn::tensor::Distribution;
    use strum::IntoEnumIterator;

    #[test]
    fn test_forward_stop() {
        for (idx, stop) in ForwardStop::iter().enumerate() {
            assert_eq!(stop.index(), idx);
            assert_eq!(ForwardStop::try_from(idx), Ok(stop));
            assert_eq!(usize::from(stop), idx);
            assert_eq!(stop.is_sequence(), idx <= 5);
        }
        assert_eq!(ForwardStop::try_from(8), Err(ResNetError::StopLayer(8)));
        assert!(ForwardStop::Stem < ForwardStop::Logits);
    }

    #[test]
    fn test_activation_wrappers() {
        type B = NdArray<f32>;
        let device = Default::default();

        let seq: Tensor<B, 3> = Tensor::zeros([2, 3, 4], &device);
        let flat: Tensor<B, 2> = Tensor::zeros([2, 3], &device);

        assert!(ResNetActivation::sequence(ForwardStop::Flatten, seq.clone()).is_none());
        assert!(ResNetActivation::flat(ForwardStop::Stage2, flat.clone()).is_none());

        let act = ResNetActivation::sequence(ForwardStop::Stage2, seq).unwrap();
        assert_eq!(act.stop(), ForwardStop::Stage2);
        assert_eq!(act.dims(), vec![2, 3, 4]);
        assert!(act.clone().into_flat().is_none());
        assert!(act.into_sequence().is_some());

        let act = ResNetActivation::flat(ForwardStop::Logits, flat).unwrap();
        assert_eq!(act.dims(), vec![2, 3]);
    }

    #[test]
    fn test_stride_dilation_flags() {
        let config = ResNetAbstractConfig::new(BlockKind::Basic, RESNET18_BLOCKS, 10, 2);
        assert_eq!(config.stride_dilation_flags(), Ok([false; 3]));

        let config = config.with_replace_stride_with_dilation(Some(vec![true, false]));
        assert_eq!(
            config.try_to_structure().err(),
            Some(ResNetError::StrideDilationFlags(vec![true, false]))
        );
    }

    #[test]
    fn test_empty_stage() {
        let config = ResNetAbstractConfig::new(BlockKind::Bottleneck, [3, 0, 6, 3], 10, 2);
        assert_eq!(
            config.try_to_structure().err(),
            Some(ResNetError::EmptyStage { stage: 1 })
        );
    }

    #[test]
    fn test_basic_block_options_rejected() {
        let config =
            ResNetAbstractConfig::new(BlockKind::Basic, RESNET18_BLOCKS, 10, 2).with_groups(2);
        assert!(matches!(
            config.try_to_structure(),
            Err(ResNetError::BasicBlockShape { groups: 2, .. })
        ));

        let config = ResNetAbstractConfig::new(BlockKind::Basic, RESNET18_BLOCKS, 10, 2)
            .with_replace_stride_with_dilation(Some(vec![false, true, false]));
        assert_eq!(
            config.try_to_structure().err(),
            Some(ResNetError::BasicBlockDilation { dilation: 2 })
        );
    }

    #[test]
    fn test_structure_stage_chain() {
        let mut structure = ResNetAbstractConfig::new(BlockKind::Basic, RESNET18_BLOCKS, 10, 2)
            .try_to_structure()
            .unwrap();
        structure.layer3 = structure.layer2.clone();
        assert_eq!(
            structure.try_validate(),
            Err(ResNetError::StageChain {
                prev: 2,
                out_planes: 128,
                next: 3,
                in_planes: 64
            })
        );
    }

    #[test]
    fn test_bottleneck_structure() {
        let structure = ResNetAbstractConfig::new(BlockKind::Bottleneck, RESNET50_BLOCKS, 10, 2)
            .try_to_structure()
            .unwrap();

        let expected_in = [64, 256, 512, 1024];
        let expected_out = [256, 512, 1024, 2048];
        for (idx, stage) in structure.stages().into_iter().enumerate() {
            assert_eq!(stage.len(), RESNET50_BLOCKS[idx]);
            assert_eq!(stage.in_planes(), expected_in[idx]);
            assert_eq!(stage.out_planes(), expected_out[idx]);
            assert_eq!(stage.stride(), STAGE_STRIDES[idx]);
        }
        assert_eq!(structure.head_planes, 2048);
    }

    #[test]
    fn test_stride_dilation_trade() {
        let structure = ResNetAbstractConfig::new(BlockKind::Bottleneck, RESNET50_BLOCKS, 10, 2)
            .with_replace_stride_with_dilation(Some(vec![false, true, true]))
            .try_to_structure()
            .unwrap();

        assert_eq!(structure.layer2.stride(), 2);
        assert_eq!(structure.layer3.stride(), 1);
        assert_eq!(structure.layer4.stride(), 1);

        let dilations = |stage: &LayerBlockConfig| {
            stage
                .blocks
                .iter()
                .map(|b| b.dilation())
                .collect::<Vec<_>>()
        };
        assert_eq!(dilations(&structure.layer2), vec![1; 4]);
        // the first block of a stage runs at the previous dilation.
        assert_eq!(dilations(&structure.layer3), vec![1, 2, 2, 2, 2, 2]);
        assert_eq!(dilations(&structure.layer4), vec![2, 4, 4]);

        // the first block still reshapes channels through the downsample.
        let first = &structure.layer3.blocks[0];
        assert_eq!(first.in_planes(), 512);
        assert_eq!(first.out_planes(), 1024);
    }

    #[test]
    fn test_wide_head_flag() {
        let structure = ResNetAbstractConfig::new(BlockKind::Basic, RESNET18_BLOCKS, 10, 2)
            .with_input_size(WIDE_HEAD_INPUT_SIZE)
            .try_to_structure()
            .unwrap();
        assert_eq!(structure.head_planes, 512 * 4);

        let model: ResNet<NdArray<f32>> = structure.try_init(&Default::default()).unwrap();
        assert_eq!(model.feature_planes(), 512);
        assert_eq!(model.head_planes(), 2048);

        let structure = ResNetAbstractConfig::new(BlockKind::Basic, RESNET18_BLOCKS, 10, 2)
            .with_input_size(128)
            .try_to_structure()
            .unwrap();
        assert_eq!(structure.head_planes, 512);
    }

    #[test]
    fn test_resnet18_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetAbstractConfig::new(BlockKind::Basic, RESNET18_BLOCKS, 5, 3)
            .try_init(&device)
            .unwrap();
        assert_eq!(model.in_channels(), 3);
        assert_eq!(model.feature_planes(), 512);
        assert_eq!(model.num_classes(), 5);
        assert_eq!(model.blocks().count(), 8);

        let input = Tensor::random([2, 3, 64], Distribution::Default, &device);
        let output = model.forward(input);
        assert_eq!(output.dims(), [2, 5]);
    }

    #[test]
    fn test_prelu_resnet18_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetAbstractConfig::new(BlockKind::Basic, RESNET18_BLOCKS, 5, 3)
            .with_activation(PReluConfig::new().into())
            .try_init(&device)
            .unwrap();

        // each PReLU carries one slope per channel of the conv it follows.
        match &model.stem.cna.act {
            Activation::PRelu(prelu) => assert_eq!(prelu.num_params(), 64),
            other => panic!("unexpected stem activation: {other:?}"),
        }

        let input = Tensor::random([2, 3, 64], Distribution::Default, &device);
        let output = model.forward(input);
        assert_eq!(output.dims(), [2, 5]);
    }

    #[test]
    fn test_forward_until_shapes() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetAbstractConfig::new(BlockKind::Basic, RESNET18_BLOCKS, 7, 2)
            .try_init(&device)
            .unwrap();

        let input: Tensor<B, 3> = Tensor::random([2, 2, 100], Distribution::Default, &device);

        let expected: [Vec<usize>; 8] = [
            vec![2, 2, 100],
            vec![2, 64, 50],
            vec![2, 64, 25],
            vec![2, 128, 13],
            vec![2, 256, 7],
            vec![2, 512, 4],
            vec![2, 512],
            vec![2, 7],
        ];
        for stop in ForwardStop::iter() {
            let act = model.forward_until(input.clone(), stop);
            assert_eq!(act.stop(), stop);
            assert_eq!(act.dims(), expected[stop.index()], "{stop}");
        }
    }

    #[test]
    fn test_partial_forward_resume_matches_full() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetAbstractConfig::new(BlockKind::Bottleneck, [1, 1, 1, 1], 4, 2)
            .try_init(&device)
            .unwrap();

        let input: Tensor<B, 3> = Tensor::random([2, 2, 48], Distribution::Default, &device);
        let full = model.forward(input.clone());

        for from in ForwardStop::iter() {
            let partial = model.forward_until(input.clone(), from);
            let resumed = model
                .forward_between(partial, ForwardStop::Logits)
                .unwrap()
                .into_flat()
                .unwrap();
            resumed.to_data().assert_eq(&full.to_data(), true);
        }

        let mid = model.forward_until(input.clone(), ForwardStop::Stage1);
        let mid = model.forward_between(mid, ForwardStop::Stage3).unwrap();
        assert_eq!(mid.stop(), ForwardStop::Stage3);
        let direct = model
            .forward_until(input, ForwardStop::Stage3)
            .into_sequence()
            .unwrap();
        mid.into_sequence()
            .unwrap()
            .to_data()
            .assert_eq(&direct.to_data(), true);
    }

    #[test]
    fn test_forward_between_rejects_backwards() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetAbstractConfig::new(BlockKind::Basic, [1, 1, 1, 1], 4, 2)
            .try_init(&device)
            .unwrap();

        let input: Tensor<B, 3> = Tensor::random([1, 2, 16], Distribution::Default, &device);
        let act = model.forward_until(input, ForwardStop::Stage3);
        assert_eq!(
            model.forward_between(act.clone(), ForwardStop::Stem).err(),
            Some(ResNetError::StopOrder { from: 4, to: 1 })
        );

        // same stop is a passthrough.
        let same = model.forward_between(act, ForwardStop::Stage3).unwrap();
        assert_eq!(same.stop(), ForwardStop::Stage3);
    }

    #[test]
    fn test_zero_init_residual() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetAbstractConfig::new(BlockKind::Bottleneck, [2, 1, 1, 1], 4, 2)
            .with_zero_init_residual(true)
            .try_init(&device)
            .unwrap();

        for block in model.blocks() {
            let weight = block.terminal_norm_weight().unwrap();
            weight
                .to_data()
                .assert_eq(&Tensor::<B, 1>::zeros([block.out_planes()], &device).to_data(), true);
        }

        // the second block of stage 1 has no downsample, and passes relu(x) through.
        let block = &model.layer1.blocks[1];
        assert!(!block.has_downsample());
        let input: Tensor<B, 3> = Tensor::random([2, 256, 9], Distribution::Default, &device);
        let output = block.forward(input.clone());
        output
            .to_data()
            .assert_eq(&burn::tensor::activation::relu(input).to_data(), true);

        let model: ResNet<B> = ResNetAbstractConfig::new(BlockKind::Bottleneck, [2, 1, 1, 1], 4, 2)
            .try_init(&device)
            .unwrap();
        for block in model.blocks() {
            let weight = block.terminal_norm_weight().unwrap();
            weight
                .to_data()
                .assert_eq(&Tensor::<B, 1>::ones([block.out_planes()], &device).to_data(), true);
        }
    }
}
