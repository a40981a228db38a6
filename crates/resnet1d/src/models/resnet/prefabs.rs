//! # Named `ResNet` Presets
//!
//! Every preset takes ``(num_classes, num_input_channels, input_size)``
//! and returns a [`ResNetAbstractConfig`]; other options are set with the
//! `with_*` builders.
//!
//! The builders run after the preset, so they override the preset's own
//! settings too; e.g. `resnext50_32x4d(..).with_groups(1)` is a plain ResNet-50.
//!
//! [`ResNetPreset`] enumerates the presets and parses them by name:
//! ```rust,ignore
//! let config = "resnext50_32x4d".parse::<ResNetPreset>()?.config(10, 12, 128);
//! ```

use crate::models::resnet::residual_block::BlockKind;
use crate::models::resnet::resnet_model::{
    RESNET18_BLOCKS, RESNET34_BLOCKS, RESNET50_BLOCKS, RESNET101_BLOCKS, RESNET152_BLOCKS,
    ResNetAbstractConfig,
};

impl ResNetAbstractConfig {
    fn preset(
        block: BlockKind,
        layers: [usize; 4],
        num_classes: usize,
        num_input_channels: usize,
        input_size: usize,
    ) -> Self {
        Self::new(block, layers, num_classes, num_input_channels).with_input_size(input_size)
    }

    /// ResNet-18; basic blocks ``[2, 2, 2, 2]``.
    pub fn resnet18(
        num_classes: usize,
        num_input_channels: usize,
        input_size: usize,
    ) -> Self {
        Self::preset(
            BlockKind::Basic,
            RESNET18_BLOCKS,
            num_classes,
            num_input_channels,
            input_size,
        )
    }

    /// ResNet-34; basic blocks ``[3, 4, 6, 3]``.
    pub fn resnet34(
        num_classes: usize,
        num_input_channels: usize,
        input_size: usize,
    ) -> Self {
        Self::preset(
            BlockKind::Basic,
            RESNET34_BLOCKS,
            num_classes,
            num_input_channels,
            input_size,
        )
    }

    /// ResNet-50; bottleneck blocks ``[3, 4, 6, 3]``.
    pub fn resnet50(
        num_classes: usize,
        num_input_channels: usize,
        input_size: usize,
    ) -> Self {
        Self::preset(
            BlockKind::Bottleneck,
            RESNET50_BLOCKS,
            num_classes,
            num_input_channels,
            input_size,
        )
    }

    /// ResNet-101; bottleneck blocks ``[3, 4, 23, 3]``.
    pub fn resnet101(
        num_classes: usize,
        num_input_channels: usize,
        input_size: usize,
    ) -> Self {
        Self::preset(
            BlockKind::Bottleneck,
            RESNET101_BLOCKS,
            num_classes,
            num_input_channels,
            input_size,
        )
    }

    /// ResNet-152; bottleneck blocks ``[3, 8, 36, 3]``.
    pub fn resnet152(
        num_classes: usize,
        num_input_channels: usize,
        input_size: usize,
    ) -> Self {
        Self::preset(
            BlockKind::Bottleneck,
            RESNET152_BLOCKS,
            num_classes,
            num_input_channels,
            input_size,
        )
    }

    /// ResNeXt-50 32x4d; ResNet-50 with 32 groups of width 4.
    ///
    /// ``groups`` and ``width_per_group`` define this preset;
    /// a later `with_groups` or `with_width_per_group` call replaces them,
    /// and the result is no longer ResNeXt-50 32x4d.
    pub fn resnext50_32x4d(
        num_classes: usize,
        num_input_channels: usize,
        input_size: usize,
    ) -> Self {
        Self::resnet50(num_classes, num_input_channels, input_size)
            .with_groups(32)
            .with_width_per_group(4)
    }

    /// ResNeXt-101 32x8d; ResNet-101 with 32 groups of width 8.
    ///
    /// ``groups`` and ``width_per_group`` define this preset;
    /// a later `with_groups` or `with_width_per_group` call replaces them.
    pub fn resnext101_32x8d(
        num_classes: usize,
        num_input_channels: usize,
        input_size: usize,
    ) -> Self {
        Self::resnet101(num_classes, num_input_channels, input_size)
            .with_groups(32)
            .with_width_per_group(8)
    }

    /// Wide ResNet-50-2; ResNet-50 with doubled bottleneck width.
    ///
    /// The outer block channels are unchanged.
    ///
    /// ``width_per_group`` defines this preset;
    /// a later `with_width_per_group` call replaces it.
    pub fn wide_resnet50_2(
        num_classes: usize,
        num_input_channels: usize,
        input_size: usize,
    ) -> Self {
        Self::resnet50(num_classes, num_input_channels, input_size).with_width_per_group(64 * 2)
    }

    /// Wide ResNet-101-2; ResNet-101 with doubled bottleneck width.
    ///
    /// ``width_per_group`` defines this preset;
    /// a later `with_width_per_group` call replaces it.
    pub fn wide_resnet101_2(
        num_classes: usize,
        num_input_channels: usize,
        input_size: usize,
    ) -> Self {
        Self::resnet101(num_classes, num_input_channels, input_size).with_width_per_group(64 * 2)
    }
}

/// Named `ResNet` presets.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
pub enum ResNetPreset {
    /// See [`ResNetAbstractConfig::resnet18`].
    #[strum(serialize = "resnet18")]
    ResNet18,
    /// See [`ResNetAbstractConfig::resnet34`].
    #[strum(serialize = "resnet34")]
    ResNet34,
    /// See [`ResNetAbstractConfig::resnet50`].
    #[strum(serialize = "resnet50")]
    ResNet50,
    /// See [`ResNetAbstractConfig::resnet101`].
    #[strum(serialize = "resnet101")]
    ResNet101,
    /// See [`ResNetAbstractConfig::resnet152`].
    #[strum(serialize = "resnet152")]
    ResNet152,
    /// See [`ResNetAbstractConfig::resnext50_32x4d`].
    #[strum(serialize = "resnext50_32x4d")]
    ResNeXt50_32x4d,
    /// See [`ResNetAbstractConfig::resnext101_32x8d`].
    #[strum(serialize = "resnext101_32x8d")]
    ResNeXt101_32x8d,
    /// See [`ResNetAbstractConfig::wide_resnet50_2`].
    #[strum(serialize = "wide_resnet50_2")]
    WideResNet50_2,
    /// See [`ResNetAbstractConfig::wide_resnet101_2`].
    #[strum(serialize = "wide_resnet101_2")]
    WideResNet101_2,
}

impl ResNetPreset {
    /// Build the preset's abstract config.
    pub fn config(
        &self,
        num_classes: usize,
        num_input_channels: usize,
        input_size: usize,
    ) -> ResNetAbstractConfig {
        let build: fn(usize, usize, usize) -> ResNetAbstractConfig = match self {
            Self::ResNet18 => ResNetAbstractConfig::resnet18,
            Self::ResNet34 => ResNetAbstractConfig::resnet34,
            Self::ResNet50 => ResNetAbstractConfig::resnet50,
            Self::ResNet101 => ResNetAbstractConfig::resnet101,
            Self::ResNet152 => ResNetAbstractConfig::resnet152,
            Self::ResNeXt50_32x4d => ResNetAbstractConfig::resnext50_32x4d,
            Self::ResNeXt101_32x8d => ResNetAbstractConfig::resnext101_32x8d,
            Self::WideResNet50_2 => ResNetAbstractConfig::wide_resnet50_2,
            Self::WideResNet101_2 => ResNetAbstractConfig::wide_resnet101_2,
        };
        build(num_classes, num_input_channels, input_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet::bottleneck::BottleneckBlockMeta;
    use crate::models::resnet::layer_block::LayerBlockMeta;
    use crate::models::resnet::residual_block::{
        ResidualBlock, ResidualBlockConfig, ResidualBlockMeta,
    };
    use crate::models::resnet::resnet_model::{ForwardStop, ResNet, STAGE_PLANES};
    use burn::backend::NdArray;
    use burn::module::Module;
    use burn::tensor::{Distribution, Tensor};
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_preset_names() {
        let names: Vec<&'static str> = ResNetPreset::iter().map(|p| p.into()).collect();
        assert_eq!(
            names,
            vec![
                "resnet18",
                "resnet34",
                "resnet50",
                "resnet101",
                "resnet152",
                "resnext50_32x4d",
                "resnext101_32x8d",
                "wide_resnet50_2",
                "wide_resnet101_2",
            ]
        );
        for preset in ResNetPreset::iter() {
            assert_eq!(ResNetPreset::from_str(&preset.to_string()), Ok(preset));
        }
        assert!(ResNetPreset::from_str("resnet19").is_err());
    }

    #[test]
    fn test_preset_configs() {
        for preset in ResNetPreset::iter() {
            let config = preset.config(10, 3, 32);
            assert_eq!(config.num_classes, 10);
            assert_eq!(config.num_input_channels, 3);
            assert_eq!(config.input_size, 32);
            assert!(!config.zero_init_residual);

            let structure = config.try_to_structure().unwrap();
            let expansion = config.expansion();
            for (idx, stage) in structure.stages().into_iter().enumerate() {
                assert_eq!(stage.len(), config.layers[idx]);
                assert_eq!(stage.out_planes(), STAGE_PLANES[idx] * expansion);
            }
        }

        let config = ResNetAbstractConfig::resnext101_32x8d(10, 3, 32);
        assert_eq!(config.layers, [3, 4, 23, 3]);
        assert_eq!(config.groups, 32);
        assert_eq!(config.width_per_group, 8);

        let config = ResNetAbstractConfig::wide_resnet101_2(10, 3, 32)
            .with_zero_init_residual(true);
        assert_eq!(config.width_per_group, 128);
        assert!(config.zero_init_residual);
    }

    #[test]
    fn test_presets_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        for preset in ResNetPreset::iter() {
            let model: ResNet<B> = preset.config(6, 5, 32).try_init(&device).unwrap();

            let input: Tensor<B, 3> = Tensor::random([2, 5, 32], Distribution::Default, &device);
            let output = model
                .forward_until(input.clone(), ForwardStop::Logits)
                .into_flat()
                .unwrap();
            assert_eq!(output.dims(), [2, 6], "{preset}");

            // the first block of every stage outputs planes * expansion channels.
            let expansion = preset.config(6, 5, 32).expansion();
            for (idx, stage) in model.stages().into_iter().enumerate() {
                assert_eq!(stage.blocks[0].out_planes(), STAGE_PLANES[idx] * expansion);
            }
        }
    }

    #[test]
    fn test_first_block_channels_independent_of_input() {
        type B = NdArray<f32>;
        let device = Default::default();

        for in_channels in [1, 7] {
            let model: ResNet<B> = ResNetAbstractConfig::resnet18(3, in_channels, 32)
                .try_init(&device)
                .unwrap();
            let input: Tensor<B, 3> =
                Tensor::random([1, in_channels, 40], Distribution::Default, &device);
            let act = model.forward_until(input, ForwardStop::Stage1);
            assert_eq!(act.dims(), vec![1, 64, 10]);
        }
    }

    #[test]
    fn test_width_variants() {
        type B = NdArray<f32>;
        let device = Default::default();

        let resnet50: ResNet<B> = ResNetAbstractConfig::resnet50(10, 2, 32)
            .try_init(&device)
            .unwrap();
        let resnext50: ResNet<B> = ResNetAbstractConfig::resnext50_32x4d(10, 2, 32)
            .try_init(&device)
            .unwrap();
        let wide50: ResNet<B> = ResNetAbstractConfig::wide_resnet50_2(10, 2, 32)
            .try_init(&device)
            .unwrap();

        let depths = |model: &ResNet<B>| model.stages().map(|s| s.len());
        assert_eq!(depths(&resnet50), RESNET50_BLOCKS);
        assert_eq!(depths(&resnext50), RESNET50_BLOCKS);
        assert_eq!(depths(&wide50), RESNET50_BLOCKS);

        // same outer channels.
        assert_eq!(resnext50.feature_planes(), 2048);
        assert_eq!(wide50.feature_planes(), 2048);

        let widths = |model: &ResNet<B>| {
            model
                .blocks()
                .map(|block| match block {
                    ResidualBlock::Bottleneck(b) => b.width(),
                    ResidualBlock::Basic(_) => 0,
                })
                .collect::<Vec<_>>()
        };
        let first_widths = |model: &ResNet<B>| widths(model)[0];
        assert_eq!(first_widths(&resnet50), 64);
        assert_eq!(first_widths(&resnext50), 128);
        assert_eq!(first_widths(&wide50), 128);

        let p50 = resnet50.num_params();
        let px50 = resnext50.num_params();
        let pw50 = wide50.num_params();
        assert_ne!(p50, px50);
        assert_ne!(p50, pw50);
        assert!(pw50 > p50);
    }

    #[test]
    fn test_resnext_forward_and_resume() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet<B> = ResNetPreset::ResNeXt50_32x4d
            .config(4, 3, 32)
            .try_init(&device)
            .unwrap();

        let first = &model.layer1.blocks[0];
        match first {
            ResidualBlock::Bottleneck(block) => {
                assert_eq!(block.groups(), 32);
                assert_eq!(block.width(), 128);
            }
            ResidualBlock::Basic(_) => panic!("expected a bottleneck block"),
        }

        let input: Tensor<B, 3> = Tensor::random([2, 3, 32], Distribution::Default, &device);
        let full = model.forward(input.clone());
        assert_eq!(full.dims(), [2, 4]);

        for from in [ForwardStop::Stem, ForwardStop::Stage2, ForwardStop::Flatten] {
            let partial = model.forward_until(input.clone(), from);
            let resumed = model
                .forward_between(partial, ForwardStop::Logits)
                .unwrap()
                .into_flat()
                .unwrap();
            resumed.to_data().assert_eq(&full.to_data(), true);
        }
    }

    #[test]
    fn test_builders_override_preset_widths() {
        let config = ResNetAbstractConfig::resnext50_32x4d(10, 3, 32);
        assert_eq!((config.groups, config.width_per_group), (32, 4));

        // a later builder wins over the preset.
        let config = config.with_groups(1).with_width_per_group(64);
        assert_eq!((config.groups, config.width_per_group), (1, 64));
        let first_width = |config: &ResNetAbstractConfig| {
            match &config.try_to_structure().unwrap().layer1.blocks[0] {
                ResidualBlockConfig::Bottleneck(block) => block.width(),
                ResidualBlockConfig::Basic(_) => 0,
            }
        };
        assert_eq!(first_width(&config), 64);
        assert_eq!(first_width(&ResNetAbstractConfig::resnet50(10, 3, 32)), 64);
        assert_eq!(first_width(&ResNetAbstractConfig::resnext50_32x4d(10, 3, 32)), 128);

        let config = ResNetAbstractConfig::wide_resnet50_2(10, 3, 32).with_width_per_group(64);
        assert_eq!(config.width_per_group, 64);
    }
}
