use burn::backend::NdArray;
use burn::module::Module;
use burn::tensor::{Distribution, Tensor};
use clap::Parser;
use resnet1d::models::resnet::{ForwardStop, ResNet, ResNetPreset};
use strum::IntoEnumIterator;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Preset name; see `--list`.
    #[arg(long, default_value = "resnet18")]
    preset: ResNetPreset,

    /// List the preset names and exit.
    #[arg(long)]
    list: bool,

    #[arg(long, default_value = "10")]
    num_classes: usize,

    #[arg(long, default_value = "3")]
    num_input_channels: usize,

    /// Legacy input size hint; 64 widens the classifier input.
    #[arg(long, default_value = "32")]
    input_size: usize,

    #[arg(long, default_value = "2")]
    batch: usize,

    /// Length of the random probe signal.
    #[arg(long, default_value = "256")]
    length: usize,

    #[arg(long)]
    zero_init_residual: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::debug!(?args, "parsed arguments");

    if args.list {
        for preset in ResNetPreset::iter() {
            println!("{preset}");
        }
        return Ok(());
    }

    type B = NdArray<f32>;
    let device = Default::default();

    let model: ResNet<B> = args
        .preset
        .config(args.num_classes, args.num_input_channels, args.input_size)
        .with_zero_init_residual(args.zero_init_residual)
        .try_init(&device)?;

    println!("{}: {} parameters", args.preset, model.num_params());

    let input: Tensor<B, 3> = Tensor::random(
        [args.batch, args.num_input_channels, args.length],
        Distribution::Default,
        &device,
    );

    let mut activation = model.forward_until(input, ForwardStop::Input);
    for stop in ForwardStop::iter() {
        if stop == ForwardStop::Logits && model.feature_planes() != model.head_planes() {
            println!(
                "{:>2} {:<8} skipped: classifier expects {} features, got {}",
                stop.index(),
                stop,
                model.head_planes(),
                model.feature_planes(),
            );
            break;
        }
        activation = model.forward_between(activation, stop)?;
        println!("{:>2} {:<8} {:?}", stop.index(), stop, activation.dims());
    }

    Ok(())
}
