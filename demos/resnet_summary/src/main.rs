use anyhow::Context;
use burn::backend::NdArray;
use burn::config::Config;
use clap::Parser;
use resnet_forge::models::resnet::{
    OutputPolicy, ResNet, ResNetConfig, ResNetVersion, StageConfig,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// ResNet model; a depth or a name, e.g. "50" or "resnet50".
    /// Use "list" to list the supported versions.
    #[arg(long, default_value = "resnet18")]
    model: String,

    /// Input channels.
    #[arg(long, default_value_t = 3)]
    channels: usize,

    /// Input height.
    #[arg(long, default_value_t = 224)]
    height: usize,

    /// Input width.
    #[arg(long, default_value_t = 224)]
    width: usize,

    /// Number of classes of the head.
    #[arg(long, default_value_t = 1000)]
    num_classes: usize,

    /// Build without the classification head.
    #[arg(long, default_value = "false")]
    no_top: bool,

    /// Head output: "logits", "log-softmax" or "softmax".
    #[arg(long, default_value = "logits")]
    output: String,

    /// Load the network config from a JSON file; overrides the shape flags.
    #[arg(long)]
    config: Option<String>,

    /// Save the resolved network config to a JSON file.
    #[arg(long)]
    save_config: Option<String>,

    /// Print the topology as JSON instead of a tree.
    #[arg(long, default_value = "false")]
    json: bool,

    /// Initialize the network and save its weights to this path.
    #[arg(long)]
    save_weights: Option<String>,
}

fn parse_output(name: &str) -> anyhow::Result<OutputPolicy> {
    match name {
        "logits" => Ok(OutputPolicy::CrossEntropy),
        "log-softmax" => Ok(OutputPolicy::NegativeLogLikelihood),
        "softmax" => Ok(OutputPolicy::Probabilities),
        other => anyhow::bail!("unknown output policy {other:?}"),
    }
}

fn list_versions() {
    for version in ResNetVersion::ALL {
        let StageConfig {
            block,
            block_counts,
        } = version.stage_config();
        println!(
            "{:<10} {:<10} {block_counts:?}",
            version.name(),
            block.to_string()
        );
    }
}

fn resolve_config(args: &Args) -> anyhow::Result<ResNetConfig> {
    if let Some(path) = &args.config {
        return ResNetConfig::load(path).with_context(|| format!("loading config {path}"));
    }

    let version: ResNetVersion = args.model.parse()?;
    Ok(
        ResNetConfig::from_shape(version, (args.channels, args.height, args.width))
            .with_num_classes(args.num_classes)
            .with_include_top(!args.no_top)
            .with_output(parse_output(&args.output)?),
    )
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resnet_forge=info,resnet_summary=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.model == "list" {
        list_versions();
        return Ok(());
    }

    let config = resolve_config(&args)?;
    if let Some(path) = &args.save_config {
        config
            .save(path)
            .with_context(|| format!("saving config {path}"))?;
        tracing::info!("config saved to {path}");
    }

    let graph = config.build_graph()?;
    if args.json {
        println!("{}", graph.to_json()?);
    } else {
        print!("{graph}");
    }

    if let Some(path) = &args.save_weights {
        let device = Default::default();
        let model: ResNet<NdArray> = graph.init(&config.initializer, &device)?;
        model.save_weights(path)?;
    }

    Ok(())
}
