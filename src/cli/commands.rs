// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands `summary`, `probe` and `init-config`
// and the model flags they share.
//
// Every command builds its DetectorConfig the same way: either
// from `--config <file.json>`, or from the model flags below.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::application::probe_use_case::ProbeConfig;
use crate::domain::options::{Architecture, Backbone, PoolMode, PositionalEncoding, TokenizerKind};
use crate::infra::config_store::ConfigStore;
use crate::ml::detector::DetectorConfig;
use crate::ml::extractor::FeatureExtractorConfig;
use crate::ml::model::{BitModelConfig, SiameseResNetConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the parameter count of every model component
    Summary(SummaryArgs),

    /// Run a randomly initialised model on synthetic image pairs
    Probe(ProbeArgs),

    /// Write the model flags out as a JSON config
    InitConfig(InitConfigArgs),
}

/// Model architecture flags shared by all commands.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Load the model from a JSON config instead of the flags below
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// baseline (siamese ResNet) or bit (bi-temporal image transformer)
    #[arg(long, default_value = "bit")]
    pub architecture: Architecture,

    /// resnet18, resnet34 or resnet50
    #[arg(long, default_value = "resnet18")]
    pub backbone: Backbone,

    /// Backbone depth, the stem counts as one stage (3, 4 or 5)
    #[arg(long, default_value_t = 4)]
    pub stages: usize,

    /// Square input side the position tables are sized for
    #[arg(long, default_value_t = 256)]
    pub image_size: usize,

    #[arg(long, default_value_t = 3)]
    pub input_nc: usize,

    #[arg(long, default_value_t = 1)]
    pub output_nc: usize,

    /// Squash the change map with a sigmoid inside the model
    #[arg(long)]
    pub output_sigmoid: bool,

    /// Skip the ×2 upsampling after the backbone
    #[arg(long)]
    pub no_upsample_2x: bool,

    /// semantic (learned attention pooling) or pooled (grid pooling)
    #[arg(long, default_value = "semantic")]
    pub tokenizer: TokenizerKind,

    #[arg(long, default_value_t = 4)]
    pub token_len: usize,

    /// max or ave
    #[arg(long, default_value = "max")]
    pub pool_mode: PoolMode,

    #[arg(long, default_value_t = 2)]
    pub pool_size: usize,

    /// Skip the joint token encoder
    #[arg(long)]
    pub no_token_trans: bool,

    #[arg(long, default_value_t = 1)]
    pub enc_depth: usize,

    #[arg(long, default_value_t = 1)]
    pub dec_depth: usize,

    #[arg(long, default_value_t = 8)]
    pub heads: usize,

    #[arg(long, default_value_t = 64)]
    pub dim_head: usize,

    #[arg(long, default_value_t = 64)]
    pub decoder_dim_head: usize,

    #[arg(long, default_value_t = 64)]
    pub mlp_dim: usize,

    /// none, fixed or learned
    #[arg(long, default_value = "learned")]
    pub with_pos: PositionalEncoding,

    /// none, fixed or learned
    #[arg(long, default_value = "none")]
    pub with_decoder_pos: PositionalEncoding,

    /// Replace the cross-attention decoder by token sums
    #[arg(long)]
    pub no_decoder: bool,

    /// Use raw dot products in the decoder's cross-attention
    #[arg(long)]
    pub no_decoder_softmax: bool,
}

impl ModelArgs {
    /// The config file if one was given, otherwise the flags.
    pub fn resolve(self) -> Result<DetectorConfig> {
        match &self.config {
            Some(path) => {
                tracing::info!("Loading detector config from '{}'", path.display());
                ConfigStore::load_file(path)
            }
            None => Ok(self.into()),
        }
    }
}

/// Convert CLI ModelArgs into the ML-layer DetectorConfig.
/// The ml layer never sees clap types.
impl From<ModelArgs> for DetectorConfig {
    fn from(a: ModelArgs) -> Self {
        let extractor = FeatureExtractorConfig::new()
            .with_input_nc(a.input_nc)
            .with_image_size(a.image_size)
            .with_backbone(a.backbone)
            .with_stages(a.stages)
            .with_upsample_2x(!a.no_upsample_2x);

        match a.architecture {
            Architecture::Baseline => DetectorConfig::Baseline(
                SiameseResNetConfig::new()
                    .with_extractor(extractor)
                    .with_output_nc(a.output_nc)
                    .with_output_sigmoid(a.output_sigmoid),
            ),
            Architecture::Bit => DetectorConfig::Bit(
                BitModelConfig::new()
                    .with_extractor(extractor)
                    .with_output_nc(a.output_nc)
                    .with_output_sigmoid(a.output_sigmoid)
                    .with_tokenizer(a.tokenizer)
                    .with_token_len(a.token_len)
                    .with_pool_mode(a.pool_mode)
                    .with_pool_size(a.pool_size)
                    .with_token_trans(!a.no_token_trans)
                    .with_enc_depth(a.enc_depth)
                    .with_dec_depth(a.dec_depth)
                    .with_heads(a.heads)
                    .with_dim_head(a.dim_head)
                    .with_decoder_dim_head(a.decoder_dim_head)
                    .with_mlp_dim(a.mlp_dim)
                    .with_with_pos(a.with_pos)
                    .with_with_decoder_pos(a.with_decoder_pos)
                    .with_with_decoder(!a.no_decoder)
                    .with_decoder_softmax(!a.no_decoder_softmax),
            ),
        }
    }
}

#[derive(Args, Debug)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Also write summary.csv and summary.json into this directory
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    #[arg(long, default_value_t = 2)]
    pub batch_size: usize,

    /// Side of the synthetic images, defaults to the model's image size
    #[arg(long)]
    pub size: Option<usize>,

    /// Seed for the synthetic pair generator
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Share of each image that changes between the two time steps
    #[arg(long, default_value_t = 0.25)]
    pub change_fraction: f64,

    /// Probability at or above which a pixel counts as changed
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f32,

    /// Append the result to probes.csv in this directory
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

impl From<&ProbeArgs> for ProbeConfig {
    fn from(a: &ProbeArgs) -> Self {
        ProbeConfig { batch_size: a.batch_size, threshold: a.threshold }
    }
}

#[derive(Args, Debug)]
pub struct InitConfigArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Directory to write detector_config.json into
    #[arg(long, default_value = "configs")]
    pub out_dir: PathBuf,
}
