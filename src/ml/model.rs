// ============================================================
// Layer 5 — Change Detection Models
// ============================================================
// Two detectors share the extractor and the change head:
//
//   SiameseResNet  pre ─┐
//                       ├─ extractor ─ |a − b| ─ head ─▶ change map
//                  post ┘
//
//   BitModel       pre ─ extractor ─ tokenizer ─┐
//                                               ├─ [pos] ─ encoder ─ split
//                  post ─ extractor ─ tokenizer ─┘                       │
//                                                                        ▼
//                  each map cross-attends its own tokens (or adds their sum)
//                                                                        │
//                                           |a − b| ─ head ─▶ change map ◀┘
//
// Both images go through the same extractor weights.

use anyhow::{bail, ensure, Result};
use burn::{module::Param, prelude::*};

use crate::domain::geometry::FEATURE_DIM;
use crate::domain::options::{PoolMode, PositionalEncoding, TokenizerKind};
use crate::domain::report::ComponentSummary;
use crate::ml::extractor::{FeatureExtractor, FeatureExtractorConfig};
use crate::ml::head::{ChangeHead, ChangeHeadConfig};
use crate::ml::position::{learned, sinusoid_1d, sinusoid_2d};
use crate::ml::tokenizer::{Tokenizer, TokenizerConfig};
use crate::ml::transformer::{
    additive_decode, TokenDecoder, TokenDecoderConfig, TokenEncoder, TokenEncoderConfig,
};

/// Reject pairs the extractor cannot consume.
pub fn check_pair(pre: [usize; 4], post: [usize; 4], input_nc: usize) -> Result<()> {
    ensure!(
        pre == post,
        "pre and post images must have the same shape, got {pre:?} and {post:?}"
    );
    ensure!(
        pre[1] == input_nc,
        "model expects {input_nc} input channels, got {}",
        pre[1]
    );
    ensure!(
        pre[0] > 0 && pre[2] > 0 && pre[3] > 0,
        "image batch must be non-empty, got {pre:?}"
    );
    Ok(())
}

pub(crate) fn component(name: &str, parameters: usize) -> ComponentSummary {
    ComponentSummary { name: name.to_string(), parameters }
}

fn head_config(extractor: &FeatureExtractorConfig, output_nc: usize, output_sigmoid: bool) -> ChangeHeadConfig {
    ChangeHeadConfig::new()
        .with_in_channels(extractor.feature_dim)
        .with_output_nc(output_nc)
        .with_output_sigmoid(output_sigmoid)
        .with_nearest_2x(!extractor.upsample_2x)
}

// ─── Baseline ─────────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct SiameseResNetConfig {
    #[config(default = "FeatureExtractorConfig::new()")]
    pub extractor:      FeatureExtractorConfig,
    #[config(default = 1)]
    pub output_nc:      usize,
    #[config(default = false)]
    pub output_sigmoid: bool,
}

impl SiameseResNetConfig {
    pub fn validate(&self) -> Result<()> {
        self.extractor.validate()?;
        ensure!(self.output_nc > 0, "output_nc must be positive");
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<SiameseResNet<B>> {
        self.validate()?;
        let extractor = self.extractor.init(device)?;
        let head = head_config(&self.extractor, self.output_nc, self.output_sigmoid).init(device);
        tracing::debug!(
            "Built siamese {} with {} stages",
            self.extractor.backbone,
            self.extractor.stages
        );
        Ok(SiameseResNet { extractor, head, input_nc: self.extractor.input_nc })
    }
}

#[derive(Module, Debug)]
pub struct SiameseResNet<B: Backend> {
    pub extractor: FeatureExtractor<B>,
    pub head:      ChangeHead<B>,
    pub input_nc:  usize,
}

impl<B: Backend> SiameseResNet<B> {
    /// pre, post: [batch, input_nc, H, W] → [batch, output_nc, H, W]
    pub fn forward(&self, pre: Tensor<B, 4>, post: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, h, w] = pre.dims();
        let a = self.extractor.forward(pre);
        let b = self.extractor.forward(post);
        self.head.forward(a, b, [h, w])
    }

    pub fn try_forward(&self, pre: Tensor<B, 4>, post: Tensor<B, 4>) -> Result<Tensor<B, 4>> {
        check_pair(pre.dims(), post.dims(), self.input_nc)?;
        Ok(self.forward(pre, post))
    }

    pub fn components(&self) -> Vec<ComponentSummary> {
        vec![
            component("backbone", self.extractor.backbone.num_params()),
            component("conv_pred", self.extractor.conv_pred.num_params()),
            component("classifier", self.head.num_params()),
        ]
    }
}

// ─── BIT ──────────────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct BitModelConfig {
    #[config(default = "FeatureExtractorConfig::new()")]
    pub extractor:        FeatureExtractorConfig,
    #[config(default = 1)]
    pub output_nc:        usize,
    #[config(default = false)]
    pub output_sigmoid:   bool,
    #[config(default = "TokenizerKind::Semantic")]
    pub tokenizer:        TokenizerKind,
    #[config(default = 4)]
    pub token_len:        usize,
    #[config(default = "PoolMode::Max")]
    pub pool_mode:        PoolMode,
    #[config(default = 2)]
    pub pool_size:        usize,
    /// Run the joint token encoder.
    #[config(default = true)]
    pub token_trans:      bool,
    #[config(default = 1)]
    pub enc_depth:        usize,
    #[config(default = 1)]
    pub dec_depth:        usize,
    #[config(default = 8)]
    pub heads:            usize,
    #[config(default = 64)]
    pub dim_head:         usize,
    #[config(default = 64)]
    pub decoder_dim_head: usize,
    #[config(default = 64)]
    pub mlp_dim:          usize,
    #[config(default = "PositionalEncoding::Learned")]
    pub with_pos:         PositionalEncoding,
    #[config(default = "PositionalEncoding::None")]
    pub with_decoder_pos: PositionalEncoding,
    /// Cross-attention decoder; otherwise token sums are added to the map.
    #[config(default = true)]
    pub with_decoder:     bool,
    #[config(default = true)]
    pub decoder_softmax:  bool,
    #[config(default = 0.0)]
    pub dropout:          f64,
}

impl BitModelConfig {
    fn tokenizer_config(&self) -> TokenizerConfig {
        TokenizerConfig::new()
            .with_dim(self.extractor.feature_dim)
            .with_kind(self.tokenizer)
            .with_token_len(self.token_len)
            .with_pool_mode(self.pool_mode)
            .with_pool_size(self.pool_size)
    }

    /// Tokens produced for one image.
    pub fn tokens_per_image(&self) -> usize {
        self.tokenizer_config().tokens_per_image()
    }

    pub fn validate(&self) -> Result<()> {
        self.extractor.validate()?;
        ensure!(self.output_nc > 0, "output_nc must be positive");
        match self.tokenizer {
            TokenizerKind::Semantic => ensure!(self.token_len > 0, "token_len must be positive"),
            TokenizerKind::Pooled => ensure!(self.pool_size > 0, "pool_size must be positive"),
        }
        ensure!(self.heads > 0, "heads must be positive");
        ensure!(
            self.dim_head > 0 && self.decoder_dim_head > 0,
            "attention head width must be positive"
        );
        ensure!(self.mlp_dim > 0, "mlp_dim must be positive");
        if !(0.0..1.0).contains(&self.dropout) {
            bail!("dropout must be in [0, 1), got {}", self.dropout);
        }
        if self.with_decoder_pos == PositionalEncoding::Learned && !self.with_decoder {
            tracing::warn!("with_decoder_pos is ignored when the decoder is disabled");
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<BitModel<B>> {
        self.validate()?;
        let dim = self.extractor.feature_dim;
        let decoder_extent = self.extractor.feature_side()?;
        let tokens = 2 * self.tokens_per_image();

        let extractor = self.extractor.init(device)?;
        let tokenizer = self.tokenizer_config().init(device);

        let encoder = self.token_trans.then(|| {
            TokenEncoderConfig::new(dim)
                .with_depth(self.enc_depth)
                .with_heads(self.heads)
                .with_dim_head(self.dim_head)
                .with_mlp_dim(self.mlp_dim)
                .with_dropout(self.dropout)
                .init(device)
        });
        let decoder = self.with_decoder.then(|| {
            TokenDecoderConfig::new(dim)
                .with_depth(self.dec_depth)
                .with_heads(self.heads)
                .with_dim_head(self.decoder_dim_head)
                .with_mlp_dim(self.mlp_dim)
                .with_dropout(self.dropout)
                .with_softmax(self.decoder_softmax)
                .init(device)
        });

        let pos_embedding = (self.token_trans && self.with_pos == PositionalEncoding::Learned)
            .then(|| learned([1, tokens, dim], device));
        let pos_embedding_decoder = (self.with_decoder
            && self.with_decoder_pos == PositionalEncoding::Learned)
            .then(|| learned([1, dim, decoder_extent, decoder_extent], device));

        let head = head_config(&self.extractor, self.output_nc, self.output_sigmoid).init(device);

        tracing::debug!(
            "Built BIT: {} tokens/image, encoder={}, decoder={}, decoder extent {}",
            self.tokens_per_image(),
            self.token_trans,
            self.with_decoder,
            decoder_extent
        );

        Ok(BitModel {
            extractor,
            tokenizer,
            encoder,
            decoder,
            pos_embedding,
            pos_embedding_decoder,
            head,
            fixed_pos:         self.with_pos == PositionalEncoding::Fixed,
            fixed_decoder_pos: self.with_decoder_pos == PositionalEncoding::Fixed,
            input_nc:          self.extractor.input_nc,
            decoder_extent,
        })
    }
}

#[derive(Module, Debug)]
pub struct BitModel<B: Backend> {
    pub extractor:             FeatureExtractor<B>,
    pub tokenizer:             Tokenizer<B>,
    pub encoder:               Option<TokenEncoder<B>>,
    /// `None` selects the additive decoder.
    pub decoder:               Option<TokenDecoder<B>>,
    pub pos_embedding:         Option<Param<Tensor<B, 3>>>,
    pub pos_embedding_decoder: Option<Param<Tensor<B, 4>>>,
    pub head:                  ChangeHead<B>,
    pub fixed_pos:             bool,
    pub fixed_decoder_pos:     bool,
    pub input_nc:              usize,
    pub decoder_extent:        usize,
}

/// Change map plus the token set after the encoder.
pub struct BitOutput<B: Backend> {
    /// [batch, output_nc, H, W]
    pub change: Tensor<B, 4>,
    /// [batch, 2·tokens, dim], pre tokens first
    pub tokens: Tensor<B, 3>,
}

impl<B: Backend> BitModel<B> {
    /// pre, post: [batch, input_nc, H, W] → [batch, output_nc, H, W]
    ///
    /// # Panics
    ///
    /// When the pair shapes disagree, or when a learned decoder position
    /// table meets a feature map of another extent (an input side other
    /// than `image_size`). `try_forward` reports both as errors.
    pub fn forward(&self, pre: Tensor<B, 4>, post: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward_output(pre, post).change
    }

    /// `forward` that also returns the encoded tokens. Panics as `forward` does.
    pub fn forward_output(&self, pre: Tensor<B, 4>, post: Tensor<B, 4>) -> BitOutput<B> {
        let [_, _, h, w] = pre.dims();
        let a = self.extractor.forward(pre);
        let b = self.extractor.forward(post);
        self.forward_features(a, b, [h, w])
    }

    /// Same as `forward`, but shape problems come back as errors.
    pub fn try_forward(&self, pre: Tensor<B, 4>, post: Tensor<B, 4>) -> Result<Tensor<B, 4>> {
        check_pair(pre.dims(), post.dims(), self.input_nc)?;
        let [_, _, h, w] = pre.dims();
        let a = self.extractor.forward(pre);
        let b = self.extractor.forward(post);

        if self.pos_embedding_decoder.is_some() {
            let [_, _, fh, fw] = a.dims();
            ensure!(
                fh == self.decoder_extent && fw == self.decoder_extent,
                "learned decoder position expects a {s}x{s} feature map, input {h}x{w} gives {fh}x{fw}",
                s = self.decoder_extent
            );
        }
        Ok(self.forward_features(a, b, [h, w]).change)
    }

    fn forward_features(&self, a: Tensor<B, 4>, b: Tensor<B, 4>, size: [usize; 2]) -> BitOutput<B> {
        let tokens = Tensor::cat(
            vec![self.tokenizer.forward(a.clone()), self.tokenizer.forward(b.clone())],
            1,
        );
        let tokens = match &self.encoder {
            Some(encoder) => encoder.forward(self.add_token_position(tokens)),
            None => tokens,
        };

        let [batch, n, dim] = tokens.dims();
        let half = n / 2;
        let tokens_a = tokens.clone().slice([0..batch, 0..half, 0..dim]);
        let tokens_b = tokens.clone().slice([0..batch, half..n, 0..dim]);

        let a = self.decode(a, tokens_a);
        let b = self.decode(b, tokens_b);
        BitOutput { change: self.head.forward(a, b, size), tokens }
    }

    fn add_token_position(&self, tokens: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, n, dim] = tokens.dims();
        if let Some(pos) = &self.pos_embedding {
            tokens + pos.val().expand([batch, n, dim])
        } else if self.fixed_pos {
            let table = sinusoid_1d::<B>(n, dim, &tokens.device());
            tokens + table.expand([batch, n, dim])
        } else {
            tokens
        }
    }

    fn add_map_position(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, c, h, w] = x.dims();
        if let Some(pos) = &self.pos_embedding_decoder {
            x + pos.val().expand([batch, c, h, w])
        } else if self.fixed_decoder_pos {
            let table = sinusoid_2d::<B>(c, h, w, &x.device());
            x + table.expand([batch, c, h, w])
        } else {
            x
        }
    }

    fn decode(&self, x: Tensor<B, 4>, tokens: Tensor<B, 3>) -> Tensor<B, 4> {
        match &self.decoder {
            Some(decoder) => decoder.forward_map(self.add_map_position(x), tokens),
            None => additive_decode(x, tokens),
        }
    }

    pub fn components(&self) -> Vec<ComponentSummary> {
        let mut parts = vec![
            component("backbone", self.extractor.backbone.num_params()),
            component("conv_pred", self.extractor.conv_pred.num_params()),
            component("tokenizer", self.tokenizer.num_params()),
        ];
        if let Some(pos) = &self.pos_embedding {
            parts.push(component("pos_embedding", pos.val().shape().num_elements()));
        }
        if let Some(encoder) = &self.encoder {
            parts.push(component("encoder", encoder.num_params()));
        }
        if let Some(pos) = &self.pos_embedding_decoder {
            parts.push(component("pos_embedding_decoder", pos.val().shape().num_elements()));
        }
        if let Some(decoder) = &self.decoder {
            parts.push(component("decoder", decoder.num_params()));
        }
        parts.push(component("classifier", self.head.num_params()));
        parts
    }
}

impl BitModelConfig {
    /// Default BIT model for a given input size and backbone depth.
    pub fn for_image(image_size: usize, stages: usize) -> Self {
        Self::new().with_extractor(
            FeatureExtractorConfig::new()
                .with_image_size(image_size)
                .with_stages(stages)
                .with_feature_dim(FEATURE_DIM),
        )
    }
}
