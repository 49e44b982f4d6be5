// ============================================================
// Layer 5 — Tokenizers
// ============================================================
// Compress a dense feature map [b, c, h, w] into a handful of
// tokens [b, l, c] that the transformer can afford to attend
// over jointly for both time steps.
//
//   Semantic — a 1x1 conv predicts one spatial attention map per
//              token; each map is softmax-normalised over all h·w
//              positions and used as pooling weights:
//                tokens[b,l,c] = Σ_n softmax(a)[b,l,n] · x[b,c,n]
//
//   Pooled   — adaptive max/average pooling to a p×p grid, every
//              cell becomes a token (row-major order).

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    tensor::{activation::softmax, module::adaptive_avg_pool2d},
};

use crate::domain::geometry::{adaptive_bins, tokens_per_image};
use crate::domain::options::{PoolMode, TokenizerKind};

#[derive(Config, Debug)]
pub struct TokenizerConfig {
    #[config(default = 32)]
    pub dim:       usize,
    #[config(default = "TokenizerKind::Semantic")]
    pub kind:      TokenizerKind,
    #[config(default = 4)]
    pub token_len: usize,
    #[config(default = "PoolMode::Max")]
    pub pool_mode: PoolMode,
    #[config(default = 2)]
    pub pool_size: usize,
}

impl TokenizerConfig {
    pub fn tokens_per_image(&self) -> usize {
        tokens_per_image(self.kind, self.token_len, self.pool_size)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Tokenizer<B> {
        match self.kind {
            TokenizerKind::Semantic => Tokenizer::Semantic(SemanticTokenizer {
                conv_a: Conv2dConfig::new([self.dim, self.token_len], [1, 1])
                    .with_padding(PaddingConfig2d::Valid)
                    .with_bias(false)
                    .init(device),
                token_len: self.token_len,
            }),
            TokenizerKind::Pooled => Tokenizer::Pooled(GridPoolTokenizer {
                grid:    self.pool_size,
                use_max: self.pool_mode == PoolMode::Max,
            }),
        }
    }
}

#[derive(Module, Debug)]
pub enum Tokenizer<B: Backend> {
    Semantic(SemanticTokenizer<B>),
    Pooled(GridPoolTokenizer),
}

impl<B: Backend> Tokenizer<B> {
    /// x: [b, c, h, w] → tokens: [b, l, c]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 3> {
        match self {
            Self::Semantic(t) => t.forward(x),
            Self::Pooled(t)   => t.forward(x),
        }
    }
}

#[derive(Module, Debug)]
pub struct SemanticTokenizer<B: Backend> {
    pub conv_a:    Conv2d<B>,
    pub token_len: usize,
}

impl<B: Backend> SemanticTokenizer<B> {
    /// Softmax-normalised spatial attention, [b, l, h·w]
    pub fn attention(&self, x: Tensor<B, 4>) -> Tensor<B, 3> {
        let [b, _, h, w] = x.dims();
        let logits = self.conv_a.forward(x).reshape([b, self.token_len, h * w]);
        softmax(logits, 2)
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 3> {
        let [b, c, h, w] = x.dims();
        let attn = self.attention(x.clone());
        // [b, l, n] x [b, n, c] → [b, l, c]
        attn.matmul(x.reshape([b, c, h * w]).swap_dims(1, 2))
    }
}

#[derive(Module, Clone, Debug)]
pub struct GridPoolTokenizer {
    pub grid:    usize,
    pub use_max: bool,
}

impl GridPoolTokenizer {
    pub fn forward<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 3> {
        let [b, c, _, _] = x.dims();
        let pooled = if self.use_max {
            adaptive_max_pool(x, self.grid)
        } else {
            adaptive_avg_pool2d(x, [self.grid, self.grid])
        };
        pooled.reshape([b, c, self.grid * self.grid]).swap_dims(1, 2)
    }
}

/// Adaptive max pooling with the same window rule as adaptive average pooling.
fn adaptive_max_pool<B: Backend>(x: Tensor<B, 4>, output: usize) -> Tensor<B, 4> {
    let [b, c, h, w] = x.dims();
    let cols = adaptive_bins(w, output);

    let rows: Vec<Tensor<B, 4>> = adaptive_bins(h, output)
        .into_iter()
        .map(|row| {
            let cells: Vec<Tensor<B, 4>> = cols
                .iter()
                .map(|col| {
                    x.clone()
                        .slice([0..b, 0..c, row.clone(), col.clone()])
                        .max_dim(3)
                        .max_dim(2)
                })
                .collect();
            Tensor::cat(cells, 3)
        })
        .collect();

    Tensor::cat(rows, 2)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::Initializer;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn ramp(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 4> {
        let values: Vec<f32> = (0..16).map(|v| v as f32).collect();
        Tensor::from_data(TensorData::new(values, [1, 1, 4, 4]), device)
    }

    #[test]
    fn test_semantic_tokens_shape() {
        let device = Default::default();
        let tokenizer = TokenizerConfig::new().with_token_len(6).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random([2, 32, 5, 7], Distribution::Default, &device);
        assert_eq!(tokenizer.forward(x).dims(), [2, 6, 32]);
    }

    #[test]
    fn test_semantic_attention_sums_to_one() {
        let device = Default::default();
        let tokenizer = TokenizerConfig::new().init::<TestBackend>(&device);
        let Tokenizer::Semantic(semantic) = tokenizer else {
            panic!("default tokenizer is semantic");
        };
        let x = Tensor::<TestBackend, 4>::random([1, 32, 4, 4], Distribution::Default, &device);
        let sums = semantic.attention(x).sum_dim(2).into_data().to_vec::<f32>().unwrap();
        assert_eq!(sums.len(), 4);
        for s in sums {
            assert!((s - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_uniform_attention_gives_spatial_mean() {
        let device = Default::default();
        // zero logits → uniform weights → every token is the channel mean
        let semantic = SemanticTokenizer::<TestBackend> {
            conv_a: Conv2dConfig::new([1, 3], [1, 1])
                .with_bias(false)
                .with_initializer(Initializer::Zeros)
                .init(&device),
            token_len: 3,
        };
        let tokens = semantic.forward(ramp(&device));
        assert_eq!(tokens.dims(), [1, 3, 1]);
        for v in tokens.into_data().to_vec::<f32>().unwrap() {
            assert!((v - 7.5).abs() < 1e-4);
        }
    }

    #[test]
    fn test_max_pooled_tokens_are_row_major() {
        let device = Default::default();
        let tokenizer = GridPoolTokenizer { grid: 2, use_max: true };
        let tokens = tokenizer.forward(ramp(&device));
        assert_eq!(tokens.dims(), [1, 4, 1]);
        assert_eq!(tokens.into_data().to_vec::<f32>().unwrap(), vec![5.0, 7.0, 13.0, 15.0]);
    }

    #[test]
    fn test_average_pooled_tokens() {
        let device = Default::default();
        let tokenizer = TokenizerConfig::new()
            .with_kind(TokenizerKind::Pooled)
            .with_pool_mode(PoolMode::Average)
            .init::<TestBackend>(&device);
        let tokens = tokenizer.forward(ramp(&device)).into_data().to_vec::<f32>().unwrap();
        let expected = [2.5, 4.5, 10.5, 12.5];
        for (got, want) in tokens.iter().zip(expected) {
            assert!((got - want).abs() < 1e-5);
        }
    }

    #[test]
    fn test_max_pool_handles_uneven_windows() {
        let device = Default::default();
        let values: Vec<f32> = (0..9).map(|v| v as f32).collect();
        let x = Tensor::<TestBackend, 4>::from_data(TensorData::new(values, [1, 1, 3, 3]), &device);
        // windows 0..2 and 1..3 overlap on the middle row/column
        let pooled = adaptive_max_pool(x, 2).into_data().to_vec::<f32>().unwrap();
        assert_eq!(pooled, vec![4.0, 5.0, 7.0, 8.0]);
    }
}
