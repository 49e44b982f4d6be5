// ============================================================
// Layer 5 — Token Encoder / Decoder
// ============================================================
// Pre-norm transformer stacks.
//
//   Encoder layer:  x = x + SelfAttn(LN(x))
//                   x = x + FF(LN(x))
//
//   Decoder layer:  x = x + CrossAttn(LN(x), LN(m))
//                   x = x + FF(LN(x))
//
// In the decoder the queries are the h·w pixels of one image and
// the memory is that image's token set; the same LayerNorm is
// applied to both sides of the cross-attention.

use burn::{
    nn::{LayerNorm, LayerNormConfig},
    prelude::*,
};

use crate::ml::attention::{
    AttentionConfig, CrossAttention, FeedForward, FeedForwardConfig, SelfAttention,
};

#[derive(Config, Debug)]
pub struct TokenEncoderConfig {
    pub dim:      usize,
    #[config(default = 1)]
    pub depth:    usize,
    #[config(default = 8)]
    pub heads:    usize,
    #[config(default = 64)]
    pub dim_head: usize,
    #[config(default = 64)]
    pub mlp_dim:  usize,
    #[config(default = 0.0)]
    pub dropout:  f64,
}

impl TokenEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TokenEncoder<B> {
        let attn = AttentionConfig::new(self.dim)
            .with_heads(self.heads)
            .with_dim_head(self.dim_head)
            .with_dropout(self.dropout);
        let ff = FeedForwardConfig::new(self.dim, self.mlp_dim).with_dropout(self.dropout);

        let layers = (0..self.depth)
            .map(|_| EncoderLayer {
                norm_attn: LayerNormConfig::new(self.dim).init(device),
                attn:      attn.init_self(device),
                norm_ff:   LayerNormConfig::new(self.dim).init(device),
                ff:        ff.init(device),
            })
            .collect();
        TokenEncoder { layers }
    }
}

#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    pub norm_attn: LayerNorm<B>,
    pub attn:      SelfAttention<B>,
    pub norm_ff:   LayerNorm<B>,
    pub ff:        FeedForward<B>,
}

impl<B: Backend> EncoderLayer<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = x.clone() + self.attn.forward(self.norm_attn.forward(x));
        x.clone() + self.ff.forward(self.norm_ff.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct TokenEncoder<B: Backend> {
    pub layers: Vec<EncoderLayer<B>>,
}

impl<B: Backend> TokenEncoder<B> {
    /// tokens: [b, n, dim] → [b, n, dim]
    pub fn forward(&self, tokens: Tensor<B, 3>) -> Tensor<B, 3> {
        self.layers.iter().fold(tokens, |x, layer| layer.forward(x))
    }
}

#[derive(Config, Debug)]
pub struct TokenDecoderConfig {
    pub dim:      usize,
    #[config(default = 1)]
    pub depth:    usize,
    #[config(default = 8)]
    pub heads:    usize,
    #[config(default = 64)]
    pub dim_head: usize,
    #[config(default = 64)]
    pub mlp_dim:  usize,
    #[config(default = 0.0)]
    pub dropout:  f64,
    #[config(default = true)]
    pub softmax:  bool,
}

impl TokenDecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TokenDecoder<B> {
        let attn = AttentionConfig::new(self.dim)
            .with_heads(self.heads)
            .with_dim_head(self.dim_head)
            .with_dropout(self.dropout)
            .with_softmax(self.softmax);
        let ff = FeedForwardConfig::new(self.dim, self.mlp_dim).with_dropout(self.dropout);

        let layers = (0..self.depth)
            .map(|_| DecoderLayer {
                norm_attn: LayerNormConfig::new(self.dim).init(device),
                attn:      attn.init_cross(device),
                norm_ff:   LayerNormConfig::new(self.dim).init(device),
                ff:        ff.init(device),
            })
            .collect();
        TokenDecoder { layers }
    }
}

#[derive(Module, Debug)]
pub struct DecoderLayer<B: Backend> {
    pub norm_attn: LayerNorm<B>,
    pub attn:      CrossAttention<B>,
    pub norm_ff:   LayerNorm<B>,
    pub ff:        FeedForward<B>,
}

impl<B: Backend> DecoderLayer<B> {
    pub fn forward(&self, x: Tensor<B, 3>, memory: Tensor<B, 3>) -> Tensor<B, 3> {
        let attended = self.attn.forward(
            self.norm_attn.forward(x.clone()),
            self.norm_attn.forward(memory),
        );
        let x = x + attended;
        x.clone() + self.ff.forward(self.norm_ff.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct TokenDecoder<B: Backend> {
    pub layers: Vec<DecoderLayer<B>>,
}

impl<B: Backend> TokenDecoder<B> {
    /// x: [b, n, dim] pixels, memory: [b, l, dim] tokens → [b, n, dim]
    pub fn forward(&self, x: Tensor<B, 3>, memory: Tensor<B, 3>) -> Tensor<B, 3> {
        self.layers
            .iter()
            .fold(x, |x, layer| layer.forward(x, memory.clone()))
    }

    /// Refine a feature map in place of its pixels.
    /// x: [b, c, h, w], memory: [b, l, c] → [b, c, h, w]
    pub fn forward_map(&self, x: Tensor<B, 4>, memory: Tensor<B, 3>) -> Tensor<B, 4> {
        let [b, c, h, w] = x.dims();
        let pixels = x.reshape([b, c, h * w]).swap_dims(1, 2);
        self.forward(pixels, memory)
            .swap_dims(1, 2)
            .reshape([b, c, h, w])
    }
}

/// Decoder used when cross-attention is disabled: every pixel
/// receives the sum of the image's tokens.
/// x: [b, c, h, w], tokens: [b, l, c] → [b, c, h, w]
pub fn additive_decode<B: Backend>(x: Tensor<B, 4>, tokens: Tensor<B, 3>) -> Tensor<B, 4> {
    let [b, c, h, w] = x.dims();
    let summed = tokens.sum_dim(1).reshape([b, c, 1, 1]).expand([b, c, h, w]);
    x + summed
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    #[test]
    fn test_encoder_depth_and_shape() {
        let device = Default::default();
        let encoder = TokenEncoderConfig::new(32).with_depth(3).init::<TestBackend>(&device);
        assert_eq!(encoder.layers.len(), 3);
        let tokens = Tensor::<TestBackend, 3>::random([2, 8, 32], Distribution::Default, &device);
        assert_eq!(encoder.forward(tokens).dims(), [2, 8, 32]);
    }

    #[test]
    fn test_zero_depth_encoder_is_identity() {
        let device = Default::default();
        let encoder = TokenEncoderConfig::new(32).with_depth(0).init::<TestBackend>(&device);
        let tokens = Tensor::<TestBackend, 3>::random([1, 4, 32], Distribution::Default, &device);
        let out = encoder.forward(tokens.clone());
        assert_eq!(
            out.into_data().to_vec::<f32>().unwrap(),
            tokens.into_data().to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn test_decoder_restores_map_layout() {
        let device = Default::default();
        let decoder = TokenDecoderConfig::new(32).with_depth(2).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random([2, 32, 3, 5], Distribution::Default, &device);
        let tokens = Tensor::<TestBackend, 3>::random([2, 4, 32], Distribution::Default, &device);
        assert_eq!(decoder.forward_map(x, tokens).dims(), [2, 32, 3, 5]);
    }

    #[test]
    fn test_additive_decode_adds_token_sum_everywhere() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::zeros([1, 2, 2, 2], &device);
        // two tokens: [1, 10] and [2, 20] → per-channel sums 3 and 30
        let tokens = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(vec![1.0f32, 10.0, 2.0, 20.0], [1, 2, 2]),
            &device,
        );
        let out = additive_decode(x, tokens).into_data().to_vec::<f32>().unwrap();
        assert_eq!(out, vec![3.0, 3.0, 3.0, 3.0, 30.0, 30.0, 30.0, 30.0]);
    }
}
