// ============================================================
// Layer 5 — Attention Blocks
// ============================================================
// Multi-head self- and cross-attention used by the token
// encoder and decoder.
//
// Burn's own MultiHeadAttention scales by 1/sqrt(d_head) and always
// applies softmax. These blocks scale by 1/sqrt(dim) (the model
// width, not the head width) and the cross-attention can skip the
// softmax and use raw dot products as mixing weights.

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::{gelu, softmax},
};

#[derive(Config, Debug)]
pub struct AttentionConfig {
    pub dim:      usize,
    #[config(default = 8)]
    pub heads:    usize,
    #[config(default = 64)]
    pub dim_head: usize,
    #[config(default = 0.0)]
    pub dropout:  f64,
    /// Normalise the attention weights with softmax (cross-attention only).
    #[config(default = true)]
    pub softmax:  bool,
}

impl AttentionConfig {
    fn inner_dim(&self) -> usize {
        self.heads * self.dim_head
    }

    fn scale(&self) -> f64 {
        (self.dim as f64).powf(-0.5)
    }

    fn out_projection<B: Backend>(&self, device: &B::Device) -> Linear<B> {
        LinearConfig::new(self.inner_dim(), self.dim).init(device)
    }

    pub fn init_self<B: Backend>(&self, device: &B::Device) -> SelfAttention<B> {
        SelfAttention {
            to_qkv:  LinearConfig::new(self.dim, self.inner_dim() * 3)
                .with_bias(false)
                .init(device),
            to_out:  self.out_projection(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            heads:   self.heads,
            scale:   self.scale(),
        }
    }

    pub fn init_cross<B: Backend>(&self, device: &B::Device) -> CrossAttention<B> {
        let proj = || {
            LinearConfig::new(self.dim, self.inner_dim())
                .with_bias(false)
                .init(device)
        };
        CrossAttention {
            to_q:    proj(),
            to_k:    proj(),
            to_v:    proj(),
            to_out:  self.out_projection(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            heads:   self.heads,
            scale:   self.scale(),
            softmax: self.softmax,
        }
    }
}

/// [b, n, h·d] → [b, h, n, d]
fn split_heads<B: Backend>(x: Tensor<B, 3>, heads: usize) -> Tensor<B, 4> {
    let [b, n, inner] = x.dims();
    x.reshape([b, n, heads, inner / heads]).swap_dims(1, 2)
}

/// [b, h, n, d] → [b, n, h·d]
fn merge_heads<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 3> {
    let [b, h, n, d] = x.dims();
    x.swap_dims(1, 2).reshape([b, n, h * d])
}

fn attend<B: Backend>(
    q: Tensor<B, 4>,
    k: Tensor<B, 4>,
    v: Tensor<B, 4>,
    scale: f64,
    normalise: bool,
) -> Tensor<B, 4> {
    let dots = q.matmul(k.swap_dims(2, 3)).mul_scalar(scale);
    let weights = if normalise { softmax(dots, 3) } else { dots };
    weights.matmul(v)
}

#[derive(Module, Debug)]
pub struct SelfAttention<B: Backend> {
    pub to_qkv:  Linear<B>,
    pub to_out:  Linear<B>,
    pub dropout: Dropout,
    pub heads:   usize,
    pub scale:   f64,
}

impl<B: Backend> SelfAttention<B> {
    /// x: [b, n, dim] → [b, n, dim]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [b, n, _] = x.dims();
        let qkv = self.to_qkv.forward(x);
        let inner = qkv.dims()[2] / 3;

        let q = qkv.clone().slice([0..b, 0..n, 0..inner]);
        let k = qkv.clone().slice([0..b, 0..n, inner..2 * inner]);
        let v = qkv.slice([0..b, 0..n, 2 * inner..3 * inner]);

        let out = attend(
            split_heads(q, self.heads),
            split_heads(k, self.heads),
            split_heads(v, self.heads),
            self.scale,
            true,
        );
        self.dropout.forward(self.to_out.forward(merge_heads(out)))
    }
}

#[derive(Module, Debug)]
pub struct CrossAttention<B: Backend> {
    pub to_q:    Linear<B>,
    pub to_k:    Linear<B>,
    pub to_v:    Linear<B>,
    pub to_out:  Linear<B>,
    pub dropout: Dropout,
    pub heads:   usize,
    pub scale:   f64,
    pub softmax: bool,
}

impl<B: Backend> CrossAttention<B> {
    /// x: [b, n, dim] queries, memory: [b, m, dim] → [b, n, dim]
    pub fn forward(&self, x: Tensor<B, 3>, memory: Tensor<B, 3>) -> Tensor<B, 3> {
        let q = split_heads(self.to_q.forward(x), self.heads);
        let k = split_heads(self.to_k.forward(memory.clone()), self.heads);
        let v = split_heads(self.to_v.forward(memory), self.heads);

        let out = attend(q, k, v, self.scale, self.softmax);
        self.dropout.forward(self.to_out.forward(merge_heads(out)))
    }
}

#[derive(Config, Debug)]
pub struct FeedForwardConfig {
    pub dim:        usize,
    pub hidden_dim: usize,
    #[config(default = 0.0)]
    pub dropout:    f64,
}

impl FeedForwardConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeedForward<B> {
        FeedForward {
            linear1: LinearConfig::new(self.dim, self.hidden_dim).init(device),
            linear2: LinearConfig::new(self.hidden_dim, self.dim).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    pub linear1: Linear<B>,
    pub linear2: Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let x = self.dropout.forward(gelu(self.linear1.forward(x)));
        self.dropout.forward(self.linear2.forward(x))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    #[test]
    fn test_self_attention_preserves_shape() {
        let device = Default::default();
        let attn = AttentionConfig::new(32).init_self::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::random([2, 8, 32], Distribution::Default, &device);
        assert_eq!(attn.forward(x).dims(), [2, 8, 32]);
    }

    #[test]
    fn test_scale_uses_model_width() {
        let device = Default::default();
        let attn = AttentionConfig::new(64)
            .with_heads(4)
            .with_dim_head(16)
            .init_self::<TestBackend>(&device);
        assert!((attn.scale - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_parameter_count() {
        let device = Default::default();
        let attn = AttentionConfig::new(32).init_self::<TestBackend>(&device);
        // qkv without bias + output projection with bias
        assert_eq!(attn.num_params(), 32 * 512 * 3 + 512 * 32 + 32);

        let cross = AttentionConfig::new(32).init_cross::<TestBackend>(&device);
        assert_eq!(cross.num_params(), 3 * 32 * 512 + 512 * 32 + 32);
    }

    #[test]
    fn test_identical_memory_gives_identical_rows() {
        let device = Default::default();
        let attn = AttentionConfig::new(16)
            .with_heads(2)
            .with_dim_head(8)
            .init_cross::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::random([1, 5, 16], Distribution::Default, &device);
        // every token is the same vector, so softmax mixing returns that vector's value
        let token = Tensor::<TestBackend, 3>::random([1, 1, 16], Distribution::Default, &device);
        let memory = Tensor::cat(vec![token.clone(), token.clone(), token], 1);
        let out = attn.forward(x, memory).into_data().to_vec::<f32>().unwrap();
        let first = &out[..16];
        for row in out.chunks(16) {
            for (a, b) in row.iter().zip(first) {
                assert!((a - b).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_cross_attention_without_softmax_is_linear_in_memory() {
        let device = Default::default();
        let attn = AttentionConfig::new(16)
            .with_heads(2)
            .with_dim_head(8)
            .with_softmax(false)
            .init_cross::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::random([1, 4, 16], Distribution::Default, &device);
        let zeros = Tensor::<TestBackend, 3>::zeros([1, 3, 16], &device);
        // zero memory → zero keys and values → only the output bias remains
        let out = attn.forward(x, zeros);
        let bias = attn.to_out.bias.as_ref().unwrap().val().into_data().to_vec::<f32>().unwrap();
        let out = out.into_data().to_vec::<f32>().unwrap();
        for row in out.chunks(16) {
            for (a, b) in row.iter().zip(&bias) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_feed_forward_shape() {
        let device = Default::default();
        let ff = FeedForwardConfig::new(32, 64).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::ones([2, 8, 32], &device);
        assert_eq!(ff.forward(x).dims(), [2, 8, 32]);
        assert_eq!(ff.num_params(), 32 * 64 + 64 + 64 * 32 + 32);
    }
}
