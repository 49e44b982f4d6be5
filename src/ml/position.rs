// ============================================================
// Layer 5 — Positional Encodings
// ============================================================
// Position information for the token encoder ([1, tokens, dim])
// and the decoder's spatial bias ([1, dim, h, w]).
//
// Fixed tables use the transformer sinusoid:
//   pe[p, 2i]   = sin(p / 10000^(2i/C))
//   pe[p, 2i+1] = cos(p / 10000^(2i/C))
// The 2-D variant spends the first half of the channels on the
// row index and the second half on the column index.

use burn::{
    module::Param,
    prelude::*,
    tensor::Distribution,
};

const MAX_TIMESCALE: f64 = 10_000.0;

/// Row-major `[positions][channels]` sinusoid table.
pub fn sinusoid_table(positions: usize, channels: usize) -> Vec<f32> {
    let mut table = Vec::with_capacity(positions * channels);
    for p in 0..positions {
        for ch in 0..channels {
            let pair = (ch - ch % 2) as f64;
            let angle = p as f64 / MAX_TIMESCALE.powf(pair / channels as f64);
            table.push(if ch % 2 == 0 { angle.sin() } else { angle.cos() } as f32);
        }
    }
    table
}

/// Fixed encoding for a token sequence, `[1, tokens, dim]`.
pub fn sinusoid_1d<B: Backend>(tokens: usize, dim: usize, device: &B::Device) -> Tensor<B, 3> {
    Tensor::from_data(TensorData::new(sinusoid_table(tokens, dim), [1, tokens, dim]), device)
}

/// Fixed encoding for a feature map, `[1, dim, h, w]`.
pub fn sinusoid_2d<B: Backend>(dim: usize, h: usize, w: usize, device: &B::Device) -> Tensor<B, 4> {
    let row_channels = dim / 2;
    let col_channels = dim - row_channels;
    let rows = sinusoid_table(h, row_channels);
    let cols = sinusoid_table(w, col_channels);

    let mut values = Vec::with_capacity(dim * h * w);
    for ch in 0..dim {
        for i in 0..h {
            for j in 0..w {
                values.push(if ch < row_channels {
                    rows[i * row_channels + ch]
                } else {
                    cols[j * col_channels + ch - row_channels]
                });
            }
        }
    }
    Tensor::from_data(TensorData::new(values, [1, dim, h, w]), device)
}

/// Trainable embedding initialised from N(0, 1).
pub fn learned<B: Backend, const D: usize>(shape: [usize; D], device: &B::Device) -> Param<Tensor<B, D>> {
    Param::from_tensor(Tensor::random(shape, Distribution::Normal(0.0, 1.0), device))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_first_position_is_sin_zero_cos_one() {
        let table = sinusoid_table(3, 4);
        assert_eq!(&table[..4], &[0.0, 1.0, 0.0, 1.0]);
        // channel 0 has frequency 1
        assert!((table[4] - 1.0f32.sin()).abs() < 1e-6);
        assert!((table[5] - 1.0f32.cos()).abs() < 1e-6);
    }

    #[test]
    fn test_2d_splits_rows_and_columns() {
        let device = Default::default();
        let pe = sinusoid_2d::<TestBackend>(4, 3, 5, &device);
        assert_eq!(pe.dims(), [1, 4, 3, 5]);
        let v = pe.into_data().to_vec::<f32>().unwrap();
        let at = |ch: usize, i: usize, j: usize| v[ch * 15 + i * 5 + j];
        // channel 0 varies with the row only
        assert!((at(0, 2, 0) - 2.0f32.sin()).abs() < 1e-6);
        assert_eq!(at(0, 2, 0), at(0, 2, 4));
        // channel 2 varies with the column only
        assert!((at(2, 0, 3) - 3.0f32.sin()).abs() < 1e-6);
        assert_eq!(at(2, 0, 3), at(2, 1, 3));
    }

    #[test]
    fn test_learned_shape() {
        let device = Default::default();
        let p = learned::<TestBackend, 3>([1, 8, 32], &device);
        assert_eq!(p.val().dims(), [1, 8, 32]);
        let seq = sinusoid_1d::<TestBackend>(8, 32, &device);
        assert_eq!(seq.dims(), [1, 8, 32]);
    }
}
