// ============================================================
// Layer 5 — Spatial Resampling
// ============================================================
// Upsampling helpers shared by the extractor and the change head.

use burn::{
    prelude::*,
    tensor::{
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

/// Nearest-neighbour upsampling by an integer factor.
pub fn upsample_nearest<B: Backend>(x: Tensor<B, 4>, factor: usize) -> Tensor<B, 4> {
    let [_, _, h, w] = x.dims();
    interpolate(
        x,
        [h * factor, w * factor],
        InterpolateOptions::new(InterpolateMode::Nearest),
    )
}

/// Bilinear resize to an exact output size with half-pixel sampling
/// (source coordinate `(dst + 0.5) * in / out - 0.5`, corners not aligned).
///
/// Burn's bilinear `interpolate` aligns corners, which shifts every
/// sample, so the resize runs as two interpolation matmuls instead:
/// `rows · x · colsᵀ`.
pub fn resize_bilinear<B: Backend>(x: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    let [batch, channels, h, w] = x.dims();
    if [h, w] == size {
        return x;
    }
    let [out_h, out_w] = size;
    let device = x.device();

    let rows = Tensor::<B, 2>::from_data(
        TensorData::new(half_pixel_weights(h, out_h), [out_h, h]),
        &device,
    )
    .reshape([1, 1, out_h, h])
    .expand([batch, channels, out_h, h]);
    let cols = Tensor::<B, 2>::from_data(
        TensorData::new(half_pixel_weights(w, out_w), [out_w, w]),
        &device,
    )
    .transpose()
    .reshape([1, 1, w, out_w])
    .expand([batch, channels, w, out_w]);

    rows.matmul(x).matmul(cols)
}

/// Row-major `[output, input]` linear interpolation weights along one axis.
/// Coordinates left of the first sample clamp to it; the right edge
/// repeats the last sample.
fn half_pixel_weights(input: usize, output: usize) -> Vec<f32> {
    let mut weights = vec![0.0f32; output * input];
    let ratio = input as f64 / output as f64;
    for dst in 0..output {
        let src = ((dst as f64 + 0.5) * ratio - 0.5).max(0.0);
        let lo = (src.floor() as usize).min(input - 1);
        let hi = (lo + 1).min(input - 1);
        let frac = (src - lo as f64) as f32;
        weights[dst * input + lo] += 1.0 - frac;
        weights[dst * input + hi] += frac;
    }
    weights
}
