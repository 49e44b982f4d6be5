// ============================================================
// Layer 3 — Shape Geometry
// ============================================================
// Shape arithmetic for the ResNet backbone and the tokenizers.
//
// The model layer uses these numbers to size its layers and
// positional parameters, and the config validation uses them
// to reject impossible settings before any tensor is allocated.
//
// Every stride-2 operation in the backbone (the 7x7 stem conv,
// the max-pool and the first conv of a strided stage) maps a
// side length s to ceil(s / 2), so odd sizes are handled the
// same way the convolution arithmetic handles them.

use std::ops::Range;

use anyhow::{bail, ensure, Result};

use crate::domain::options::{Backbone, TokenizerKind};

/// Width of the first residual stage, before expansion.
pub const BASE_PLANES: usize = 64;

/// Channels of the projected feature map fed to the tokenizer.
pub const FEATURE_DIM: usize = 32;

impl Backbone {
    /// Output channel multiplier of a residual block.
    pub fn expansion(self) -> usize {
        match self {
            Self::ResNet18 | Self::ResNet34 => 1,
            Self::ResNet50 => 4,
        }
    }

    /// Number of residual blocks in layer1..layer4.
    pub fn block_counts(self) -> [usize; 4] {
        match self {
            Self::ResNet18 => [2, 2, 2, 2],
            Self::ResNet34 | Self::ResNet50 => [3, 4, 6, 3],
        }
    }

    /// Whether layer2, layer3 and layer4 trade their stride for dilation.
    pub fn dilated_stages(self) -> [bool; 3] {
        match self {
            Self::ResNet18 => [false, false, false],
            Self::ResNet34 | Self::ResNet50 => [false, true, true],
        }
    }

    pub fn uses_bottleneck(self) -> bool {
        matches!(self, Self::ResNet50)
    }
}

/// Check that a truncation depth is one the extractor supports.
pub fn check_stages(stages: usize) -> Result<()> {
    ensure!(
        (3..=5).contains(&stages),
        "backbone must be truncated at 3, 4 or 5 stages, got {stages}"
    );
    Ok(())
}

/// Number of residual layers kept for a truncation depth.
/// Stage 1 is the stem, so `stages - 1` residual layers remain.
pub fn residual_layers(stages: usize) -> Result<usize> {
    check_stages(stages)?;
    Ok(stages - 1)
}

/// Channels of the backbone output when truncated at `stages`.
pub fn stage_channels(backbone: Backbone, stages: usize) -> Result<usize> {
    let planes = match stages {
        3 => 128,
        4 => 256,
        5 => 512,
        other => bail!("backbone must be truncated at 3, 4 or 5 stages, got {other}"),
    };
    Ok(planes * backbone.expansion())
}

/// Stride of each residual layer actually applied (1 when dilated).
pub fn layer_strides(backbone: Backbone) -> [usize; 4] {
    let dilated = backbone.dilated_stages();
    [
        1,
        if dilated[0] { 1 } else { 2 },
        if dilated[1] { 1 } else { 2 },
        if dilated[2] { 1 } else { 2 },
    ]
}

/// Dilation of each residual layer: `(first_block, later_blocks)`.
///
/// A dilated layer keeps the previous dilation on its first block and
/// multiplies it by the replaced stride for the remaining blocks.
pub fn layer_dilations(backbone: Backbone) -> [(usize, usize); 4] {
    let dilated = backbone.dilated_stages();
    let mut current = 1;
    let mut out = [(1, 1); 4];
    for (i, slot) in out.iter_mut().enumerate() {
        let previous = current;
        if i > 0 && dilated[i - 1] {
            current *= 2;
        }
        *slot = (previous, current);
    }
    out
}

/// Overall downsampling factor of the truncated backbone.
pub fn output_stride(backbone: Backbone, stages: usize) -> Result<usize> {
    let layers = residual_layers(stages)?;
    let strides = layer_strides(backbone);
    // stem conv and max-pool contribute a factor of 4
    Ok(4 * strides[..layers].iter().product::<usize>())
}

/// Exact side length of the extractor output for an input side.
pub fn feature_extent(
    side:        usize,
    backbone:    Backbone,
    stages:      usize,
    upsample_2x: bool,
) -> Result<usize> {
    ensure!(side > 0, "input side must be positive");
    let layers = residual_layers(stages)?;
    let halve = |s: usize| s.div_ceil(2);

    let mut s = halve(halve(side));
    for stride in &layer_strides(backbone)[..layers] {
        if *stride == 2 {
            s = halve(s);
        }
    }
    Ok(if upsample_2x { s * 2 } else { s })
}

/// Pooling windows of adaptive pooling from `input` cells to `output` cells.
pub fn adaptive_bins(input: usize, output: usize) -> Vec<Range<usize>> {
    (0..output)
        .map(|i| {
            let start = (i * input) / output;
            let end   = ((i + 1) * input).div_ceil(output);
            start..end
        })
        .collect()
}

/// Tokens produced for one image.
pub fn tokens_per_image(kind: TokenizerKind, token_len: usize, pool_size: usize) -> usize {
    match kind {
        TokenizerKind::Semantic => token_len,
        TokenizerKind::Pooled   => pool_size * pool_size,
    }
}
