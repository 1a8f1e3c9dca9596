use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    buffer::{ColorChannel, PixelBuffer},
    error::{ForensicsError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LsbChannel {
    #[serde(rename = "p1")]
    pub ones_proportion: f64,
    #[serde(rename = "var")]
    pub variance: f64,
    #[serde(rename = "entropy")]
    pub entropy_bits: f64,
}

/// Least-significant-bit randomness per channel.
///
/// `combined_score` is `mean(entropy) + 2 * mean(variance)`. It is an
/// uncalibrated heuristic with no known false-positive rate; higher means a
/// noisier LSB plane, which is consistent with, but not evidence of, an
/// embedded payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LsbResult {
    pub per_channel: BTreeMap<ColorChannel, LsbChannel>,
    #[serde(rename = "score")]
    pub combined_score: f64,
}

/// Shannon entropy of a Bernoulli(p) source, in bits. Zero at p = 0 or 1.
pub fn binary_entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }

    -(p * p.log2() + (1.0 - p) * (1.0 - p).log2())
}

pub struct LsbAnalyzer;

impl LsbAnalyzer {
    pub fn analyze(buffer: &PixelBuffer) -> Result<LsbResult> {
        if buffer.is_empty() {
            return Err(ForensicsError::EmptyImage);
        }

        let rgb = buffer.to_rgb();
        let total = rgb.width() as f64 * rgb.height() as f64;

        let mut ones = [0u64; 3];
        for pixel in rgb.pixels() {
            for (c, count) in ones.iter_mut().enumerate() {
                *count += (pixel[c] & 1) as u64;
            }
        }

        let per_channel = ColorChannel::RGB
            .iter()
            .zip(ones)
            .map(|(&channel, count)| {
                let p = count as f64 / total;
                let stats = LsbChannel {
                    ones_proportion: p,
                    // population variance of a 0/1 plane
                    variance: p * (1.0 - p),
                    entropy_bits: binary_entropy(p),
                };
                (channel, stats)
            })
            .collect::<BTreeMap<_, _>>();

        let avg_entropy = per_channel.values().map(|c| c.entropy_bits).sum::<f64>() / 3.0;
        let avg_variance = per_channel.values().map(|c| c.variance).sum::<f64>() / 3.0;

        Ok(LsbResult {
            per_channel,
            combined_score: avg_entropy + 2.0 * avg_variance,
        })
    }
}
