use std::collections::BTreeMap;

use imageproc::stats::histogram;
use serde::{Deserialize, Serialize};

use crate::buffer::{ColorChannel, PixelBuffer};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f64,
    pub variance: f64,
    pub histogram_peak_bin: u8,
}

pub type ImageStatistics = BTreeMap<ColorChannel, ChannelStats>;

/// 256-bin histogram per channel, in [`PixelBuffer::channels`] order.
pub fn channel_histograms(buffer: &PixelBuffer) -> Vec<(ColorChannel, [u32; 256])> {
    let hist = match buffer {
        PixelBuffer::Gray(img) => histogram(img),
        PixelBuffer::Rgb(img) => histogram(img),
    };

    buffer
        .channels()
        .iter()
        .copied()
        .zip(hist.channels)
        .collect()
}

/// Mean, population variance and modal bin of one histogram. The lowest bin
/// wins ties.
pub fn stats_from_histogram(hist: &[u32; 256]) -> Option<ChannelStats> {
    let count = hist.iter().map(|&c| c as u64).sum::<u64>();
    if count == 0 {
        return None;
    }

    let n = count as f64;
    let mean = hist
        .iter()
        .enumerate()
        .map(|(value, &c)| value as f64 * c as f64)
        .sum::<f64>()
        / n;
    let variance = hist
        .iter()
        .enumerate()
        .map(|(value, &c)| c as f64 * (value as f64 - mean).powi(2))
        .sum::<f64>()
        / n;

    let mut peak = 0usize;
    for (bin, &c) in hist.iter().enumerate() {
        if c > hist[peak] {
            peak = bin;
        }
    }

    Some(ChannelStats {
        mean,
        variance,
        histogram_peak_bin: peak as u8,
    })
}

pub struct PixelStatistics;

impl PixelStatistics {
    /// Per-channel statistics, or `None` when the buffer has no pixels.
    pub fn compute(buffer: &PixelBuffer) -> Option<ImageStatistics> {
        if buffer.is_empty() {
            return None;
        }

        channel_histograms(buffer)
            .iter()
            .map(|(channel, hist)| stats_from_histogram(hist).map(|stats| (*channel, stats)))
            .collect()
    }
}
