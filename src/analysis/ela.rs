use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage, codecs::jpeg::JpegEncoder};
use serde::Serialize;

use crate::{
    buffer::PixelBuffer,
    config::{ElaConfig, SuspicionPolicy},
    error::{ForensicsError, Result},
    image_utils::rgb_to_gray,
};

/// Scalar outcome of an ELA pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElaFindings {
    /// Share of pixels whose scaled difference luminance exceeds the
    /// brightness threshold, in [0, 1].
    pub bright_fraction: f64,
    /// Largest unscaled per-channel difference.
    pub max_difference: u8,
    pub suspicious: bool,
}

#[derive(Debug, Clone)]
pub struct ElaResult {
    pub difference_image: PixelBuffer,
    pub findings: ElaFindings,
}

impl ElaResult {
    pub fn bright_fraction(&self) -> f64 {
        self.findings.bright_fraction
    }

    pub fn suspicious(&self) -> bool {
        self.findings.suspicious
    }

    /// Splits off the difference image so it can be persisted and dropped
    /// independently of the findings.
    pub fn into_parts(self) -> (PixelBuffer, ElaFindings) {
        (self.difference_image, self.findings)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_difference_image(&self.difference_image, path)
    }
}

/// Writes a difference image as PNG. Write failures surface as I/O errors.
pub fn save_difference_image<P: AsRef<Path>>(image: &PixelBuffer, path: P) -> Result<()> {
    image
        .to_dynamic()
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| match e {
            image::ImageError::IoError(io) => ForensicsError::Io(io),
            other => ForensicsError::Ela(format!("cannot encode difference image: {}", other)),
        })
}

pub struct ElaAnalyzer {
    quality: u8,
    amplification: f64,
    policy: SuspicionPolicy,
}

impl ElaAnalyzer {
    pub fn new(quality: u8) -> Self {
        Self {
            quality,
            amplification: 10.0,
            policy: SuspicionPolicy::default(),
        }
    }

    pub fn from_config(config: &ElaConfig, policy: SuspicionPolicy) -> Self {
        Self::new(config.quality)
            .with_amplification(config.visualization_scale)
            .with_policy(policy)
    }

    pub fn with_amplification(mut self, amp: f64) -> Self {
        self.amplification = amp;
        self
    }

    pub fn with_policy(mut self, policy: SuspicionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn analyze(&self, buffer: &PixelBuffer) -> Result<ElaResult> {
        if !(1..=100).contains(&self.quality) {
            return Err(ForensicsError::Ela(format!("quality {} outside 1..=100", self.quality)));
        }
        if !self.amplification.is_finite() || self.amplification <= 0.0 {
            return Err(ForensicsError::Ela(format!(
                "amplification {} must be positive",
                self.amplification
            )));
        }
        if buffer.is_empty() {
            return Err(ForensicsError::Ela("image has no pixels".into()));
        }

        let rgb_image = buffer.to_rgb();
        let (width, height) = rgb_image.dimensions();

        let recompressed = self.recompress_jpeg(&rgb_image)?;
        if recompressed.dimensions() != (width, height) {
            return Err(ForensicsError::Ela(format!(
                "recompressed image is {}x{}, expected {}x{}",
                recompressed.width(),
                recompressed.height(),
                width,
                height
            )));
        }

        let mut ela_image = RgbImage::new(width, height);
        let mut max_difference = 0u8;

        for (x, y, orig) in rgb_image.enumerate_pixels() {
            let recomp = recompressed.get_pixel(x, y);
            let mut scaled = [0u8; 3];

            for c in 0..3 {
                let diff = orig[c].abs_diff(recomp[c]);
                max_difference = max_difference.max(diff);
                scaled[c] = (diff as f64 * self.amplification).round().min(255.0) as u8;
            }

            ela_image.put_pixel(x, y, Rgb(scaled));
        }

        let bright_fraction = self.bright_fraction(&ela_image);
        let suspicious = bright_fraction > self.policy.bright_fraction_threshold;

        Ok(ElaResult {
            difference_image: PixelBuffer::Rgb(ela_image),
            findings: ElaFindings {
                bright_fraction,
                max_difference,
                suspicious,
            },
        })
    }

    fn recompress_jpeg(&self, image: &RgbImage) -> Result<RgbImage> {
        let mut encoded = Vec::new();

        JpegEncoder::new_with_quality(&mut encoded, self.quality)
            .encode_image(image)
            .map_err(|e| ForensicsError::Ela(format!("re-encode failed: {}", e)))?;

        let recompressed = image::load_from_memory_with_format(&encoded, ImageFormat::Jpeg)
            .map_err(|e| ForensicsError::Ela(format!("decode of recompressed image failed: {}", e)))?;

        Ok(recompressed.to_rgb8())
    }

    fn bright_fraction(&self, ela_image: &RgbImage) -> f64 {
        let luma = rgb_to_gray(ela_image);
        let total = luma.len();
        if total == 0 {
            return 0.0;
        }

        let bright = luma
            .iter()
            .filter(|&&v| v > self.policy.brightness_threshold)
            .count();

        bright as f64 / total as f64
    }
}
