use std::{borrow::Cow, fmt};

use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// Named sample channel. Grayscale buffers expose a single `Luma` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ColorChannel {
    #[serde(rename = "R")]
    Red,
    #[serde(rename = "G")]
    Green,
    #[serde(rename = "B")]
    Blue,
    #[serde(rename = "L")]
    Luma,
}

impl ColorChannel {
    pub const RGB: [ColorChannel; 3] = [ColorChannel::Red, ColorChannel::Green, ColorChannel::Blue];

    pub fn short_name(&self) -> &'static str {
        match self {
            ColorChannel::Red => "R",
            ColorChannel::Green => "G",
            ColorChannel::Blue => "B",
            ColorChannel::Luma => "L",
        }
    }
}

impl fmt::Display for ColorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Decoded 8-bit raster, either one or three interleaved channels.
///
/// Buffers are immutable once built and owned by a single analysis pass.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl PixelBuffer {
    /// Narrow any decoded image to 8-bit gray or RGB. Alpha is dropped and
    /// deeper samples are rescaled into [0, 255] by the `image` conversions.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => PixelBuffer::Gray(gray),
            DynamicImage::ImageRgb8(rgb) => PixelBuffer::Rgb(rgb),
            other @ (DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)) => PixelBuffer::Gray(other.to_luma8()),
            other => PixelBuffer::Rgb(other.to_rgb8()),
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            PixelBuffer::Gray(img) => img.width(),
            PixelBuffer::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            PixelBuffer::Gray(img) => img.height(),
            PixelBuffer::Rgb(img) => img.height(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn channel_count(&self) -> usize {
        match self {
            PixelBuffer::Gray(_) => 1,
            PixelBuffer::Rgb(_) => 3,
        }
    }

    pub fn channels(&self) -> &'static [ColorChannel] {
        match self {
            PixelBuffer::Gray(_) => &[ColorChannel::Luma],
            PixelBuffer::Rgb(_) => &ColorChannel::RGB,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    /// Interleaved samples in row-major order.
    pub fn samples(&self) -> &[u8] {
        match self {
            PixelBuffer::Gray(img) => img.as_raw(),
            PixelBuffer::Rgb(img) => img.as_raw(),
        }
    }

    /// Samples of one channel, by index into [`PixelBuffer::channels`].
    pub fn channel_samples(&self, index: usize) -> impl Iterator<Item = u8> + '_ {
        let stride = self.channel_count();
        self.samples().iter().skip(index).step_by(stride).copied()
    }

    /// Three-channel view; gray samples are replicated into R, G and B.
    pub fn to_rgb(&self) -> Cow<'_, RgbImage> {
        match self {
            PixelBuffer::Rgb(img) => Cow::Borrowed(img),
            PixelBuffer::Gray(img) => Cow::Owned(DynamicImage::ImageLuma8(img.clone()).to_rgb8()),
        }
    }

    pub fn to_dynamic(&self) -> DynamicImage {
        match self {
            PixelBuffer::Gray(img) => DynamicImage::ImageLuma8(img.clone()),
            PixelBuffer::Rgb(img) => DynamicImage::ImageRgb8(img.clone()),
        }
    }
}

impl From<RgbImage> for PixelBuffer {
    fn from(image: RgbImage) -> Self {
        PixelBuffer::Rgb(image)
    }
}

impl From<GrayImage> for PixelBuffer {
    fn from(image: GrayImage) -> Self {
        PixelBuffer::Gray(image)
    }
}

#[cfg(test)]
mod tests {
    use image::{Luma, Rgb, Rgba, RgbaImage};

    use super::*;

    #[test]
    fn test_rgba_drops_alpha() {
        let rgba = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 40]));
        let buffer = PixelBuffer::from_dynamic(DynamicImage::ImageRgba8(rgba));

        assert_eq!(buffer.channel_count(), 3);
        assert_eq!(buffer.dimensions(), (3, 2));
        assert_eq!(&buffer.samples()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_channel_samples_are_strided() {
        let rgb = RgbImage::from_fn(2, 1, |x, _| Rgb([x as u8, 100 + x as u8, 200 + x as u8]));
        let buffer = PixelBuffer::from(rgb);

        assert_eq!(buffer.channel_samples(1).collect::<Vec<_>>(), vec![100, 101]);
        assert_eq!(buffer.channel_samples(2).collect::<Vec<_>>(), vec![200, 201]);
    }

    #[test]
    fn test_gray_to_rgb_replicates() {
        let buffer = PixelBuffer::from(GrayImage::from_pixel(1, 1, Luma([77])));
        let rgb = buffer.to_rgb();

        assert_eq!(rgb.get_pixel(0, 0), &Rgb([77, 77, 77]));
        assert_eq!(buffer.channels(), &[ColorChannel::Luma]);
    }
}
