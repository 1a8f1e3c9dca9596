//! Perceptual fingerprints over a downsampled grayscale view of the image.
//!
//! Both hashes are 64 bits wide. Bit `i` of the row-major grid lives at bit
//! position `63 - i`, so the 16-digit hex form reads in grid order.
//!
//! Similarity is the Hamming distance between two hashes of the same kind:
//!
//! - 0-5: same picture, possibly re-encoded or resized
//! - 6-10: related pictures
//! - above 10: different pictures

use std::{fmt, str::FromStr};

use ndarray::{Array2, s};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use statrs::statistics::{Data, Median};

use crate::{
    buffer::PixelBuffer,
    error::{ForensicsError, Result},
    image_utils::{area_resample, dct_2d, luminance_array},
};

const HASH_SIDE: usize = 8;
const DCT_SIDE: usize = 32;
const DCT_NOISE_FLOOR: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PerceptualHash(pub u64);

impl PerceptualHash {
    pub const BITS: u32 = 64;

    pub fn distance(&self, other: &PerceptualHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    pub fn is_similar(&self, other: &PerceptualHash, threshold: u32) -> bool {
        self.distance(other) <= threshold
    }

    /// 64 characters of `0`/`1`, grid order.
    pub fn to_bit_string(&self) -> String {
        format!("{:064b}", self.0)
    }

    fn from_bits(bits: impl IntoIterator<Item = bool>) -> Self {
        let mut hash = 0u64;
        let mut count = 0u32;

        for (i, bit) in bits.into_iter().enumerate() {
            if bit {
                hash |= 1u64 << (63 - i);
            }
            count += 1;
        }
        debug_assert_eq!(count, Self::BITS);

        PerceptualHash(hash)
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for PerceptualHash {
    type Err = ForensicsError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ForensicsError::InvalidHash(format!(
                "expected 16 hex digits, got {:?}",
                s
            )));
        }

        u64::from_str_radix(s, 16)
            .map(PerceptualHash)
            .map_err(|e| ForensicsError::InvalidHash(format!("{}: {}", s, e)))
    }
}

impl Serialize for PerceptualHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PerceptualHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceptualHashPair {
    #[serde(rename = "ahash")]
    pub average_hash: PerceptualHash,
    #[serde(rename = "phash")]
    pub frequency_hash: PerceptualHash,
}

impl PerceptualHashPair {
    /// Hamming distances `(average, frequency)`.
    pub fn distance(&self, other: &PerceptualHashPair) -> (u32, u32) {
        (
            self.average_hash.distance(&other.average_hash),
            self.frequency_hash.distance(&other.frequency_hash),
        )
    }
}

pub struct PerceptualHasher;

impl PerceptualHasher {
    /// Both hashes from a single luminance pass over the buffer.
    pub fn hash_pair(buffer: &PixelBuffer) -> Result<PerceptualHashPair> {
        let luma = Self::luminance(buffer)?;

        Ok(PerceptualHashPair {
            average_hash: average_hash_of(&luma),
            frequency_hash: frequency_hash_of(&luma),
        })
    }

    /// Bit set where the 8x8 cell is at least the grid mean.
    pub fn average_hash(buffer: &PixelBuffer) -> Result<PerceptualHash> {
        Ok(average_hash_of(&Self::luminance(buffer)?))
    }

    /// DCT hash of a 32x32 grid. The threshold is the median of the 63 AC
    /// terms of the low-frequency 8x8 corner; every term of that corner,
    /// DC included, contributes one bit.
    pub fn frequency_hash(buffer: &PixelBuffer) -> Result<PerceptualHash> {
        Ok(frequency_hash_of(&Self::luminance(buffer)?))
    }

    fn luminance(buffer: &PixelBuffer) -> Result<Array2<f64>> {
        if buffer.is_empty() {
            return Err(ForensicsError::EmptyImage);
        }
        Ok(luminance_array(buffer))
    }
}

fn average_hash_of(luma: &Array2<f64>) -> PerceptualHash {
    let grid = area_resample(luma, HASH_SIDE, HASH_SIDE).mapv(f64::round);
    let mean = grid.sum() / grid.len() as f64;

    PerceptualHash::from_bits(grid.iter().map(|&v| v >= mean))
}

fn frequency_hash_of(luma: &Array2<f64>) -> PerceptualHash {
    let grid = area_resample(luma, DCT_SIDE, DCT_SIDE).mapv(f64::round);
    let coefficients = dct_2d(&grid);

    // terms this small relative to DC are rounding noise of the transform
    let tolerance = DCT_NOISE_FLOOR * coefficients[[0, 0]].abs().max(1.0);
    let low = coefficients
        .slice(s![0..HASH_SIDE, 0..HASH_SIDE])
        .mapv(|c| if c.abs() < tolerance { 0.0 } else { c });

    let ac_terms = low.iter().skip(1).copied().collect::<Vec<_>>();
    let median = Data::new(ac_terms).median();

    PerceptualHash::from_bits(low.iter().map(|&c| c >= median))
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::*;

    fn half_split(width: u32, height: u32, bright_left: bool) -> PixelBuffer {
        PixelBuffer::from(GrayImage::from_fn(width, height, |x, _| {
            let left = x < width / 2;
            Luma([if left == bright_left { 200 } else { 50 }])
        }))
    }

    #[test]
    fn test_white_image_average_hash_is_all_ones() {
        let buffer = PixelBuffer::from(RgbImage::from_pixel(2, 2, Rgb([255, 255, 255])));
        let hash = PerceptualHasher::average_hash(&buffer).unwrap();

        assert_eq!(hash.0, u64::MAX);
        assert_eq!(hash.to_bit_string(), "1".repeat(64));
        assert_eq!(hash.to_string(), "ffffffffffffffff");
    }

    #[test]
    fn test_average_hash_is_deterministic() {
        let buffer = half_split(40, 30, true);
        let a = PerceptualHasher::average_hash(&buffer).unwrap();
        let b = PerceptualHasher::average_hash(&buffer).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.distance(&b), 0);
    }

    #[test]
    fn test_shifted_copy_changes_average_hash() {
        let original = GrayImage::from_fn(8, 8, |x, _| Luma([if x < 4 { 20 } else { 220 }]));
        let shifted = GrayImage::from_fn(8, 8, |x, y| *original.get_pixel((x + 7) % 8, y));

        let a = PerceptualHasher::average_hash(&PixelBuffer::from(original)).unwrap();
        let b = PerceptualHasher::average_hash(&PixelBuffer::from(shifted)).unwrap();

        assert_eq!(a.distance(&b), 16);
        assert!(!a.is_similar(&b, 10));
    }

    #[test]
    fn test_frequency_hash_separates_mirrored_images() {
        let left = half_split(64, 64, true);
        let right = half_split(64, 64, false);

        let a = PerceptualHasher::frequency_hash(&left).unwrap();
        let again = PerceptualHasher::frequency_hash(&left).unwrap();
        let b = PerceptualHasher::frequency_hash(&right).unwrap();

        assert_eq!(a, again);
        assert!(a.distance(&b) > 0);
    }

    #[test]
    fn test_flat_images_share_frequency_hash() {
        let hashes = [0u8, 7, 100, 200, 255]
            .iter()
            .map(|&level| {
                let flat = PixelBuffer::from(GrayImage::from_pixel(48, 40, Luma([level])));
                PerceptualHasher::frequency_hash(&flat).unwrap()
            })
            .collect::<Vec<_>>();

        for hash in &hashes {
            assert_eq!(hash.distance(&hashes[0]), 0);
            assert_eq!(hash.0, u64::MAX);
        }
    }

    #[test]
    fn test_pair_matches_individual_hashes() {
        let buffer = PixelBuffer::from(RgbImage::from_fn(50, 37, |x, y| {
            Rgb([(x * 5) as u8, (y * 7) as u8, ((x * y) % 256) as u8])
        }));
        let pair = PerceptualHasher::hash_pair(&buffer).unwrap();

        assert_eq!(pair.average_hash, PerceptualHasher::average_hash(&buffer).unwrap());
        assert_eq!(pair.frequency_hash, PerceptualHasher::frequency_hash(&buffer).unwrap());
        assert_eq!(pair.distance(&pair), (0, 0));
    }

    #[test]
    fn test_hex_round_trip_and_length_contract() {
        let hash = PerceptualHash(0x0123_4567_89ab_cdef);
        assert_eq!(hash.to_string().parse::<PerceptualHash>().unwrap(), hash);

        assert!("abc".parse::<PerceptualHash>().is_err());
        assert!("0123456789abcdef0".parse::<PerceptualHash>().is_err());
        assert!("zzzzzzzzzzzzzzzz".parse::<PerceptualHash>().is_err());
    }

    #[test]
    fn test_empty_buffer_cannot_be_hashed() {
        let buffer = PixelBuffer::from(GrayImage::new(0, 3));
        assert!(matches!(
            PerceptualHasher::hash_pair(&buffer),
            Err(ForensicsError::EmptyImage)
        ));
    }
}
