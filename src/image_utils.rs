use std::f64;

use image::{GrayImage, Luma, RgbImage};
use ndarray::Array2;

use crate::buffer::PixelBuffer;

/// BT.601 luma of an RGB triple.
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// BT.601 luma rounded to the nearest 8-bit level.
pub fn luminance_u8(r: u8, g: u8, b: u8) -> u8 {
    luminance(r, g, b).round().clamp(0.0, 255.0) as u8
}

pub fn rgb_to_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        gray.put_pixel(x, y, Luma([luminance_u8(pixel[0], pixel[1], pixel[2])]));
    }

    gray
}

/// Luminance grid indexed `[row, column]`.
pub fn luminance_array(buffer: &PixelBuffer) -> Array2<f64> {
    let (width, height) = buffer.dimensions();
    let mut arr = Array2::zeros((height as usize, width as usize));

    match buffer {
        PixelBuffer::Gray(img) => {
            for (x, y, pixel) in img.enumerate_pixels() {
                arr[[y as usize, x as usize]] = pixel[0] as f64;
            }
        }
        PixelBuffer::Rgb(img) => {
            for (x, y, pixel) in img.enumerate_pixels() {
                arr[[y as usize, x as usize]] = luminance(pixel[0], pixel[1], pixel[2]);
            }
        }
    }

    arr
}

/// Row-stochastic matrix mapping `src` samples onto `dst` cells, each cell
/// weighting source samples by how much of the cell they cover.
pub fn area_weights(src: usize, dst: usize) -> Array2<f64> {
    let mut weights = Array2::zeros((dst, src));
    let scale = src as f64 / dst as f64;

    for o in 0..dst {
        let start = o as f64 * scale;
        let end = (o + 1) as f64 * scale;
        let first = start.floor() as usize;
        let last = (end.ceil() as usize).min(src);

        for i in first..last {
            let overlap = (end.min((i + 1) as f64) - start.max(i as f64)).max(0.0);
            weights[[o, i]] = overlap / scale;
        }
    }

    weights
}

/// Area-average resampling of a grid to `out_height` x `out_width`. Works for
/// both shrinking and enlarging; source must be non-empty.
pub fn area_resample(arr: &Array2<f64>, out_height: usize, out_width: usize) -> Array2<f64> {
    let (height, width) = arr.dim();
    let rows = area_weights(height, out_height);
    let cols = area_weights(width, out_width);

    rows.dot(arr).dot(&cols.t())
}

/// Orthonormal DCT-II basis, row `k` holding frequency `k`.
pub fn dct_matrix(n: usize) -> Array2<f64> {
    let mut matrix = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..n {
            matrix[[i, j]] = if i == 0 {
                1.0 / (n as f64).sqrt()
            } else {
                (2.0 / n as f64).sqrt()
                    * (f64::consts::PI * (2.0 * j as f64 + 1.0) * i as f64 / (2.0 * n as f64)).cos()
            };
        }
    }

    matrix
}

/// Separable 2D DCT of a square grid.
pub fn dct_2d(block: &Array2<f64>) -> Array2<f64> {
    let basis = dct_matrix(block.nrows());
    basis.dot(block).dot(&basis.t())
}
