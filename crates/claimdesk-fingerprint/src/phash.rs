use std::f64::consts::PI;

use claimdesk_core::PerceptualHash;
use image::{DynamicImage, imageops::FilterType};
use thiserror::Error;

// Receipts are first collapsed to this grid so re-scans at different
// resolutions land on the same pixels before hashing.
const PRE_SHRINK: u32 = 8;
const HASH_SIZE: usize = 8;
const DCT_SIZE: usize = HASH_SIZE * 4;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("unreadable image: {0}")]
    Unreadable(String),
}

/// DCT perceptual hash of an encoded PNG or JPEG image.
pub fn fingerprint(bytes: &[u8]) -> Result<PerceptualHash, FingerprintError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|err| FingerprintError::Unreadable(err.to_string()))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(FingerprintError::Unreadable("image has no pixels".to_string()));
    }

    Ok(fingerprint_image(&decoded))
}

pub fn fingerprint_image(decoded: &DynamicImage) -> PerceptualHash {
    let luma = decoded
        .resize_exact(PRE_SHRINK, PRE_SHRINK, FilterType::Lanczos3)
        .grayscale()
        .resize_exact(DCT_SIZE as u32, DCT_SIZE as u32, FilterType::Lanczos3)
        .to_luma8();

    let mut pixels = [[0f64; DCT_SIZE]; DCT_SIZE];
    for (x, y, pixel) in luma.enumerate_pixels() {
        pixels[y as usize][x as usize] = f64::from(pixel.0[0]);
    }

    let low = low_frequency_dct(&pixels);
    let mut sorted: Vec<f64> = low.iter().flatten().copied().collect();
    sorted.sort_by(f64::total_cmp);
    let middle = sorted.len() / 2;
    let median = (sorted[middle - 1] + sorted[middle]) / 2.0;

    let bits = low
        .iter()
        .flatten()
        .fold(0u64, |acc, &coefficient| (acc << 1) | u64::from(coefficient > median));
    PerceptualHash::from_bits(bits)
}

/// Top-left `HASH_SIZE` x `HASH_SIZE` block of the 2-D type-II DCT.
fn low_frequency_dct(pixels: &[[f64; DCT_SIZE]; DCT_SIZE]) -> [[f64; HASH_SIZE]; HASH_SIZE] {
    let mut cosines = [[0f64; DCT_SIZE]; HASH_SIZE];
    for (k, row) in cosines.iter_mut().enumerate() {
        for (n, value) in row.iter_mut().enumerate() {
            *value = (PI * k as f64 * (2 * n + 1) as f64 / (2 * DCT_SIZE) as f64).cos();
        }
    }

    // rows first: DCT_SIZE rows x HASH_SIZE coefficients
    let mut rows = [[0f64; HASH_SIZE]; DCT_SIZE];
    for (y, pixel_row) in pixels.iter().enumerate() {
        for k in 0..HASH_SIZE {
            rows[y][k] = 2.0
                * pixel_row
                    .iter()
                    .zip(cosines[k].iter())
                    .map(|(pixel, cosine)| pixel * cosine)
                    .sum::<f64>();
        }
    }

    let mut low = [[0f64; HASH_SIZE]; HASH_SIZE];
    for (k, low_row) in low.iter_mut().enumerate() {
        for (x, value) in low_row.iter_mut().enumerate() {
            *value = 2.0
                * (0..DCT_SIZE)
                    .map(|y| rows[y][x] * cosines[k][y])
                    .sum::<f64>();
        }
    }
    low
}
