//! GLCM texture dissimilarity
//!
//! Builds a gray-level co-occurrence matrix in a square window around
//! each pixel and reduces it to the dissimilarity measure
//! `sum(p(i,j) * |i - j|)`. Input values are quantized to `n_levels`
//! integer gray levels over the raster's value range.

use crate::maybe_rayon::*;
use ndarray::Array2;
use settlemap_core::raster::Raster;
use settlemap_core::{Error, Result};

/// Parameters for GLCM dissimilarity
#[derive(Debug, Clone)]
pub struct GlcmParams {
    /// Window radius; the window spans `2 * radius + 1` pixels per side
    /// (default 5, an 11x11 window)
    pub radius: usize,
    /// Number of quantization levels (default: 32)
    pub n_levels: usize,
    /// Co-occurrence distance in pixels (default: 1)
    pub distance: usize,
}

impl Default for GlcmParams {
    fn default() -> Self {
        Self {
            radius: 5,
            n_levels: 32,
            distance: 1,
        }
    }
}

/// Compute GLCM dissimilarity.
///
/// For each pixel, a symmetric GLCM is accumulated over 4 directions
/// (0°, 45°, 90°, 135°) within the window and normalized before the
/// dissimilarity reduction. Deterministic: no randomness, no state.
///
/// A raster without a finite value range to quantize (constant band) has
/// zero dissimilarity at every valid pixel; nodata stays NaN.
pub fn glcm_dissimilarity(raster: &Raster<f64>, params: GlcmParams) -> Result<Raster<f64>> {
    if params.radius == 0 {
        return Err(Error::InvalidParameter {
            name: "radius",
            value: "0".to_string(),
            reason: "GLCM window radius must be > 0".to_string(),
        });
    }
    if params.n_levels < 2 {
        return Err(Error::InvalidParameter {
            name: "n_levels",
            value: params.n_levels.to_string(),
            reason: "quantization needs at least 2 levels".to_string(),
        });
    }

    let (rows, cols) = raster.shape();

    let mut vmin = f64::INFINITY;
    let mut vmax = f64::NEG_INFINITY;
    for &v in raster.data().iter() {
        if v.is_finite() {
            vmin = vmin.min(v);
            vmax = vmax.max(v);
        }
    }
    if vmin >= vmax {
        // Constant band (or all nodata): every co-occurring pair shares
        // one level, so dissimilarity is identically zero
        let mut output = raster.with_same_meta::<f64>(rows, cols);
        output.set_nodata(Some(f64::NAN));
        for row in 0..rows {
            for col in 0..cols {
                let v = unsafe { raster.get_unchecked(row, col) };
                let d = if v.is_finite() { 0.0 } else { f64::NAN };
                unsafe { output.set_unchecked(row, col, d) };
            }
        }
        return Ok(output);
    }

    let range = vmax - vmin;
    let n = params.n_levels;
    let d = params.distance as isize;
    let r = params.radius as isize;

    // Direction offsets: 0°, 45°, 90°, 135°
    let directions: [(isize, isize); 4] = [(0, d), (-d, d), (-d, 0), (-d, -d)];

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut glcm = vec![0.0; n * n];

            for (col, out) in row_data.iter_mut().enumerate() {
                for v in &mut glcm {
                    *v = 0.0;
                }
                let mut total = 0.0;

                for dir in &directions {
                    for dr in -r..=r {
                        for dc in -r..=r {
                            let r1 = row as isize + dr;
                            let c1 = col as isize + dc;
                            let r2 = r1 + dir.0;
                            let c2 = c1 + dir.1;

                            if r1 >= 0
                                && c1 >= 0
                                && (r1 as usize) < rows
                                && (c1 as usize) < cols
                                && r2 >= 0
                                && c2 >= 0
                                && (r2 as usize) < rows
                                && (c2 as usize) < cols
                            {
                                let v1 =
                                    unsafe { raster.get_unchecked(r1 as usize, c1 as usize) };
                                let v2 =
                                    unsafe { raster.get_unchecked(r2 as usize, c2 as usize) };

                                if v1.is_finite() && v2.is_finite() {
                                    let i = quantize(v1, vmin, range, n);
                                    let j = quantize(v2, vmin, range, n);
                                    glcm[i * n + j] += 1.0;
                                    glcm[j * n + i] += 1.0; // Symmetric
                                    total += 2.0;
                                }
                            }
                        }
                    }
                }

                if total < 1.0 {
                    continue;
                }

                let mut diss = 0.0;
                for i in 0..n {
                    for j in 0..n {
                        diss += glcm[i * n + j] / total * (i as f64 - j as f64).abs();
                    }
                }
                *out = diss;
            }

            row_data
        })
        .collect();

    let mut output = raster.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

fn quantize(value: f64, vmin: f64, range: f64, n_levels: usize) -> usize {
    let normalized = (value - vmin) / range;
    let level = (normalized * (n_levels - 1) as f64).round() as usize;
    level.min(n_levels - 1)
}
