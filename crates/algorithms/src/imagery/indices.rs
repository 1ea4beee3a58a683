//! Normalized-difference spectral indices

use crate::maybe_rayon::*;
use ndarray::Array2;
use settlemap_core::raster::Raster;
use settlemap_core::{Error, Result};

/// Compute the normalized difference between two bands:
///
/// `(band_a - band_b) / (band_a + band_b)`
///
/// Result is in [-1, 1]. Pixels where the sum is zero or either band is
/// nodata come out as NaN (never infinity), so the 0/0 case degrades locally
/// instead of aborting the run.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    band_a.check_geometry(band_b)?;

    let (rows, cols) = band_a.shape();
    let nodata_a = band_a.nodata();
    let nodata_b = band_b.nodata();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let a = unsafe { band_a.get_unchecked(row, col) };
                let b = unsafe { band_b.get_unchecked(row, col) };

                if is_nodata_f64(a, nodata_a) || is_nodata_f64(b, nodata_b) {
                    continue;
                }

                let sum = a + b;
                if sum.abs() < 1e-10 {
                    continue; // 0/0 policy: nodata, not a crash
                }

                *out = (a - b) / sum;
            }
            row_data
        })
        .collect();

    let mut output = band_a.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

fn is_nodata_f64(value: f64, nodata: Option<f64>) -> bool {
    if value.is_nan() {
        return true;
    }
    match nodata {
        Some(nd) => (value - nd).abs() < f64::EPSILON,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settlemap_core::GeoTransform;

    fn make_band(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(rows, cols, value);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r.set_nodata(Some(f64::NAN));
        r
    }

    #[test]
    fn test_normalized_difference_basic() {
        let a = make_band(5, 5, 0.8);
        let b = make_band(5, 5, 0.2);

        let result = normalized_difference(&a, &b).unwrap();
        let val = result.get(2, 2).unwrap();

        // (0.8 - 0.2) / (0.8 + 0.2) = 0.6
        assert!((val - 0.6).abs() < 1e-10, "Expected 0.6, got {}", val);
    }

    #[test]
    fn test_zero_sum_yields_nan_not_infinity() {
        let a = make_band(3, 3, 0.5);
        let b = make_band(3, 3, -0.5);

        let result = normalized_difference(&a, &b).unwrap();
        for row in 0..3 {
            for col in 0..3 {
                let val = result.get(row, col).unwrap();
                assert!(val.is_nan(), "0/0 must be NaN, got {}", val);
                assert!(!val.is_infinite());
            }
        }
    }

    #[test]
    fn test_range_bounded() {
        let mut a = make_band(4, 4, 0.0);
        let mut b = make_band(4, 4, 0.0);
        for row in 0..4 {
            for col in 0..4 {
                a.set(row, col, (row * 4 + col) as f64 * 0.1 + 0.1).unwrap();
                b.set(row, col, 1.6 - (row * 4 + col) as f64 * 0.05).unwrap();
            }
        }

        let result = normalized_difference(&a, &b).unwrap();
        for row in 0..4 {
            for col in 0..4 {
                let val = result.get(row, col).unwrap();
                if !val.is_nan() {
                    assert!((-1.0..=1.0).contains(&val), "out of range: {}", val);
                }
            }
        }
    }

    #[test]
    fn test_nodata_propagates() {
        let mut a = make_band(5, 5, 0.5);
        a.set(2, 2, f64::NAN).unwrap();
        let b = make_band(5, 5, 0.1);

        let result = normalized_difference(&a, &b).unwrap();
        assert!(result.get(2, 2).unwrap().is_nan());
        assert!(!result.get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = make_band(5, 5, 1.0);
        let b = make_band(5, 10, 1.0);
        assert!(normalized_difference(&a, &b).is_err());
    }
}
