//! Median compositing of overlapping raster tiles
//!
//! Reduces a collection of co-registered multi-band tiles to one seamless
//! image by taking the per-pixel, per-band median over valid tile values.
//! The median is deliberate: it sheds outlier tiles (cloud, shadow, sensor
//! artifacts) without explicit cloud masking.

use crate::maybe_rayon::*;
use ndarray::Array2;
use settlemap_core::raster::MultibandRaster;
use settlemap_core::{Error, Result};

/// Composite overlapping tiles into a single image.
///
/// Preconditions: every tile carries the same band names and grid
/// geometry (registration happens upstream). Per pixel and band, the
/// output is the median of the finite tile values; with an even count the
/// two middle values are averaged, so two constant tiles of 10 and 20
/// compose to 15. Positions no tile covers stay NaN.
///
/// Fails with `EmptyInput` on an empty collection and `GeometryMismatch`
/// when tiles disagree on shape or band layout.
pub fn median_composite(tiles: &[MultibandRaster]) -> Result<MultibandRaster> {
    let first = tiles.first().ok_or(Error::EmptyInput("tile collection"))?;

    for tile in &tiles[1..] {
        if tile.band_names() != first.band_names() {
            return Err(Error::GeometryMismatch {
                expected: format!("bands {:?}", first.band_names()),
                actual: format!("bands {:?}", tile.band_names()),
            });
        }
        first.bands()[0].check_geometry(&tile.bands()[0])?;
    }

    let (rows, cols) = first.shape();
    let mut bands = Vec::with_capacity(first.band_count());

    for band_idx in 0..first.band_count() {
        let data: Vec<f64> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut row_data = vec![f64::NAN; cols];
                let mut values: Vec<f64> = Vec::with_capacity(tiles.len());

                for (col, out) in row_data.iter_mut().enumerate() {
                    values.clear();
                    for tile in tiles {
                        let v = unsafe {
                            tile.bands()[band_idx].get_unchecked(row, col)
                        };
                        if v.is_finite() {
                            values.push(v);
                        }
                    }
                    if !values.is_empty() {
                        *out = median_of(&mut values);
                    }
                }
                row_data
            })
            .collect();

        let mut band = first.bands()[band_idx].with_same_meta::<f64>(rows, cols);
        band.set_nodata(Some(f64::NAN));
        *band.data_mut() = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        bands.push(band);
    }

    MultibandRaster::from_bands(bands, first.band_names().to_vec())
}

/// Median with the even-count convention of averaging the two middle
/// values. Sorting makes the result independent of input order.
fn median_of(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settlemap_core::raster::Raster;
    use settlemap_core::GeoTransform;

    fn tile(rows: usize, cols: usize, values: &[f64]) -> MultibandRaster {
        let bands = values
            .iter()
            .map(|&v| {
                let mut band = Raster::filled(rows, cols, v);
                band.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
                band
            })
            .collect();
        let names = (1..=values.len()).map(|i| format!("b{}", i)).collect();
        MultibandRaster::from_bands(bands, names).unwrap()
    }

    #[test]
    fn test_empty_collection_fails() {
        assert!(matches!(
            median_composite(&[]),
            Err(Error::EmptyInput(_))
        ));
    }

    #[test]
    fn test_even_count_median_convention() {
        // Two constant tiles of 10 and 20 must compose to 15 everywhere
        let tiles = vec![tile(4, 4, &[10.0]), tile(4, 4, &[20.0])];
        let composite = median_composite(&tiles).unwrap();
        assert_eq!(composite.band("b1").unwrap().get(2, 2).unwrap(), 15.0);
    }

    #[test]
    fn test_odd_count_robust_to_outlier() {
        // Median of {10, 12, 500} is 12: cloudy outlier tile dropped
        let tiles = vec![tile(3, 3, &[10.0]), tile(3, 3, &[12.0]), tile(3, 3, &[500.0])];
        let composite = median_composite(&tiles).unwrap();
        assert_eq!(composite.band("b1").unwrap().get(1, 1).unwrap(), 12.0);
    }

    #[test]
    fn test_order_independent() {
        let a = tile(4, 4, &[5.0, 50.0]);
        let b = tile(4, 4, &[9.0, 30.0]);
        let c = tile(4, 4, &[7.0, 40.0]);

        let forward = median_composite(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let reverse = median_composite(&[c, b, a]).unwrap();

        for name in ["b1", "b2"] {
            for row in 0..4 {
                for col in 0..4 {
                    assert_eq!(
                        forward.band(name).unwrap().get(row, col).unwrap(),
                        reverse.band(name).unwrap().get(row, col).unwrap()
                    );
                }
            }
        }
    }

    #[test]
    fn test_nodata_gaps_survive() {
        let a = tile(3, 3, &[10.0]);
        let b = tile(3, 3, &[20.0]);
        // Knock out pixel (0,0) in both tiles, (1,1) in one
        let bands_a = vec![{
            let mut band = a.bands()[0].clone();
            band.set(0, 0, f64::NAN).unwrap();
            band
        }];
        let bands_b = vec![{
            let mut band = b.bands()[0].clone();
            band.set(0, 0, f64::NAN).unwrap();
            band.set(1, 1, f64::NAN).unwrap();
            band
        }];
        let a = MultibandRaster::from_bands(bands_a, vec!["b1".into()]).unwrap();
        let b = MultibandRaster::from_bands(bands_b, vec!["b1".into()]).unwrap();

        let composite = median_composite(&[a, b]).unwrap();
        let band = composite.band("b1").unwrap();
        assert!(band.get(0, 0).unwrap().is_nan());
        assert_eq!(band.get(1, 1).unwrap(), 10.0); // single valid tile wins
        assert_eq!(band.get(2, 2).unwrap(), 15.0);
    }

    #[test]
    fn test_band_layout_mismatch_fails() {
        let a = tile(3, 3, &[1.0]);
        let b = tile(3, 3, &[1.0, 2.0]);
        assert!(matches!(
            median_composite(&[a, b]),
            Err(Error::GeometryMismatch { .. })
        ));
    }

    #[test]
    fn test_misaligned_tiles_rejected() {
        // Same shape, but the second tile sits on a 30 m grid elsewhere;
        // compositing them would blend unrelated ground
        let a = tile(4, 4, &[10.0]);
        let mut band = Raster::filled(4, 4, 20.0);
        band.set_transform(GeoTransform::new(5000.0, 9000.0, 30.0, -30.0));
        let b = MultibandRaster::from_bands(vec![band], vec!["b1".into()]).unwrap();

        assert!(matches!(
            median_composite(&[a, b]),
            Err(Error::GeometryMismatch { .. })
        ));
    }
}
