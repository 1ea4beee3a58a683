//! Supervised pixel classification
//!
//! The pipeline treats the classifier as a capability: anything that can
//! fit a [`SampleSet`] and predict a label per feature vector satisfies
//! [`PixelClassifier`]. A seeded random forest is provided; swapping in
//! another ensemble touches nothing else.

mod forest;
mod samples;

pub use forest::{RandomForest, RandomForestParams};
pub use samples::{build_sample_set, SampleSet};

use crate::maybe_rayon::*;
use ndarray::Array2;
use settlemap_core::raster::{MultibandRaster, Raster};
use settlemap_core::{Error, Result};

/// Contract for a trainable pixel classifier.
pub trait PixelClassifier {
    /// Train on labeled samples. Called once before `predict`.
    fn fit(&mut self, samples: &SampleSet) -> Result<()>;

    /// Label for one complete feature vector (one value per band, in the
    /// sample set's band order)
    fn predict(&self, features: &[f64]) -> i32;
}

/// Apply a trained classifier across every valid pixel of the image.
///
/// A pixel with nodata in any band stays NaN in the output: partial
/// feature vectors are never classified.
pub fn classify<C>(image: &MultibandRaster, classifier: &C) -> Result<Raster<f64>>
where
    C: PixelClassifier + Sync + ?Sized,
{
    let (rows, cols) = image.shape();
    let bands = image.bands();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut features = vec![0.0; bands.len()];

            'pixel: for (col, out) in row_data.iter_mut().enumerate() {
                for (slot, band) in features.iter_mut().zip(bands) {
                    let v = unsafe { band.get_unchecked(row, col) };
                    if !v.is_finite() || band.is_nodata(v) {
                        continue 'pixel;
                    }
                    *slot = v;
                }
                *out = classifier.predict(&features) as f64;
            }
            row_data
        })
        .collect();

    let mut output = bands[0].with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use settlemap_core::GeoTransform;

    /// Thresholds the first feature; enough to exercise the seam
    struct StepClassifier {
        threshold: f64,
    }

    impl PixelClassifier for StepClassifier {
        fn fit(&mut self, _samples: &SampleSet) -> Result<()> {
            Ok(())
        }

        fn predict(&self, features: &[f64]) -> i32 {
            if features[0] <= self.threshold {
                0
            } else {
                1
            }
        }
    }

    fn image() -> MultibandRaster {
        let mut b1 = Raster::new(4, 4);
        b1.set_transform(GeoTransform::default());
        for row in 0..4 {
            for col in 0..4 {
                b1.set(row, col, col as f64).unwrap();
            }
        }
        b1.set(0, 0, f64::NAN).unwrap();
        MultibandRaster::from_bands(vec![b1], vec!["b1".into()]).unwrap()
    }

    #[test]
    fn test_classify_labels_and_nodata() {
        let classified = classify(&image(), &StepClassifier { threshold: 1.5 }).unwrap();

        assert!(classified.get(0, 0).unwrap().is_nan()); // nodata propagates
        assert_eq!(classified.get(1, 0).unwrap(), 0.0);
        assert_eq!(classified.get(1, 3).unwrap(), 1.0);
    }

    #[test]
    fn test_classify_covers_full_raster_not_only_regions() {
        let classified = classify(&image(), &StepClassifier { threshold: 10.0 }).unwrap();
        let labelled = classified
            .data()
            .iter()
            .filter(|v| !v.is_nan())
            .count();
        assert_eq!(labelled, 15); // every valid pixel got a label
    }
}
