//! Training sample extraction from labeled regions

use settlemap_core::raster::MultibandRaster;
use settlemap_core::region::{sampling_stride, LabeledRegion};
use settlemap_core::{Error, Result};

/// Labeled feature vectors sampled from a composite's bands.
///
/// Row per sampled pixel, column per band; built exclusively to train a
/// classifier. Pixels with any non-finite band are skipped during
/// construction, so every stored vector is complete.
#[derive(Debug, Clone)]
pub struct SampleSet {
    /// Band names, one per feature column
    pub band_names: Vec<String>,
    /// Feature vectors, one row per sample
    pub features: Vec<Vec<f64>>,
    /// Class label per sample
    pub labels: Vec<i32>,
}

impl SampleSet {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the set holds no samples
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of feature columns
    pub fn n_features(&self) -> usize {
        self.band_names.len()
    }

    /// Distinct class labels, ascending
    pub fn class_labels(&self) -> Vec<i32> {
        let mut labels = self.labels.clone();
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}

/// Sample every region pixel into a labeled feature vector.
///
/// `scale` is the sampling resolution in map units (stride over the
/// grid). A region that contributes zero valid samples fails the build
/// with `InsufficientSamples`: training with a silently missing class
/// would just misclassify everything that class covers.
pub fn build_sample_set(
    image: &MultibandRaster,
    regions: &[LabeledRegion],
    scale: f64,
) -> Result<SampleSet> {
    if regions.is_empty() {
        return Err(Error::EmptyInput("labeled regions"));
    }

    let (rows, cols) = image.shape();
    let stride = sampling_stride(scale, image.cell_size());

    let mut samples = SampleSet {
        band_names: image.band_names().to_vec(),
        features: Vec::new(),
        labels: Vec::new(),
    };

    for region in regions {
        let mut region_samples = 0usize;
        for (row, col) in region.pixel_indices(image.transform(), rows, cols, stride) {
            if let Some(features) = image.feature_vector(row, col) {
                samples.features.push(features);
                samples.labels.push(region.label);
                region_samples += 1;
            }
        }
        if region_samples == 0 {
            return Err(Error::InsufficientSamples {
                class: region.label,
                region: region.name.clone(),
            });
        }
    }

    Ok(samples)
}
