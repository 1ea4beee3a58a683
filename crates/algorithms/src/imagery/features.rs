//! Derived-band feature extraction
//!
//! Appends the engineered bands the classifier feeds on: a same-source
//! normalized-difference index, a cross-source index from an auxiliary
//! scene catalog, and a GLCM texture dissimilarity band. Every function
//! returns a new image; inputs are never mutated, so re-running
//! extraction is deterministic and each intermediate stays inspectable.

use crate::imagery::indices::normalized_difference;
use crate::texture::{glcm_dissimilarity, GlcmParams};
use settlemap_core::raster::{MultibandRaster, Raster};
use settlemap_core::{Error, Result};

/// One auxiliary acquisition offered by a [`SceneCatalog`].
#[derive(Debug, Clone)]
pub struct Scene {
    /// Scene imagery, in the catalog's native grid
    pub image: MultibandRaster,
    /// Acquisition date, ISO-8601 (`YYYY-MM-DD`)
    pub acquired: String,
    /// Cloud-cover percentage, lower is better
    pub cloud_cover: f64,
}

/// Query for auxiliary scenes: bounding box plus a half-open
/// acquisition-date window, start inclusive and end exclusive
/// (ISO-8601 dates order lexicographically).
#[derive(Debug, Clone)]
pub struct SceneQuery {
    /// (min_x, min_y, max_x, max_y) region of interest
    pub bounds: (f64, f64, f64, f64),
    pub start_date: String,
    pub end_date: String,
}

impl SceneQuery {
    /// Whether an acquisition date falls in `[start_date, end_date)`
    pub fn contains_date(&self, acquired: &str) -> bool {
        self.start_date.as_str() <= acquired && acquired < self.end_date.as_str()
    }
}

/// Raster-source collaborator. Implementations answer a query with the
/// candidate scenes intersecting the bounds and date window; ranking by
/// cloud cover is the pipeline's job.
pub trait SceneCatalog {
    fn scenes(&self, query: &SceneQuery) -> Result<Vec<Scene>>;
}

/// Configuration for the cross-source index band.
#[derive(Debug, Clone)]
pub struct CrossSourceIndex {
    /// Numerator-positive band in the auxiliary scene (e.g. "B12")
    pub band_a: String,
    /// Numerator-negative band in the auxiliary scene (e.g. "B8")
    pub band_b: String,
    /// Name of the appended band (e.g. "ndbi")
    pub name: String,
    pub query: SceneQuery,
}

/// Configuration for the full extraction pass.
#[derive(Debug, Clone)]
pub struct FeatureParams {
    /// Band pair for the same-source normalized difference
    pub nd_band_a: String,
    pub nd_band_b: String,
    /// Name of the appended index band
    pub nd_name: String,
    /// Source band for GLCM texture
    pub texture_band: String,
    /// Name of the appended dissimilarity band
    pub texture_name: String,
    pub glcm: GlcmParams,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            nd_band_a: "b4".to_string(),
            nd_band_b: "b1".to_string(),
            nd_name: "ndvi".to_string(),
            texture_band: "b1".to_string(),
            texture_name: "diss".to_string(),
            glcm: GlcmParams::default(),
        }
    }
}

/// Append a normalized-difference band computed from two existing bands.
pub fn add_normalized_difference(
    image: &MultibandRaster,
    band_a: &str,
    band_b: &str,
    name: &str,
) -> Result<MultibandRaster> {
    let index = normalized_difference(image.band(band_a)?, image.band(band_b)?)?;
    image.with_band(name, index)
}

/// Append a normalized-difference band derived from the least-cloudy
/// auxiliary scene matching the query.
///
/// The chosen scene is nearest-neighbor resampled onto the primary grid
/// and clipped to the primary's valid-data mask (taken from `mask_band`)
/// before the index is computed. No matching scene is a structural
/// failure (`EmptyInput`), reported rather than retried.
pub fn add_cross_source_index(
    image: &MultibandRaster,
    catalog: &dyn SceneCatalog,
    index: &CrossSourceIndex,
    mask_band: &str,
) -> Result<MultibandRaster> {
    let mut scenes = catalog.scenes(&index.query)?;
    if scenes.is_empty() {
        return Err(Error::EmptyInput("auxiliary scenes"));
    }
    scenes.sort_by(|a, b| {
        a.cloud_cover
            .partial_cmp(&b.cloud_cover)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let best = &scenes[0];

    let mask = image.band(mask_band)?;
    let band_a = clip_to_mask(&resample_nearest(best.image.band(&index.band_a)?, mask), mask);
    let band_b = clip_to_mask(&resample_nearest(best.image.band(&index.band_b)?, mask), mask);

    let result = normalized_difference(&band_a, &band_b)?;
    image.with_band(index.name.clone(), result)
}

/// Append a GLCM dissimilarity texture band.
pub fn add_texture_dissimilarity(
    image: &MultibandRaster,
    band: &str,
    name: &str,
    params: GlcmParams,
) -> Result<MultibandRaster> {
    let texture = glcm_dissimilarity(image.band(band)?, params)?;
    image.with_band(name, texture)
}

/// Run the full extraction pass: normalized difference, optional
/// cross-source index, then texture dissimilarity. The order is fixed
/// for stable band layout only; the bands are independent.
pub fn extract_features(
    image: &MultibandRaster,
    params: &FeatureParams,
    aux: Option<(&dyn SceneCatalog, &CrossSourceIndex)>,
) -> Result<MultibandRaster> {
    let mut image = add_normalized_difference(
        image,
        &params.nd_band_a,
        &params.nd_band_b,
        &params.nd_name,
    )?;

    if let Some((catalog, index)) = aux {
        image = add_cross_source_index(&image, catalog, index, &params.nd_band_b)?;
    }

    add_texture_dissimilarity(&image, &params.texture_band, &params.texture_name, params.glcm.clone())
}

/// Nearest-neighbor resample of `source` onto `target`'s grid.
///
/// Each target pixel center is mapped through both geotransforms; centers
/// falling outside the source become NaN. Alignment beyond this simple
/// lookup (reprojection) is an upstream precondition.
fn resample_nearest(source: &Raster<f64>, target: &Raster<f64>) -> Raster<f64> {
    let (rows, cols) = target.shape();
    let (src_rows, src_cols) = source.shape();
    let mut out = target.with_same_meta::<f64>(rows, cols);
    out.set_nodata(Some(f64::NAN));

    for row in 0..rows {
        for col in 0..cols {
            let (x, y) = target.transform().pixel_to_geo(col, row);
            let (src_col, src_row) = source.transform().geo_to_pixel(x, y);
            let value = if src_col.is_nan() || src_row.is_nan() {
                f64::NAN
            } else {
                let sr = src_row.floor();
                let sc = src_col.floor();
                if sr < 0.0 || sc < 0.0 || sr >= src_rows as f64 || sc >= src_cols as f64 {
                    f64::NAN
                } else {
                    unsafe { source.get_unchecked(sr as usize, sc as usize) }
                }
            };
            unsafe { out.set_unchecked(row, col, value) };
        }
    }
    out
}

/// Blank out cells where the mask band has no valid data.
fn clip_to_mask(raster: &Raster<f64>, mask: &Raster<f64>) -> Raster<f64> {
    let (rows, cols) = raster.shape();
    let mut out = raster.clone();
    for row in 0..rows {
        for col in 0..cols {
            let m = unsafe { mask.get_unchecked(row, col) };
            if !m.is_finite() || mask.is_nodata(m) {
                unsafe { out.set_unchecked(row, col, f64::NAN) };
            }
        }
    }
    out
}
