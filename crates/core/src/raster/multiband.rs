//! Multi-band raster stack with named bands

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};

/// An ordered stack of co-registered `f64` bands with unique names.
///
/// All bands share identical grid geometry; that invariant is enforced on
/// construction and append. A pixel is *valid* only if every band holds a
/// finite value there; partial feature vectors are never handed to
/// downstream stages.
///
/// Stages never mutate an image they receive: appending a band goes
/// through [`MultibandRaster::with_band`], which returns a new stack.
#[derive(Debug, Clone)]
pub struct MultibandRaster {
    bands: Vec<Raster<f64>>,
    names: Vec<String>,
}

impl MultibandRaster {
    /// Create a stack from parallel band and name lists.
    ///
    /// Fails on an empty band list, mismatched list lengths, duplicate
    /// names, or bands with differing grid geometry.
    pub fn from_bands(bands: Vec<Raster<f64>>, names: Vec<String>) -> Result<Self> {
        if bands.is_empty() {
            return Err(Error::EmptyInput("band list"));
        }
        if bands.len() != names.len() {
            return Err(Error::Algorithm(format!(
                "{} bands but {} names",
                bands.len(),
                names.len()
            )));
        }

        for band in &bands[1..] {
            bands[0].check_geometry(band)?;
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(Error::DuplicateBand(name.clone()));
            }
        }

        Ok(Self { bands, names })
    }

    /// Number of bands
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Band names, in stack order
    pub fn band_names(&self) -> &[String] {
        &self.names
    }

    /// Index of a band by name
    pub fn band_index(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::UnknownBand(name.to_string()))
    }

    /// Band by name
    pub fn band(&self, name: &str) -> Result<&Raster<f64>> {
        Ok(&self.bands[self.band_index(name)?])
    }

    /// Band by stack position
    pub fn band_at(&self, index: usize) -> Result<&Raster<f64>> {
        self.bands.get(index).ok_or(Error::IndexOutOfBounds {
            row: 0,
            col: index,
            rows: 1,
            cols: self.bands.len(),
        })
    }

    /// All bands, in stack order
    pub fn bands(&self) -> &[Raster<f64>] {
        &self.bands
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.bands[0].shape()
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.bands[0].rows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.bands[0].cols()
    }

    /// Shared geotransform
    pub fn transform(&self) -> &GeoTransform {
        self.bands[0].transform()
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.bands[0].cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.bands[0].bounds()
    }

    /// Return a new stack with `band` appended under `name`.
    ///
    /// The receiver is left untouched. Fails on duplicate names or a band
    /// that doesn't share the stack's geometry.
    pub fn with_band(&self, name: impl Into<String>, band: Raster<f64>) -> Result<Self> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(Error::DuplicateBand(name));
        }
        self.bands[0].check_geometry(&band)?;

        let mut out = self.clone();
        out.bands.push(band);
        out.names.push(name);
        Ok(out)
    }

    /// Whether every band holds a finite value at (row, col)
    pub fn is_valid_at(&self, row: usize, col: usize) -> bool {
        self.bands.iter().all(|b| {
            b.get(row, col)
                .map(|v| v.is_finite() && !b.is_nodata(v))
                .unwrap_or(false)
        })
    }

    /// Feature vector at (row, col), or `None` when any band is nodata
    pub fn feature_vector(&self, row: usize, col: usize) -> Option<Vec<f64>> {
        let mut features = Vec::with_capacity(self.bands.len());
        for band in &self.bands {
            let v = band.get(row, col).ok()?;
            if !v.is_finite() || band.is_nodata(v) {
                return None;
            }
            features.push(v);
        }
        Some(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        Raster::filled(rows, cols, value)
    }

    #[test]
    fn test_from_bands_and_lookup() {
        let image = MultibandRaster::from_bands(
            vec![band(4, 4, 1.0), band(4, 4, 2.0)],
            vec!["b1".into(), "b2".into()],
        )
        .unwrap();

        assert_eq!(image.band_count(), 2);
        assert_eq!(image.band_index("b2").unwrap(), 1);
        assert_eq!(image.band("b1").unwrap().get(0, 0).unwrap(), 1.0);
        assert!(image.band("b9").is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = MultibandRaster::from_bands(
            vec![band(4, 4, 1.0), band(4, 4, 2.0)],
            vec!["b1".into(), "b1".into()],
        );
        assert!(matches!(result, Err(Error::DuplicateBand(_))));
    }

    #[test]
    fn test_geometry_mismatch_rejected() {
        let result = MultibandRaster::from_bands(
            vec![band(4, 4, 1.0), band(4, 5, 2.0)],
            vec!["b1".into(), "b2".into()],
        );
        assert!(matches!(result, Err(Error::GeometryMismatch { .. })));
    }

    #[test]
    fn test_disjoint_grids_rejected() {
        // Same shape is not enough: the bands must share a transform
        let mut off_grid = band(4, 4, 2.0);
        off_grid.set_transform(GeoTransform::new(5000.0, 9000.0, 30.0, -30.0));

        let result = MultibandRaster::from_bands(
            vec![band(4, 4, 1.0), off_grid.clone()],
            vec!["b1".into(), "b2".into()],
        );
        assert!(matches!(result, Err(Error::GeometryMismatch { .. })));

        let image =
            MultibandRaster::from_bands(vec![band(4, 4, 1.0)], vec!["b1".into()]).unwrap();
        assert!(matches!(
            image.with_band("b2", off_grid),
            Err(Error::GeometryMismatch { .. })
        ));
    }

    #[test]
    fn test_with_band_does_not_mutate() {
        let image =
            MultibandRaster::from_bands(vec![band(4, 4, 1.0)], vec!["b1".into()]).unwrap();
        let extended = image.with_band("ndvi", band(4, 4, 0.5)).unwrap();

        assert_eq!(image.band_count(), 1);
        assert_eq!(extended.band_count(), 2);
        assert!(image.with_band("b1", band(4, 4, 0.0)).is_err());
    }

    #[test]
    fn test_feature_vector_nodata_propagation() {
        let mut b2 = band(4, 4, 2.0);
        b2.set(1, 1, f64::NAN).unwrap();

        let image = MultibandRaster::from_bands(
            vec![band(4, 4, 1.0), b2],
            vec!["b1".into(), "b2".into()],
        )
        .unwrap();

        assert_eq!(image.feature_vector(0, 0).unwrap(), vec![1.0, 2.0]);
        assert!(image.feature_vector(1, 1).is_none());
        assert!(!image.is_valid_at(1, 1));
    }
}
