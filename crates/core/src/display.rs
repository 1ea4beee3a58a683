//! Visualization collaborator interface
//!
//! Purely presentational: the pipeline hands finished rasters to a
//! [`MapView`] and makes no correctness claims beyond well-formed input.

use crate::error::Result;
use crate::raster::MultibandRaster;
use serde::{Deserialize, Serialize};

/// Display configuration for a map layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayParams {
    /// Bands to render, in display order (e.g. `["b3", "b2", "b1"]`)
    pub bands: Vec<String>,
    /// Stretch minimum
    pub min: f64,
    /// Stretch maximum
    pub max: f64,
    /// Discrete color palette keyed by class value, lowest class first
    pub palette: Vec<String>,
}

impl Default for DisplayParams {
    fn default() -> Self {
        Self {
            bands: Vec::new(),
            min: 0.0,
            max: 1.0,
            palette: Vec::new(),
        }
    }
}

/// Sink for map layers. Implementations may render, log, or discard.
pub trait MapView {
    fn add_layer(&mut self, name: &str, image: &MultibandRaster, params: &DisplayParams)
        -> Result<()>;
}
