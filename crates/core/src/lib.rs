//! # settlemap core
//!
//! Core types and I/O for the settlemap land-cover pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: generic single-band raster grid
//! - `MultibandRaster`: co-registered stack of named bands
//! - `GeoTransform`: affine georeferencing
//! - `LabeledRegion`: polygon training regions with class labels
//! - File I/O and the export/visualization collaborator interfaces

pub mod display;
pub mod error;
pub mod io;
pub mod raster;
pub mod region;

pub use error::{Error, Result};
pub use raster::{GeoTransform, MultibandRaster, Raster, RasterElement};
pub use region::{sampling_stride, LabeledRegion, RegionRecord};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, MultibandRaster, Raster, RasterElement};
    pub use crate::region::{sampling_stride, LabeledRegion};
}
