//! Raster data structures

mod element;
mod geotransform;
mod grid;
mod multiband;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::Raster;
pub use multiband::MultibandRaster;
