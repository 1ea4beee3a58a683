//! Raster file I/O

mod native;

pub use native::{read_raster, write_raster, ExportOptions};
