//! Native raster I/O
//!
//! Reads and writes single-band grayscale TIFF files with an ESRI world
//! file (`.tfw`) sidecar carrying the geotransform. This round-trips
//! everything [`GeoTransform`] holds without GeoTIFF tag plumbing.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;

/// Options for exporting a raster.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Maximum number of pixels to export. Larger rasters fail with
    /// `CapacityExceeded`; output is never silently truncated.
    pub max_pixels: Option<u64>,
}

/// Write a raster as a grayscale 32-bit float TIFF plus world file.
///
/// NaN cells are written as-is; readers treat them as nodata.
pub fn write_raster<P: AsRef<Path>>(
    path: P,
    raster: &Raster<f64>,
    options: &ExportOptions,
) -> Result<()> {
    let pixels = raster.len() as u64;
    if let Some(max_pixels) = options.max_pixels {
        if pixels > max_pixels {
            return Err(Error::CapacityExceeded {
                pixels,
                max_pixels,
            });
        }
    }

    let (rows, cols) = raster.shape();
    let data: Vec<f32> = raster.data().iter().map(|&v| v as f32).collect();

    let file = File::create(path.as_ref())?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))
        .map_err(|e| Error::Other(format!("TIFF encode error: {}", e)))?;
    encoder
        .write_image::<Gray32Float>(cols as u32, rows as u32, &data)
        .map_err(|e| Error::Other(format!("TIFF encode error: {}", e)))?;

    write_world_file(&world_file_path(path.as_ref()), raster.transform())?;
    Ok(())
}

/// Read a grayscale TIFF (any supported sample format) into a `Raster<f64>`.
///
/// A world file next to the TIFF is applied when present; otherwise the
/// default unit transform is used.
pub fn read_raster<P: AsRef<Path>>(path: P) -> Result<Raster<f64>> {
    let file = File::open(path.as_ref())?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<f64> = match result {
        DecodingResult::F32(buf) => buf.iter().map(|&v| v as f64).collect(),
        DecodingResult::F64(buf) => buf,
        DecodingResult::U8(buf) => buf.iter().map(|&v| v as f64).collect(),
        DecodingResult::U16(buf) => buf.iter().map(|&v| v as f64).collect(),
        DecodingResult::U32(buf) => buf.iter().map(|&v| v as f64).collect(),
        DecodingResult::I8(buf) => buf.iter().map(|&v| v as f64).collect(),
        DecodingResult::I16(buf) => buf.iter().map(|&v| v as f64).collect(),
        DecodingResult::I32(buf) => buf.iter().map(|&v| v as f64).collect(),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;
    raster.set_nodata(Some(f64::NAN));
    if let Some(transform) = read_world_file(&world_file_path(path.as_ref()))? {
        raster.set_transform(transform);
    }
    Ok(raster)
}

fn world_file_path(path: &Path) -> PathBuf {
    path.with_extension("tfw")
}

fn write_world_file(path: &Path, transform: &GeoTransform) -> Result<()> {
    // World-file origin is the center of the upper-left pixel
    let (cx, cy) = transform.pixel_to_geo(0, 0);
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "{}", transform.pixel_width)?;
    writeln!(file, "0.0")?;
    writeln!(file, "0.0")?;
    writeln!(file, "{}", transform.pixel_height)?;
    writeln!(file, "{}", cx)?;
    writeln!(file, "{}", cy)?;
    Ok(())
}

fn read_world_file(path: &Path) -> Result<Option<GeoTransform>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let values: Vec<f64> = content
        .lines()
        .filter_map(|line| line.trim().parse::<f64>().ok())
        .collect();
    if values.len() != 6 {
        return Err(Error::Other(format!(
            "malformed world file: {}",
            path.display()
        )));
    }
    let pixel_width = values[0];
    let pixel_height = values[3];
    // Convert pixel-center origin back to the corner convention
    let origin_x = values[4] - 0.5 * pixel_width;
    let origin_y = values[5] - 0.5 * pixel_height;
    Ok(Some(GeoTransform::new(
        origin_x,
        origin_y,
        pixel_width,
        pixel_height,
    )))
}
