//! Class separability diagnostics
//!
//! Summarizes every labeled region against every band of the composite
//! with mean, median and standard deviation. Purely a side path: nothing
//! downstream depends on the report, and degenerate regions produce NaN
//! rows instead of aborting the run.

use serde::Serialize;
use settlemap_core::raster::MultibandRaster;
use settlemap_core::region::{sampling_stride, LabeledRegion};
use settlemap_core::Result;
use std::fmt;

/// Per-region summary row; one entry per band, NaN where the region had
/// no valid pixels.
#[derive(Debug, Clone, Serialize)]
pub struct RegionStats {
    pub region: String,
    pub label: i32,
    /// Valid pixels that contributed, per band
    pub pixel_count: Vec<usize>,
    pub mean: Vec<f64>,
    pub median: Vec<f64>,
    pub std_dev: Vec<f64>,
}

/// The three (region x band) statistic tables.
#[derive(Debug, Clone, Serialize)]
pub struct SeparabilityReport {
    pub bands: Vec<String>,
    pub regions: Vec<RegionStats>,
}

/// Summarize class separability over the labeled regions.
///
/// `scale` is the analysis resolution in map units; pixels are visited at
/// the matching stride. A region outside the raster's valid extent yields
/// a NaN row.
pub fn summarize(
    image: &MultibandRaster,
    regions: &[LabeledRegion],
    scale: f64,
) -> Result<SeparabilityReport> {
    let (rows, cols) = image.shape();
    let stride = sampling_stride(scale, image.cell_size());
    let n_bands = image.band_count();

    let mut report = SeparabilityReport {
        bands: image.band_names().to_vec(),
        regions: Vec::with_capacity(regions.len()),
    };

    for region in regions {
        let pixels = region.pixel_indices(image.transform(), rows, cols, stride);

        let mut per_band: Vec<Vec<f64>> = vec![Vec::new(); n_bands];
        for &(row, col) in &pixels {
            for (band_idx, band) in image.bands().iter().enumerate() {
                let v = unsafe { band.get_unchecked(row, col) };
                if v.is_finite() && !band.is_nodata(v) {
                    per_band[band_idx].push(v);
                }
            }
        }

        let mut stats = RegionStats {
            region: region.name.clone(),
            label: region.label,
            pixel_count: Vec::with_capacity(n_bands),
            mean: Vec::with_capacity(n_bands),
            median: Vec::with_capacity(n_bands),
            std_dev: Vec::with_capacity(n_bands),
        };

        for values in &mut per_band {
            stats.pixel_count.push(values.len());
            if values.is_empty() {
                stats.mean.push(f64::NAN);
                stats.median.push(f64::NAN);
                stats.std_dev.push(f64::NAN);
                continue;
            }

            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let count = values.len();
            let median = if count % 2 == 0 {
                (values[count / 2 - 1] + values[count / 2]) / 2.0
            } else {
                values[count / 2]
            };

            stats.mean.push(mean);
            stats.median.push(median);
            stats.std_dev.push(var.sqrt());
        }

        report.regions.push(stats);
    }

    Ok(report)
}

impl SeparabilityReport {
    fn write_table(
        &self,
        f: &mut fmt::Formatter<'_>,
        title: &str,
        pick: impl Fn(&RegionStats) -> &[f64],
    ) -> fmt::Result {
        writeln!(f, "{}:", title)?;
        write!(f, "{:<16}", "region")?;
        for band in &self.bands {
            write!(f, "{:>12}", band)?;
        }
        writeln!(f)?;
        for stats in &self.regions {
            write!(f, "{:<16}", stats.region)?;
            for value in pick(stats) {
                write!(f, "{:>12.4}", value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for SeparabilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_table(f, "mean for each cover", |s| &s.mean)?;
        writeln!(f)?;
        self.write_table(f, "median for each cover", |s| &s.median)?;
        writeln!(f)?;
        self.write_table(f, "standard deviation for each cover", |s| &s.std_dev)
    }
}
