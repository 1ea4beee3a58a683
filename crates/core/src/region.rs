//! Labeled training regions

use crate::raster::GeoTransform;
use geo::Contains;
use geo_types::{Point, Polygon};
use serde::{Deserialize, Serialize};

/// A named polygon carrying a land-cover class label.
///
/// Regions are evaluated against a raster through its geotransform: a
/// pixel belongs to the region when its center falls inside the polygon.
#[derive(Debug, Clone)]
pub struct LabeledRegion {
    /// Human-readable name (e.g. "villages", "water")
    pub name: String,
    /// Integer class label
    pub label: i32,
    /// Region geometry in the raster's coordinate space
    pub geometry: Polygon<f64>,
}

impl LabeledRegion {
    pub fn new(name: impl Into<String>, label: i32, geometry: Polygon<f64>) -> Self {
        Self {
            name: name.into(),
            label,
            geometry,
        }
    }

    /// Whether the geographic point (x, y) lies inside the region
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.geometry.contains(&Point::new(x, y))
    }

    /// Pixel indices of a `(rows, cols)` grid whose centers fall inside
    /// the region, visited at the given stride.
    ///
    /// `stride` stands in for an analysis scale coarser than the grid:
    /// `sampling_stride` converts a scale in map units to a stride. The
    /// polygon's bounding box is intersected with the grid first, so
    /// regions outside the raster extent simply yield no pixels.
    pub fn pixel_indices(
        &self,
        transform: &GeoTransform,
        rows: usize,
        cols: usize,
        stride: usize,
    ) -> Vec<(usize, usize)> {
        let stride = stride.max(1);
        let exterior = self.geometry.exterior();
        if exterior.0.is_empty() {
            return Vec::new();
        }

        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for coord in &exterior.0 {
            min_x = min_x.min(coord.x);
            min_y = min_y.min(coord.y);
            max_x = max_x.max(coord.x);
            max_y = max_y.max(coord.y);
        }

        // Corner pixel indices of the bounding box, clamped to the grid
        let (c0, r0) = transform.geo_to_pixel(min_x, max_y);
        let (c1, r1) = transform.geo_to_pixel(max_x, min_y);
        let row_lo = r0.min(r1).floor().max(0.0) as usize;
        let row_hi = (r0.max(r1).ceil() as i64).clamp(0, rows as i64) as usize;
        let col_lo = c0.min(c1).floor().max(0.0) as usize;
        let col_hi = (c0.max(c1).ceil() as i64).clamp(0, cols as i64) as usize;

        let mut indices = Vec::new();
        let mut row = row_lo;
        while row < row_hi {
            let mut col = col_lo;
            while col < col_hi {
                let (x, y) = transform.pixel_to_geo(col, row);
                if self.contains(x, y) {
                    indices.push((row, col));
                }
                col += stride;
            }
            row += stride;
        }
        indices
    }
}

/// Convert an analysis scale in map units to a pixel stride for the
/// given cell size. A scale at or below the cell size means every pixel.
pub fn sampling_stride(scale: f64, cell_size: f64) -> usize {
    if scale <= 0.0 || cell_size <= 0.0 {
        return 1;
    }
    (scale / cell_size).round().max(1.0) as usize
}

/// Wire format for labeled-region input files: a JSON array of
/// `{name, label, ring: [[x, y], ...]}` objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionRecord {
    pub name: String,
    pub label: i32,
    /// Exterior ring vertices; closed automatically if the file leaves
    /// the ring open
    pub ring: Vec<[f64; 2]>,
}

impl From<RegionRecord> for LabeledRegion {
    fn from(record: RegionRecord) -> Self {
        let coords: Vec<(f64, f64)> = record.ring.iter().map(|p| (p[0], p[1])).collect();
        let geometry = Polygon::new(coords.into(), vec![]);
        LabeledRegion::new(record.name, record.label, geometry)
    }
}
