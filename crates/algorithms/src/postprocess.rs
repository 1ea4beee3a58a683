//! Classified-raster cleanup
//!
//! Turns a raw class raster into the final settlement mask in three
//! steps: circular focal-mean smoothing, occupancy thresholding around
//! the target class value, and a minimum-mapping-unit filter on
//! connected components. Smoothing deliberately trades boundary
//! sharpness for patch coherence; settlements cluster, so filling small
//! in-patch gaps beats keeping fragmented true positives.

use crate::maybe_rayon::*;
use ndarray::Array2;
use settlemap_core::raster::Raster;
use settlemap_core::{Error, Result};
use std::collections::VecDeque;

/// Pixel adjacency for component labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Edge neighbors only
    Four,
    /// Edge and corner neighbors
    #[default]
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &[(-1, 0), (1, 0), (0, -1), (0, 1)],
            Connectivity::Eight => &[
                (-1, -1),
                (-1, 0),
                (-1, 1),
                (0, -1),
                (0, 1),
                (1, -1),
                (1, 0),
                (1, 1),
            ],
        }
    }
}

/// Cleanup configuration.
///
/// Threaded explicitly through [`clean`]; there is no module-level
/// tuning state. `component_min_size` is scenario-dependent (the minimum
/// mapping unit) and has no default on purpose: construct params through
/// [`CleanParams::new`], which demands it alongside the target class.
#[derive(Debug, Clone)]
pub struct CleanParams {
    /// Radius of the circular smoothing window, in pixels
    pub smooth_radius: usize,
    /// Numeric encoding of the class to isolate
    pub target_class: f64,
    /// Keep pixels whose smoothed value lies within this distance of
    /// `target_class`
    pub occupancy_threshold: f64,
    /// Minimum connected-patch size, in pixels (the MMU)
    pub component_min_size: usize,
    pub connectivity: Connectivity,
}

impl CleanParams {
    pub fn new(target_class: f64, component_min_size: usize) -> Self {
        Self {
            smooth_radius: 7,
            target_class,
            occupancy_threshold: 0.25,
            component_min_size,
            connectivity: Connectivity::Eight,
        }
    }
}

/// Focal mean of the class values over a circular window.
///
/// Class labels are treated numerically; the mean acts as a
/// majority-vote-like low pass that fills single-pixel gaps inside
/// otherwise coherent patches.
pub fn smooth(classified: &Raster<f64>, radius: usize) -> Result<Raster<f64>> {
    if radius == 0 {
        return Err(Error::InvalidParameter {
            name: "smooth_radius",
            value: "0".to_string(),
            reason: "smoothing window must be non-empty".to_string(),
        });
    }

    let (rows, cols) = classified.shape();
    let r = radius as isize;
    let r_sq = (radius * radius) as isize;

    let mut offsets = Vec::new();
    for dr in -r..=r {
        for dc in -r..=r {
            if dr * dr + dc * dc <= r_sq {
                offsets.push((dr, dc));
            }
        }
    }

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let mut sum = 0.0;
                let mut count = 0usize;
                for &(dr, dc) in &offsets {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr >= 0 && nc >= 0 && (nr as usize) < rows && (nc as usize) < cols {
                        let v = unsafe { classified.get_unchecked(nr as usize, nc as usize) };
                        if !v.is_nan() {
                            sum += v;
                            count += 1;
                        }
                    }
                }
                if count > 0 {
                    *out = sum / count as f64;
                }
            }
            row_data
        })
        .collect();

    let mut output = classified.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

/// Binary occupancy mask: 1 where the smoothed value lies within
/// `threshold` of `target_class`, 0 elsewhere (NaN counts as background).
pub fn threshold_occupancy(
    smoothed: &Raster<f64>,
    target_class: f64,
    threshold: f64,
) -> Result<Raster<u8>> {
    if threshold <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "occupancy_threshold",
            value: threshold.to_string(),
            reason: "threshold must be positive".to_string(),
        });
    }

    let (rows, cols) = smoothed.shape();
    let mut mask = smoothed.with_same_meta::<u8>(rows, cols);
    for row in 0..rows {
        for col in 0..cols {
            let v = unsafe { smoothed.get_unchecked(row, col) };
            let retained = v.is_finite() && (v - target_class).abs() < threshold;
            unsafe { mask.set_unchecked(row, col, retained as u8) };
        }
    }
    Ok(mask)
}

/// Per-pixel size of the connected foreground patch containing the
/// pixel, saturated at `cap`.
///
/// One flood fill labels each component exactly once; the stored value
/// is `min(size, cap)`, so equality with `cap` reads as "patch size at
/// least cap". Background pixels get 0.
pub fn connected_pixel_count(
    mask: &Raster<u8>,
    cap: usize,
    connectivity: Connectivity,
) -> Result<Raster<u32>> {
    if cap == 0 {
        return Err(Error::InvalidParameter {
            name: "cap",
            value: "0".to_string(),
            reason: "component size cap must be positive".to_string(),
        });
    }

    let (rows, cols) = mask.shape();
    let mut counts = mask.with_same_meta::<u32>(rows, cols);
    let mut visited = vec![false; rows * cols];
    let offsets = connectivity.offsets();
    let mut component: Vec<(usize, usize)> = Vec::new();
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

    for start_row in 0..rows {
        for start_col in 0..cols {
            if visited[start_row * cols + start_col] {
                continue;
            }
            if unsafe { mask.get_unchecked(start_row, start_col) } == 0 {
                visited[start_row * cols + start_col] = true;
                continue;
            }

            component.clear();
            queue.clear();
            visited[start_row * cols + start_col] = true;
            queue.push_back((start_row, start_col));

            while let Some((row, col)) = queue.pop_front() {
                component.push((row, col));
                for &(dr, dc) in offsets {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if visited[nr * cols + nc] {
                        continue;
                    }
                    visited[nr * cols + nc] = true;
                    if unsafe { mask.get_unchecked(nr, nc) } != 0 {
                        queue.push_back((nr, nc));
                    }
                }
            }

            let size = component.len().min(cap) as u32;
            for &(row, col) in &component {
                unsafe { counts.set_unchecked(row, col, size) };
            }
        }
    }

    Ok(counts)
}

/// Drop connected patches smaller than `min_size` pixels.
///
/// The counting saturates at `min_size`, so the retained set is exactly
/// "capped count equals the cap", i.e. patch size >= `min_size`.
/// Idempotent: surviving patches already meet the bound, so a second
/// pass changes nothing.
pub fn filter_small_components(
    mask: &Raster<u8>,
    min_size: usize,
    connectivity: Connectivity,
) -> Result<Raster<u8>> {
    let counts = connected_pixel_count(mask, min_size, connectivity)?;
    let (rows, cols) = mask.shape();
    let mut output = mask.like(0);
    for row in 0..rows {
        for col in 0..cols {
            let keep = unsafe { counts.get_unchecked(row, col) } as usize == min_size;
            unsafe { output.set_unchecked(row, col, keep as u8) };
        }
    }
    Ok(output)
}

/// Full cleanup: smooth, threshold, remove sub-MMU patches.
pub fn clean(classified: &Raster<f64>, params: &CleanParams) -> Result<Raster<u8>> {
    let smoothed = smooth(classified, params.smooth_radius)?;
    let occupancy = threshold_occupancy(
        &smoothed,
        params.target_class,
        params.occupancy_threshold,
    )?;
    filter_small_components(&occupancy, params.component_min_size, params.connectivity)
}
