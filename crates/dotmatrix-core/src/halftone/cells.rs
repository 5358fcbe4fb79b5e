use ndarray::{s, Array2};
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

use super::EffectParams;

/// One tile of the dot grid, clipped to the frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    /// Arithmetic mean luminance over the clipped region, in [0, 255].
    pub mean: f64,
}

/// Top-left coordinates of the cells along one axis.
pub fn cell_origins(extent: usize, step: usize) -> impl Iterator<Item = usize> {
    (0..extent).step_by(step.max(1))
}

/// Mean luminance of every non-empty cell, in row-major order.
///
/// Rows of cells are independent and read-only over `luma`, so large frames
/// are split across the Rayon pool. The result is the same either way.
pub fn cell_means(luma: &Array2<u8>, params: &EffectParams) -> Vec<Cell> {
    let (h, w) = luma.dim();
    let step = params.step();
    let size = params.dot_size as usize;
    let rows: Vec<usize> = cell_origins(h, step).collect();

    let row_cells = |y: usize| -> Vec<Cell> {
        let y_end = (y + size).min(h);
        cell_origins(w, step)
            .filter_map(|x| {
                let x_end = (x + size).min(w);
                let region = luma.slice(s![y..y_end, x..x_end]);
                if region.is_empty() {
                    return None;
                }
                let sum: u64 = region.iter().map(|&v| v as u64).sum();
                Some(Cell {
                    x,
                    y,
                    width: x_end - x,
                    height: y_end - y,
                    mean: sum as f64 / region.len() as f64,
                })
            })
            .collect()
    };

    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        let per_row: Vec<Vec<Cell>> = rows.into_par_iter().map(row_cells).collect();
        per_row.into_iter().flatten().collect()
    } else {
        rows.into_iter().flat_map(row_cells).collect()
    }
}
