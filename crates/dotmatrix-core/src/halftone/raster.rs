use ndarray::Array3;

/// Dot radius for a cell of mean luminance `mean`.
///
/// Scales linearly from 0 (black) to `dot_size / 2` (white).
pub fn dot_radius(mean: f64, dot_size: u32) -> u32 {
    let half = (dot_size / 2) as f64;
    ((mean.clamp(0.0, 255.0) / 255.0) * half).round() as u32
}

/// Fill every pixel within `radius` of `(cx, cy)` with `value` on all channels.
///
/// Pixels outside the canvas are skipped.
pub fn fill_circle(canvas: &mut Array3<u8>, cx: i64, cy: i64, radius: u32, value: u8) {
    let (h, w, channels) = canvas.dim();
    let r = radius as i64;
    let r2 = r * r;

    let y_start = (cy - r).max(0);
    let y_end = (cy + r).min(h as i64 - 1);
    for py in y_start..=y_end {
        let dy = py - cy;
        let x_start = (cx - r).max(0);
        let x_end = (cx + r).min(w as i64 - 1);
        for px in x_start..=x_end {
            let dx = px - cx;
            if dx * dx + dy * dy > r2 {
                continue;
            }
            for c in 0..channels {
                canvas[[py as usize, px as usize, c]] = value;
            }
        }
    }
}
