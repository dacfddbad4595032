//! Deterministic display colors for satellite parts. Snapshots and part
//! listings use these; the area measurement never reads them.

/// Evenly spaced gray levels, `1 / (n + 1)` apart, open at both ends.
pub fn grayscale(part_count: usize) -> Vec<[f32; 3]> {
    let mut colors = Vec::new();
    if part_count == 0 {
        return colors;
    }
    let step = 1.0 / (part_count as f32 + 1.0);
    let mut g = step;
    while g < 1.0 {
        colors.push([g, g, g]);
        g += step;
    }
    colors
}

/// RGB grid with channel spacing `3 / n`. The grid is empty below four
/// parts; callers keep their default color when that happens.
pub fn rgb_grid(part_count: usize) -> Vec<[f32; 3]> {
    let mut colors = Vec::new();
    if part_count == 0 {
        return colors;
    }
    let step = 3.0 / part_count as f32;
    let mut r = step;
    while r < 1.0 {
        let mut g = step;
        while g < 1.0 {
            let mut b = step;
            while b < 1.0 {
                colors.push([r, g, b]);
                b += step;
            }
            g += step;
        }
        r += step;
    }
    colors
}
