use sunview_core::constants::SUN_INTENSITY;

/// Electrical power from the per-part sunlit areas. Only the configured
/// solar cell parts contribute; indices past the end of the area vector
/// are skipped (the driver warns about them once at startup).
pub fn power_from_areas(
    areas: &[f32],
    solar_cell_parts: &[usize],
    cell_efficiency: f32,
) -> f32 {
    solar_cell_parts
        .iter()
        .filter_map(|&i| areas.get(i))
        .map(|area| area * cell_efficiency * SUN_INTENSITY)
        .sum()
}
