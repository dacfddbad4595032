use std::ops::Range;
use std::path::Path;

use glam::Vec3;
use sunview_core::{diag, Resolved};

use crate::palette;

/// One named object from the OBJ file with its triangles and display color
#[derive(Clone, Debug)]
pub struct Part {
    pub name: String,
    /// Model-scaled positions, local to this part
    pub vertices: Vec<Vec3>,
    /// Triangles as 0-based local vertex indices
    pub faces: Vec<[u32; 3]>,
    pub color: [f32; 3],
}

impl Part {
    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }
}

/// Per-vertex attributes after flattening, ready for buffer upload
#[derive(Clone, Copy, Debug)]
pub struct FlatVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: [f32; 3],
}

/// The satellite as an ordered list of parts. Part order is file order and
/// defines the part indices used everywhere else (solar cell selection,
/// occlusion queries, output columns).
pub struct SatelliteModel {
    parts: Vec<Part>,
    dirty: bool,
}

impl SatelliteModel {
    /// Parse the OBJ subset (`o`, `v`, `f`) and assign display colors.
    /// Faces keep only their first three indices; vertex indices are
    /// global in the file and rebased per part. Bad lines are reported
    /// and skipped, a missing file yields an empty model.
    pub fn load(path: &Path, resolved: &Resolved) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                diag::report(&format!(
                    "model file {} unreadable: {}",
                    path.display(),
                    e
                ));
                return Self {
                    parts: Vec::new(),
                    dirty: true,
                };
            }
        };
        let mut model = Self::parse(&text, resolved.scenario.model_scale);
        model.assign_colors(resolved.scenario.use_grayscale);
        tracing::info!(
            "loaded {} parts ({} triangles) from {}",
            model.parts.len(),
            model.triangle_count(),
            path.display()
        );
        model
    }

    fn parse(text: &str, scale: f32) -> Self {
        let mut parts: Vec<Part> = Vec::new();
        // vertices declared in all closed parts; OBJ indices are global
        let mut offset: u32 = 0;

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if let Some(name) = line.strip_prefix("o ") {
                if let Some(prev) = parts.last() {
                    offset += prev.vertices.len() as u32;
                }
                parts.push(Part {
                    name: name.trim().to_string(),
                    vertices: Vec::new(),
                    faces: Vec::new(),
                    color: [1.0, 1.0, 1.0],
                });
            } else if let Some(rest) = line.strip_prefix("v ") {
                let Some(part) = parts.last_mut() else {
                    diag::report(&format!(
                        "obj line {}: vertex before any object, skipped",
                        line_no + 1
                    ));
                    continue;
                };
                let mut coords = rest
                    .split_whitespace()
                    .map(|t| t.parse::<f32>());
                match (coords.next(), coords.next(), coords.next()) {
                    (Some(Ok(x)), Some(Ok(y)), Some(Ok(z))) => {
                        part.vertices.push(Vec3::new(x, y, z) * scale);
                    }
                    _ => diag::report(&format!(
                        "obj line {}: malformed vertex, skipped",
                        line_no + 1
                    )),
                }
            } else if let Some(rest) = line.strip_prefix("f ") {
                let Some(part) = parts.last_mut() else {
                    diag::report(&format!(
                        "obj line {}: face before any object, skipped",
                        line_no + 1
                    ));
                    continue;
                };
                if let Some(tri) =
                    parse_face(rest, offset, part.vertices.len(), line_no + 1)
                {
                    part.faces.push(tri);
                }
            }
            // every other prefix (vn, vt, s, mtllib, comments) is irrelevant here
        }

        Self { parts, dirty: true }
    }

    /// Assign palette colors in part order, wrapping when the palette is
    /// shorter than the part list. An empty palette keeps the defaults.
    pub fn assign_colors(&mut self, grayscale: bool) {
        let colors = if grayscale {
            palette::grayscale(self.parts.len())
        } else {
            palette::rgb_grid(self.parts.len())
        };
        if colors.is_empty() {
            return;
        }
        for (i, part) in self.parts.iter_mut().enumerate() {
            part.color = colors[i % colors.len()];
        }
        self.dirty = true;
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(|p| p.faces.len()).sum()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// True exactly once after geometry or colors changed; the renderer
    /// rebuilds its buffers when it sees it.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// Expand triangles into one contiguous vertex run per part. Normals
    /// cycle through the coordinate axes; the depth-only measurement never
    /// shades, so they only have to be well-formed.
    pub fn flatten(&self) -> (Vec<FlatVertex>, Vec<Range<u32>>) {
        const NORMALS: [Vec3; 3] = [Vec3::X, Vec3::Y, Vec3::Z];
        let mut vertices = Vec::with_capacity(self.triangle_count() * 3);
        let mut ranges = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            let start = vertices.len() as u32;
            for face in &part.faces {
                for (slot, &idx) in face.iter().enumerate() {
                    vertices.push(FlatVertex {
                        position: part.vertices[idx as usize],
                        normal: NORMALS[slot],
                        color: part.color,
                    });
                }
            }
            ranges.push(start..vertices.len() as u32);
        }
        (vertices, ranges)
    }
}

/// One `f` line body. Extra indices beyond the first three are dropped,
/// `v/vt/vn` takes the part before the first slash, and anything out of
/// the current part's declared range invalidates the face.
fn parse_face(
    rest: &str,
    offset: u32,
    vertex_count: usize,
    line_no: usize,
) -> Option<[u32; 3]> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.len() < 3 {
        diag::report(&format!(
            "obj line {}: face with {} indices, skipped",
            line_no,
            tokens.len()
        ));
        return None;
    }
    if tokens.len() > 3 {
        tracing::debug!(
            "obj line {}: {}-gon truncated to its first triangle",
            line_no,
            tokens.len()
        );
    }

    let mut tri = [0u32; 3];
    for (slot, token) in tokens.iter().take(3).enumerate() {
        let index_text = token.split('/').next().unwrap_or(token);
        let global = match index_text.parse::<i64>() {
            Ok(v) => v,
            Err(_) => {
                diag::report(&format!(
                    "obj line {}: bad face index {:?}, skipped",
                    line_no, token
                ));
                return None;
            }
        };
        let local = global - offset as i64;
        if local < 1 || local > vertex_count as i64 {
            diag::report(&format!(
                "obj line {}: face index {} outside part ({} vertices), skipped",
                line_no, global, vertex_count
            ));
            return None;
        }
        tri[slot] = (local - 1) as u32;
    }
    Some(tri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sunview_core::Scenario;

    const TWO_PARTS: &str = "\
o panel_a
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
f 1 2 3
f 1 3 4
o panel_b
v 0.0 0.0 1.0
v 1.0 0.0 1.0
v 1.0 1.0 1.0
f 5/1/1 6/2/2 7/3/3
";

    #[test]
    fn test_parts_and_rebased_indices() {
        let model = SatelliteModel::parse(TWO_PARTS, 1.0);
        assert_eq!(model.part_count(), 2);

        let a = &model.parts()[0];
        assert_eq!(a.name, "panel_a");
        assert_eq!(a.vertices.len(), 4);
        assert_eq!(a.faces, vec![[0, 1, 2], [0, 2, 3]]);

        // panel_b faces are global 5..7, rebased to local 0..2
        let b = &model.parts()[1];
        assert_eq!(b.vertices.len(), 3);
        assert_eq!(b.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_model_scale_applies_to_vertices() {
        let model = SatelliteModel::parse("o p\nv 1.0 2.0 3.0\n", 2.5);
        let v = model.parts()[0].vertices[0];
        assert!((v - Vec3::new(2.5, 5.0, 7.5)).length() < 1e-6);
    }

    #[test]
    fn test_ngon_keeps_first_triangle() {
        let obj = "o p\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let model = SatelliteModel::parse(obj, 1.0);
        assert_eq!(model.parts()[0].faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_short_face_skipped_parsing_continues() {
        let obj = "o p\nv 0 0 0\nv 1 0 0\nv 1 1 0\nf 1 2\nf 1 2 3\n";
        let before = diag::count();
        let model = SatelliteModel::parse(obj, 1.0);
        assert_eq!(model.parts()[0].faces, vec![[0, 1, 2]]);
        assert!(diag::count() > before);
    }

    #[test]
    fn test_out_of_range_index_skipped() {
        let obj = "o p\nv 0 0 0\nv 1 0 0\nv 1 1 0\nf 1 2 9\nf 3 2 1\n";
        let before = diag::count();
        let model = SatelliteModel::parse(obj, 1.0);
        assert_eq!(model.parts()[0].faces, vec![[2, 1, 0]]);
        assert!(diag::count() > before);
    }

    #[test]
    fn test_vertex_before_object_skipped() {
        let before = diag::count();
        let model = SatelliteModel::parse("v 0 0 0\no p\nv 1 1 1\n", 1.0);
        assert_eq!(model.part_count(), 1);
        assert_eq!(model.parts()[0].vertices.len(), 1);
        assert!(diag::count() > before);
    }

    #[test]
    fn test_flatten_ranges_and_normals() {
        let mut model = SatelliteModel::parse(TWO_PARTS, 1.0);
        model.assign_colors(true);
        let (vertices, ranges) = model.flatten();

        assert_eq!(vertices.len(), 9);
        assert_eq!(ranges, vec![0..6, 6..9]);

        // normals cycle X, Y, Z within each triangle
        assert_eq!(vertices[0].normal, Vec3::X);
        assert_eq!(vertices[1].normal, Vec3::Y);
        assert_eq!(vertices[2].normal, Vec3::Z);
        assert_eq!(vertices[3].normal, Vec3::X);

        // each run carries its part's color
        let a = model.parts()[0].color;
        let b = model.parts()[1].color;
        assert_eq!(vertices[0].color, a);
        assert_eq!(vertices[8].color, b);
        assert!(a[0] < b[0], "grayscale ramp should brighten with index");
    }

    #[test]
    fn test_grayscale_assignment() {
        let mut model = SatelliteModel::parse(TWO_PARTS, 1.0);
        model.assign_colors(true);
        // two parts: 1/3 and 2/3 gray
        let a = model.parts()[0].color[0];
        let b = model.parts()[1].color[0];
        assert!((a - 1.0 / 3.0).abs() < 1e-6);
        assert!((b - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_dirty_flag_lifecycle() {
        let mut model = SatelliteModel::parse("o p\nv 0 0 0\n", 1.0);
        assert!(model.take_dirty());
        assert!(!model.take_dirty());
        model.assign_colors(true);
        assert!(model.take_dirty());
        model.mark_dirty();
        assert!(model.take_dirty());
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let before = diag::count();
        let resolved = Scenario::default().resolve();
        let model =
            SatelliteModel::load(Path::new("/nonexistent/model.obj"), &resolved);
        assert!(model.is_empty());
        assert!(diag::count() > before);
    }
}
