//! GPU sunlit-area estimator
//!
//! Area measurement as numerical integration through the rasterizer: the
//! whole model is depth-rendered from the sun direction, then every part
//! is re-drawn inside its own occlusion query so only fragments that are
//! the frontmost surface at their pixel are counted. Pixel counts scale
//! by the per-pixel physical area and the binary eclipse gate.

use std::ops::Range;
use std::time::{Duration, Instant};

use wgpu::util::DeviceExt;

use sunview_core::Resolved;
use sunview_data::SatelliteModel;

use crate::camera::{CameraUniform, SunCamera};
use crate::context::GpuContext;
use crate::error::{RenderError, RenderResult};
use crate::gpu_types::GpuVertex;
use crate::pipeline::{create_targets, ModelPipelines};

const QUERY_BYTES: u64 = std::mem::size_of::<u64>() as u64;

/// Upper bound on the occlusion-query readback wait
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Model geometry as uploaded: one vertex buffer with a contiguous run
/// per part, plus the query plumbing sized to the part count.
struct Uploaded {
    vertex_buffer: wgpu::Buffer,
    ranges: Vec<Range<u32>>,
    query_set: wgpu::QuerySet,
    resolve_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,
}

pub struct Estimator {
    ctx: GpuContext,
    pipelines: ModelPipelines,
    depth_view: wgpu::TextureView,
    color_view: wgpu::TextureView,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    camera: SunCamera,
    uploaded: Option<Uploaded>,
    pixel_area_m2: f32,
}

impl Estimator {
    pub fn new(ctx: GpuContext, resolved: &Resolved) -> Self {
        let pipelines = ModelPipelines::new(&ctx.device);
        let (depth_view, _color_texture, color_view) =
            create_targets(&ctx.device, resolved.scenario.screen_size_px);

        let camera_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &pipelines.camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        Self {
            camera: SunCamera::new(resolved),
            pixel_area_m2: resolved.pixel_area_m2,
            ctx,
            pipelines,
            depth_view,
            color_view,
            camera_buffer,
            camera_bind_group,
            uploaded: None,
        }
    }

    pub fn camera(&self) -> &SunCamera {
        &self.camera
    }

    /// (Re)build the vertex buffer and query plumbing. Idempotent: does
    /// nothing unless the model's dirty flag is set.
    pub fn upload(&mut self, model: &mut SatelliteModel) {
        if !model.take_dirty() && self.uploaded.is_some() {
            return;
        }
        let (flat, ranges) = model.flatten();
        if ranges.is_empty() {
            self.uploaded = None;
            return;
        }
        let vertices: Vec<GpuVertex> = flat.iter().map(GpuVertex::from).collect();

        let vertex_buffer = self
            .ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Model Vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let part_count = ranges.len() as u32;
        let query_set = self.ctx.device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("Part Occlusion Queries"),
            ty: wgpu::QueryType::Occlusion,
            count: part_count,
        });
        let resolve_buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Query Resolve Buffer"),
            size: part_count as u64 * QUERY_BYTES,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Query Staging Buffer"),
            size: part_count as u64 * QUERY_BYTES,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        tracing::debug!(
            "uploaded {} vertices across {} parts",
            vertices.len(),
            part_count
        );
        self.uploaded = Some(Uploaded {
            vertex_buffer,
            ranges,
            query_set,
            resolve_buffer,
            staging_buffer,
        });
    }

    /// Measure all parts from the given sun direction. One depth prepass
    /// over the whole model, then every part re-drawn inside its own
    /// occlusion query in the same pass; with depth writes off during the
    /// query draws the full-scene depth stays valid for every count.
    pub fn measure(
        &mut self,
        azimuth_deg: f32,
        elevation_deg: f32,
        illuminated: f32,
    ) -> RenderResult<Vec<f32>> {
        self.camera.orient(azimuth_deg, elevation_deg);
        let Some(up) = &self.uploaded else {
            return Ok(Vec::new());
        };
        let part_count = up.ranges.len();

        let uniform = CameraUniform::from_camera(&self.camera);
        self.ctx
            .queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniform));

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Measure Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Measure Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Discard,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: Some(&up.query_set),
            });

            pass.set_bind_group(0, &self.camera_bind_group, &[]);
            pass.set_vertex_buffer(0, up.vertex_buffer.slice(..));

            pass.set_pipeline(&self.pipelines.depth_prepass);
            for range in &up.ranges {
                pass.draw(range.clone(), 0..1);
            }

            pass.set_pipeline(&self.pipelines.query);
            for (i, range) in up.ranges.iter().enumerate() {
                pass.begin_occlusion_query(i as u32);
                pass.draw(range.clone(), 0..1);
                pass.end_occlusion_query();
            }
        }
        encoder.resolve_query_set(&up.query_set, 0..part_count as u32, &up.resolve_buffer, 0);
        encoder.copy_buffer_to_buffer(
            &up.resolve_buffer,
            0,
            &up.staging_buffer,
            0,
            part_count as u64 * QUERY_BYTES,
        );
        self.ctx.queue.submit(std::iter::once(encoder.finish()));

        let counts = self.read_counts(up, part_count)?;
        Ok(counts
            .iter()
            .map(|&c| (c as f32 * self.pixel_area_m2 * illuminated).max(0.0))
            .collect())
    }

    /// Map the staging buffer with a bounded wait. The reference tool
    /// spun forever on its query; here an unresponsive device surfaces as
    /// `QueryTimeout` instead.
    fn read_counts(&self, up: &Uploaded, part_count: usize) -> RenderResult<Vec<u64>> {
        let slice = up.staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        let deadline = Instant::now() + QUERY_TIMEOUT;
        loop {
            self.ctx.device.poll(wgpu::Maintain::Poll);
            match rx.try_recv() {
                Ok(Ok(())) => break,
                Ok(Err(e)) => return Err(RenderError::Readback(e.to_string())),
                Err(std::sync::mpsc::TryRecvError::Empty) => {
                    if Instant::now() > deadline {
                        return Err(RenderError::QueryTimeout);
                    }
                    std::thread::sleep(Duration::from_micros(100));
                }
                Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                    return Err(RenderError::Readback("map callback dropped".to_string()));
                }
            }
        }

        let counts = {
            let data = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, u64>(&data)[..part_count].to_vec()
        };
        up.staging_buffer.unmap();
        Ok(counts)
    }
}

impl sunview_sim::AreaSource for Estimator {
    fn part_count(&self) -> usize {
        self.uploaded.as_ref().map_or(0, |u| u.ranges.len())
    }

    fn measure(
        &mut self,
        azimuth_deg: f32,
        elevation_deg: f32,
        illuminated: f32,
    ) -> anyhow::Result<Vec<f32>> {
        Ok(Estimator::measure(
            self,
            azimuth_deg,
            elevation_deg,
            illuminated,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sunview_core::Scenario;

    /// 1x1 m square in the XY plane, camera extent exactly around it
    const SQUARE: &str = "\
o square
v -0.5 -0.5 0.0
v 0.5 -0.5 0.0
v 0.5 0.5 0.0
v -0.5 0.5 0.0
f 1 2 3
f 1 3 4
";

    /// Full-width square at z=0 with a half-width square 0.2 m above it
    /// covering its left half.
    const STACKED: &str = "\
o lower
v -0.5 -0.5 0.0
v 0.5 -0.5 0.0
v 0.5 0.5 0.0
v -0.5 0.5 0.0
f 1 2 3
f 1 3 4
o upper
v -0.5 -0.5 0.2
v 0.0 -0.5 0.2
v 0.0 0.5 0.2
v -0.5 0.5 0.2
f 5 6 7
f 5 7 8
";

    fn resolved() -> Resolved {
        let mut s = Scenario::default();
        s.screen_size_px = 100;
        s.screen_size_m = 1.0;
        s.resolve()
    }

    fn gpu() -> Option<GpuContext> {
        match pollster::block_on(GpuContext::new()) {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                eprintln!("skipping GPU test: {}", e);
                None
            }
        }
    }

    fn model_from(obj: &str, resolved: &Resolved) -> SatelliteModel {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.obj");
        std::fs::write(&path, obj).unwrap();
        SatelliteModel::load(&path, resolved)
    }

    #[test]
    fn test_face_on_square_measures_one_square_meter() {
        let Some(ctx) = gpu() else { return };
        let resolved = resolved();
        let mut model = model_from(SQUARE, &resolved);
        let mut est = Estimator::new(ctx, &resolved);
        est.upload(&mut model);

        let areas = est.measure(0.0, 90.0, 1.0).unwrap();
        assert_eq!(areas.len(), 1);
        // exact coverage of a 100x100 target: within one pixel of 1 m^2
        assert!(
            (areas[0] - 1.0).abs() <= resolved.pixel_area_m2,
            "area was {}",
            areas[0]
        );
    }

    #[test]
    fn test_eclipse_gate_zeroes_areas() {
        let Some(ctx) = gpu() else { return };
        let resolved = resolved();
        let mut model = model_from(SQUARE, &resolved);
        let mut est = Estimator::new(ctx, &resolved);
        est.upload(&mut model);

        let areas = est.measure(0.0, 90.0, 0.0).unwrap();
        assert_eq!(areas, vec![0.0]);
    }

    #[test]
    fn test_edge_on_square_measures_near_zero() {
        let Some(ctx) = gpu() else { return };
        let resolved = resolved();
        let mut model = model_from(SQUARE, &resolved);
        let mut est = Estimator::new(ctx, &resolved);
        est.upload(&mut model);

        // elevation 0 looks along the square's plane
        let areas = est.measure(0.0, 0.0, 1.0).unwrap();
        // at most a one-pixel-wide sliver
        assert!(areas[0] <= 100.0 * resolved.pixel_area_m2, "area was {}", areas[0]);
    }

    #[test]
    fn test_occluded_part_measures_less_than_isolated() {
        let Some(ctx) = gpu() else { return };
        let resolved = resolved();

        let mut isolated = model_from(SQUARE, &resolved);
        let mut est = Estimator::new(ctx, &resolved);
        est.upload(&mut isolated);
        let alone = est.measure(0.0, 90.0, 1.0).unwrap()[0];

        let mut stacked = model_from(STACKED, &resolved);
        est.upload(&mut stacked);
        let areas = est.measure(0.0, 90.0, 1.0).unwrap();
        assert_eq!(areas.len(), 2);

        let lower = areas[0];
        assert!(
            lower < alone - resolved.pixel_area_m2,
            "lower {} not below isolated {}",
            lower,
            alone
        );
        // roughly half the lower square is hidden
        assert!((lower - 0.5).abs() < 0.02, "lower was {}", lower);
    }

    #[test]
    fn test_zero_triangle_part_measures_zero() {
        let Some(ctx) = gpu() else { return };
        let resolved = resolved();
        let obj = format!("{}o bare\nv 0.0 0.0 1.0\n", SQUARE);
        let mut model = model_from(&obj, &resolved);
        let mut est = Estimator::new(ctx, &resolved);
        est.upload(&mut model);

        let areas = est.measure(0.0, 90.0, 1.0).unwrap();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[1], 0.0);
    }

    #[test]
    fn test_empty_model_measures_nothing() {
        let Some(ctx) = gpu() else { return };
        let resolved = resolved();
        let mut model = model_from("", &resolved);
        let mut est = Estimator::new(ctx, &resolved);
        est.upload(&mut model);
        assert!(est.measure(0.0, 90.0, 1.0).unwrap().is_empty());
    }

    #[test]
    fn test_upload_is_idempotent_until_marked_dirty() {
        let Some(ctx) = gpu() else { return };
        let resolved = resolved();
        let mut model = model_from(SQUARE, &resolved);
        let mut est = Estimator::new(ctx, &resolved);
        est.upload(&mut model);
        // second upload sees a clean model and keeps the buffers
        est.upload(&mut model);
        let areas = est.measure(0.0, 90.0, 1.0).unwrap();
        assert!((areas[0] - 1.0).abs() <= resolved.pixel_area_m2);
    }
}
