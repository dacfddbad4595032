//! PNG snapshot of the shaded model
//!
//! Headless stand-in for the original tool's live window: one beauty
//! pass with the parts in their display colors, read back and saved.

use std::path::Path;

use wgpu::util::DeviceExt;

use sunview_core::Resolved;
use sunview_data::SatelliteModel;

use crate::camera::{CameraUniform, SunCamera};
use crate::context::GpuContext;
use crate::error::RenderResult;
use crate::gpu_types::GpuVertex;
use crate::pipeline::{create_targets, ModelPipelines};

/// Render the model from the given sun direction and save it as PNG.
pub fn save_snapshot(
    ctx: &GpuContext,
    model: &SatelliteModel,
    resolved: &Resolved,
    azimuth_deg: f32,
    elevation_deg: f32,
    out: &Path,
) -> RenderResult<()> {
    let size = resolved.scenario.screen_size_px;
    let pipelines = ModelPipelines::new(&ctx.device);
    let (depth_view, color_texture, color_view) = create_targets(&ctx.device, size);

    let mut camera = SunCamera::new(resolved);
    camera.orient(azimuth_deg, elevation_deg);
    let uniform = CameraUniform::from_camera(&camera);
    let camera_buffer = ctx
        .device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Snapshot Camera"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        });
    let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Snapshot Camera Bind Group"),
        layout: &pipelines.camera_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: camera_buffer.as_entire_binding(),
        }],
    });

    let (flat, ranges) = model.flatten();
    let vertices: Vec<GpuVertex> = flat.iter().map(GpuVertex::from).collect();
    let vertex_buffer = (!vertices.is_empty()).then(|| {
        ctx.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Snapshot Vertices"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
    });

    // 256-byte row alignment for the texture-to-buffer copy
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let bytes_per_row = (size * 4 + align - 1) / align * align;
    let readback = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Snapshot Readback"),
        size: (bytes_per_row * size) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Snapshot Encoder"),
        });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Beauty Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        if let Some(buffer) = &vertex_buffer {
            pass.set_pipeline(&pipelines.beauty);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, buffer.slice(..));
            for range in &ranges {
                pass.draw(range.clone(), 0..1);
            }
        }
    }
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture: &color_texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &readback,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(size),
            },
        },
        wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let slice = readback.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    ctx.device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|e| crate::error::RenderError::Readback(e.to_string()))?
        .map_err(|e| crate::error::RenderError::Readback(e.to_string()))?;

    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    {
        let data = slice.get_mapped_range();
        for row in 0..size {
            let start = (row * bytes_per_row) as usize;
            pixels.extend_from_slice(&data[start..start + (size * 4) as usize]);
        }
    }
    readback.unmap();

    let image = image::RgbaImage::from_raw(size, size, pixels)
        .ok_or_else(|| crate::error::RenderError::Readback("image size mismatch".to_string()))?;
    image.save(out)?;
    tracing::info!("snapshot saved to {}", out.display());
    Ok(())
}
