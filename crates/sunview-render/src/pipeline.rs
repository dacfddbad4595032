//! The three flavors of the model pipeline
//!
//! One WGSL module drives three render pipelines that differ only in
//! depth-write and color-write state:
//! 1. depth prepass — depth writes on, color masked; establishes the
//!    nearest surface per pixel for the whole scene
//! 2. query pass — depth writes OFF, compare LessEqual, color masked;
//!    drawn per part inside an occlusion query so only frontmost
//!    fragments count
//! 3. beauty pass — depth writes on, color on; snapshots only

use crate::gpu_types::GpuVertex;

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const FLAT_SHADER: &str = include_str!("shaders/flat.wgsl");

pub struct ModelPipelines {
    pub depth_prepass: wgpu::RenderPipeline,
    pub query: wgpu::RenderPipeline,
    pub beauty: wgpu::RenderPipeline,
    pub camera_layout: wgpu::BindGroupLayout,
}

impl ModelPipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Flat Shader"),
            source: wgpu::ShaderSource::Wgsl(FLAT_SHADER.into()),
        });

        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Model Pipeline Layout"),
            bind_group_layouts: &[&camera_layout],
            push_constant_ranges: &[],
        });

        let make = |label: &str, depth_write: bool, color_mask: wgpu::ColorWrites| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[GpuVertex::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: COLOR_FORMAT,
                        blend: None,
                        write_mask: color_mask,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    // both sides count toward the silhouette
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: depth_write,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        Self {
            depth_prepass: make("Depth Prepass Pipeline", true, wgpu::ColorWrites::empty()),
            query: make("Query Pipeline", false, wgpu::ColorWrites::empty()),
            beauty: make("Beauty Pipeline", true, wgpu::ColorWrites::ALL),
            camera_layout,
        }
    }
}

/// Square render targets for the measurement and snapshot passes
pub fn create_targets(
    device: &wgpu::Device,
    size_px: u32,
) -> (wgpu::TextureView, wgpu::Texture, wgpu::TextureView) {
    let extent = wgpu::Extent3d {
        width: size_px,
        height: size_px,
        depth_or_array_layers: 1,
    };
    let color = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Render Target"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: COLOR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Target"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let color_view = color.create_view(&Default::default());
    let depth_view = depth.create_view(&Default::default());
    (depth_view, color, color_view)
}
