use anyhow::Result;
use winit::dpi::PhysicalSize;

use super::context::GpuContext;
use super::pipeline::{self, StageRef};
use crate::device::{FrameBuffer, FrameSink};

const BLIT_SHADER_WGSL: &str = r"struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_blit(@builtin(vertex_index) index: u32) -> VertexOutput {
    let x = f32(i32(index & 1u) * 4 - 1);
    let y = f32(i32(index >> 1u) * 4 - 1);
    var out: VertexOutput;
    out.position = vec4<f32>(x, y, 0.0, 1.0);
    out.uv = vec2<f32>((x + 1.0) * 0.5, (1.0 - y) * 0.5);
    return out;
}

@group(0) @binding(0) var frame_texture: texture_2d<f32>;
@group(0) @binding(1) var frame_sampler: sampler;

@fragment
fn fs_blit(input: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(frame_texture, frame_sampler, input.uv);
}
";

struct FrameTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// Presents CPU-rendered frames by stretching them over the window surface.
pub struct SurfacePresenter {
    context: GpuContext,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    pipeline: wgpu::RenderPipeline,
    target: Option<FrameTexture>,
}

impl SurfacePresenter {
    pub(crate) fn new(context: GpuContext) -> Self {
        let device = &context.device;
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame blit layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let module = pipeline::wgsl_module(device, "frame blit", BLIT_SHADER_WGSL);
        let pipeline = pipeline::fullscreen_pipeline(
            device,
            "frame blit",
            &[&layout],
            StageRef {
                module: &module,
                entry_point: "vs_blit",
            },
            StageRef {
                module: &module,
                entry_point: "fs_blit",
            },
            context.surface_format,
        );
        Self {
            context,
            layout,
            sampler,
            pipeline,
            target: None,
        }
    }

    /// Texture matching the frame size, reallocated when the size changes.
    fn frame_texture(&mut self, width: u32, height: u32) -> (wgpu::Texture, wgpu::BindGroup) {
        if let Some(target) = self
            .target
            .as_ref()
            .filter(|target| (target.width, target.height) == (width, height))
        {
            return (target.texture.clone(), target.bind_group.clone());
        }

        let device = &self.context.device;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("cpu frame"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cpu frame bind group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        tracing::debug!(width, height, "allocated CPU frame texture");
        let handles = (texture.clone(), bind_group.clone());
        self.target = Some(FrameTexture {
            texture,
            bind_group,
            width,
            height,
        });
        handles
    }
}

impl FrameSink for SurfacePresenter {
    fn present(&mut self, frame: &FrameBuffer) -> Result<()> {
        if frame.width == 0 || frame.height == 0 {
            return Ok(());
        }
        let Some(surface_frame) = self.context.acquire()? else {
            return Ok(());
        };
        let (texture_handle, bind_group) = self.frame_texture(frame.width, frame.height);

        self.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture_handle,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(frame.width * 4),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );

        let view = surface_frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("blit encoder"),
                });
        pipeline::encode_fullscreen_pass(&mut encoder, &view, &self.pipeline, &bind_group);
        self.context.queue.submit(std::iter::once(encoder.finish()));
        surface_frame.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.context.resize(PhysicalSize::new(width, height));
    }
}
