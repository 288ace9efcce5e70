use anyhow::{bail, Result};
use winit::dpi::PhysicalSize;

use super::context::GpuContext;
use super::pipeline::{self, StageRef};
use crate::device::Device;
use crate::program::{InputBindings, InputBlock, LinkedProgram};

/// A linked program built into a render pipeline plus its input buffer.
pub struct GpuProgram {
    pipeline: wgpu::RenderPipeline,
    input_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Runs programs as fragment shaders on the window surface.
pub struct GpuDevice {
    context: GpuContext,
    input_layout: wgpu::BindGroupLayout,
}

impl GpuDevice {
    pub(crate) fn new(context: GpuContext) -> Self {
        let input_layout = pipeline::input_block_layout(&context.device);
        Self {
            context,
            input_layout,
        }
    }
}

impl Device for GpuDevice {
    type Executable = GpuProgram;

    fn name(&self) -> &'static str {
        "gpu"
    }

    fn build(&mut self, program: &LinkedProgram, _bindings: &InputBindings) -> Result<GpuProgram> {
        if (program.block.group, program.block.binding) != (0, 0) {
            bail!(
                "input block must be bound at @group(0) @binding(0), found @group({}) @binding({})",
                program.block.group,
                program.block.binding
            );
        }
        let device = &self.context.device;
        let vertex_unit = program.vertex_unit();
        let fragment_unit = program.fragment_unit();
        let vertex_module = pipeline::wgsl_module(device, &vertex_unit.label, &vertex_unit.code);
        let fragment_module = if program.vertex.unit == program.fragment.unit {
            vertex_module.clone()
        } else {
            pipeline::wgsl_module(device, &fragment_unit.label, &fragment_unit.code)
        };

        let render_pipeline = pipeline::fullscreen_pipeline(
            device,
            &program.label,
            &[&self.input_layout],
            StageRef {
                module: &vertex_module,
                entry_point: &program.vertex.name,
            },
            StageRef {
                module: &fragment_module,
                entry_point: &program.fragment.name,
            },
            self.context.surface_format,
        );

        let input_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("input block"),
            size: program.block_size().max(16) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("input block bind group"),
            layout: &self.input_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: input_buffer.as_entire_binding(),
            }],
        });
        tracing::debug!(
            program = %program.label,
            format = ?self.context.surface_format,
            "built GPU pipeline"
        );

        Ok(GpuProgram {
            pipeline: render_pipeline,
            input_buffer,
            bind_group,
        })
    }

    fn dispatch(&mut self, program: &mut GpuProgram, block: &InputBlock) -> Result<()> {
        let Some(frame) = self.context.acquire()? else {
            return Ok(());
        };
        self.context
            .queue
            .write_buffer(&program.input_buffer, 0, block.as_bytes());

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });
        pipeline::encode_fullscreen_pass(&mut encoder, &view, &program.pipeline, &program.bind_group);
        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.context.resize(PhysicalSize::new(width, height));
    }
}
