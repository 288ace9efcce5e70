//! Native evaluation of the tunnel program on a `rayon` pool.

use anyhow::{bail, Context, Result};
use field::{FrameContext, Parameter, ParameterSet, Resolution, Style, Vec2};
use rayon::prelude::*;
use tracing::{debug, info};

use super::Device;
use crate::program::source::{STYLE_CONSTANT, TUNNEL_FRAGMENT_ENTRY};
use crate::program::{ConstValue, InputBindings, InputBlock, LinkedProgram, Slot, SourceOrigin};

/// RGBA8 pixels, top row first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl FrameBuffer {
    fn reshape(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.resize(width as usize * height as usize * 4, 0);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.pixels.get(start..start + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Receives every finished frame before the buffer is reused.
pub trait FrameSink {
    fn present(&mut self, frame: &FrameBuffer) -> Result<()>;

    fn resize(&mut self, _width: u32, _height: u32) {}
}

/// The executable form of a linked tunnel program on the CPU.
#[derive(Debug, Clone)]
pub struct CpuKernel {
    style: Style,
    time: Slot,
    resolution: Slot,
    params: [(Parameter, Option<Slot>); 4],
}

impl CpuKernel {
    pub fn style(&self) -> Style {
        self.style
    }

    fn frame(&self, block: &InputBlock) -> (FrameContext, ParameterSet) {
        let time = block.read_f32(self.time.offset).unwrap_or(0.0);
        let [width, height] = block.read_vec2(self.resolution.offset).unwrap_or([0.0, 0.0]);
        let mut params = ParameterSet::default();
        for (parameter, slot) in &self.params {
            let Some(value) = slot.as_ref().and_then(|slot| block.read_f32(slot.offset)) else {
                continue;
            };
            match parameter {
                Parameter::Speed => params.speed = value,
                Parameter::Warp => params.warp = value,
                Parameter::Thickness => params.thickness = value,
                Parameter::ColorShift => params.color_shift = value,
            }
        }
        (
            FrameContext::new(time, Resolution::new(width, height)),
            params,
        )
    }
}

pub struct CpuDevice {
    pool: rayon::ThreadPool,
    render_scale: f32,
    buffer: FrameBuffer,
    sink: Option<Box<dyn FrameSink>>,
    frames: u64,
}

impl CpuDevice {
    /// `threads` of `None` lets `rayon` pick one worker per core.
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("tunnel-cpu-{i}"));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build().context("failed to start CPU render pool")?;
        info!(threads = pool.current_num_threads(), "CPU device ready");
        Ok(Self {
            pool,
            render_scale: 1.0,
            buffer: FrameBuffer::default(),
            sink: None,
            frames: 0,
        })
    }

    /// Renders at a fraction of the surface resolution, clamped to `[0.1, 1]`.
    pub fn with_render_scale(mut self, scale: f32) -> Self {
        self.render_scale = if scale.is_finite() {
            scale.clamp(0.1, 1.0)
        } else {
            1.0
        };
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.buffer
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Size of the most recently rendered frame.
    pub fn last_frame_size(&self) -> Option<(u32, u32)> {
        (self.frames > 0).then_some((self.buffer.width, self.buffer.height))
    }

    fn internal_size(&self, resolution: Resolution) -> (u32, u32) {
        let res = resolution.effective();
        let scale = |v: f32| ((v * self.render_scale).round() as u32).max(1);
        (scale(res.width), scale(res.height))
    }
}

impl Device for CpuDevice {
    type Executable = CpuKernel;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn build(&mut self, program: &LinkedProgram, bindings: &InputBindings) -> Result<CpuKernel> {
        let fragment = program.fragment_unit();
        if fragment.origin != SourceOrigin::Builtin {
            bail!(
                "the cpu device cannot run custom fragment '{}' (entry point '{}'); use the gpu device for custom shaders",
                fragment.label,
                program.fragment.name
            );
        }
        if program.fragment.name != TUNNEL_FRAGMENT_ENTRY {
            bail!(
                "the cpu device has no kernel for fragment entry point '{}'",
                program.fragment.name
            );
        }
        let bits = match program.constants.get(STYLE_CONSTANT) {
            Some(ConstValue::U32(bits)) => *bits,
            Some(other) => bail!("{STYLE_CONSTANT} must be a u32 constant, found {other:?}"),
            None => bail!("program does not declare {STYLE_CONSTANT}"),
        };
        let style = Style::from_bits(bits).with_context(|| format!("invalid {STYLE_CONSTANT} value {bits}"))?;
        debug!(%style, "built CPU tunnel kernel");
        Ok(CpuKernel {
            style,
            time: bindings.time.clone(),
            resolution: bindings.resolution.clone(),
            params: Parameter::ALL.map(|p| (p, bindings.param(p).cloned())),
        })
    }

    fn dispatch(&mut self, kernel: &mut CpuKernel, block: &InputBlock) -> Result<()> {
        let (frame, params) = kernel.frame(block);
        let (width, height) = self.internal_size(frame.resolution);
        self.buffer.reshape(width, height);

        let internal = FrameContext::new(frame.time, (width, height));
        let style = kernel.style;
        let row_bytes = width as usize * 4;
        let pixels = &mut self.buffer.pixels;
        self.pool.install(|| {
            pixels
                .par_chunks_mut(row_bytes)
                .enumerate()
                .for_each(|(row, line)| {
                    // Field coordinates have their origin at the bottom-left.
                    let y = height as f32 - row as f32 - 0.5;
                    for (x, px) in line.chunks_exact_mut(4).enumerate() {
                        let pixel = Vec2::new(x as f32 + 0.5, y);
                        let rgba = field::evaluate(pixel, &internal, &params, style).to_rgba8();
                        px.copy_from_slice(&rgba);
                    }
                });
        });
        self.frames += 1;

        if let Some(sink) = self.sink.as_mut() {
            sink.present(&self.buffer)
                .with_context(|| format!("failed to present CPU frame {}", self.frames))?;
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(sink) = self.sink.as_mut() {
            sink.resize(width, height);
        }
    }
}
