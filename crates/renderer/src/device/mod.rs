//! Execution backends for an activated program.

pub mod cpu;

use anyhow::Result;

use crate::program::{InputBindings, InputBlock, LinkedProgram};

/// Something that can turn a linked program into an executable form and run
/// it over the full surface once per frame.
pub trait Device {
    type Executable;

    fn name(&self) -> &'static str;

    fn build(&mut self, program: &LinkedProgram, bindings: &InputBindings)
        -> Result<Self::Executable>;

    fn dispatch(&mut self, executable: &mut Self::Executable, block: &InputBlock) -> Result<()>;

    /// Surface size changed. Zero sizes may be ignored.
    fn resize(&mut self, _width: u32, _height: u32) {}
}

pub use cpu::{CpuDevice, CpuKernel, FrameBuffer, FrameSink};
