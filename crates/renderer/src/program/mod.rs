//! Compile, link, bind and activate the per-pixel program.
//!
//! [`ProgramManager`] walks a program through
//! `Uncompiled → Compiled → Linked → Active`. Any failure before activation
//! leaves it in the terminal `Failed` state; operations issued in the wrong
//! state are rejected with [`ProgramError::InvalidState`].

mod compile;
mod link;
pub mod slots;
pub mod source;

use std::fmt;

use field::{FrameContext, Parameter, ParameterSet};
use tracing::{debug, info};

use crate::device::Device;

pub use compile::{
    compile, CompiledUnit, ConstValue, EntryPointInfo, Reflection, Stage, UniformBlock,
    UniformMember,
};
pub use link::{link, EntryRef, LinkedProgram};
pub use slots::{
    bind_input, InputBindings, InputBlock, InputName, InputValue, Slot, SlotKind,
    INPUT_BLOCK_CAPACITY,
};
pub use source::{ProgramSource, SourceOrigin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramState {
    Uncompiled,
    Compiled,
    Linked,
    Active,
    Failed,
}

impl fmt::Display for ProgramState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProgramState::Uncompiled => "uncompiled",
            ProgramState::Compiled => "compiled",
            ProgramState::Linked => "linked",
            ProgramState::Active => "active",
            ProgramState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("failed to compile program unit '{label}':\n{diagnostic}")]
    Compile { label: String, diagnostic: String },
    #[error("failed to link program: {0}")]
    Link(String),
    #[error("program does not declare required input '{0}'")]
    MissingInput(InputName),
    #[error("input '{name}' has type {found}, expected {expected}")]
    InputType {
        name: InputName,
        expected: SlotKind,
        found: SlotKind,
    },
    #[error("cannot {operation} a program that is {state}")]
    InvalidState {
        operation: &'static str,
        state: ProgramState,
    },
    #[error("device could not build the program: {0}")]
    Device(String),
}

/// Owns the program pipeline and the executable built by `D`.
pub struct ProgramManager<D: Device> {
    device: D,
    state: ProgramState,
    units: Vec<CompiledUnit>,
    linked: Option<LinkedProgram>,
    bindings: Option<InputBindings>,
    block: InputBlock,
    executable: Option<D::Executable>,
}

impl<D: Device> ProgramManager<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            state: ProgramState::Uncompiled,
            units: Vec::new(),
            linked: None,
            bindings: None,
            block: InputBlock::new(0),
            executable: None,
        }
    }

    /// Runs the whole pipeline over `sources` and activates the result.
    pub fn prepare(
        device: D,
        sources: &[ProgramSource],
        disabled: &[Parameter],
    ) -> Result<Self, ProgramError> {
        let mut manager = Self::new(device);
        for source in sources {
            manager.compile(source)?;
        }
        manager.link()?;
        manager.bind_inputs(disabled)?;
        manager.activate()?;
        Ok(manager)
    }

    pub fn state(&self) -> ProgramState {
        self.state
    }

    pub fn program(&self) -> Option<&LinkedProgram> {
        self.linked.as_ref()
    }

    pub fn bindings(&self) -> Option<&InputBindings> {
        self.bindings.as_ref()
    }

    pub fn block(&self) -> &InputBlock {
        &self.block
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    fn require(&self, operation: &'static str, states: &[ProgramState]) -> Result<(), ProgramError> {
        if states.contains(&self.state) {
            Ok(())
        } else {
            Err(ProgramError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn fail<T>(&mut self, err: ProgramError) -> Result<T, ProgramError> {
        self.state = ProgramState::Failed;
        Err(err)
    }

    pub fn compile(&mut self, source: &ProgramSource) -> Result<&CompiledUnit, ProgramError> {
        self.require("compile", &[ProgramState::Uncompiled, ProgramState::Compiled])?;
        match compile::compile(source) {
            Ok(unit) => {
                self.units.push(unit);
                self.state = ProgramState::Compiled;
                Ok(&self.units[self.units.len() - 1])
            }
            Err(err) => self.fail(err),
        }
    }

    pub fn link(&mut self) -> Result<&LinkedProgram, ProgramError> {
        self.require("link", &[ProgramState::Compiled])?;
        match link::link(std::mem::take(&mut self.units)) {
            Ok(program) => {
                self.state = ProgramState::Linked;
                Ok(self.linked.insert(program))
            }
            Err(err) => self.fail(err),
        }
    }

    /// Looks up a single input on the linked program.
    pub fn bind_input(&self, name: InputName) -> Result<Slot, ProgramError> {
        match &self.linked {
            Some(program) => slots::bind_input(program, name),
            None => Err(ProgramError::InvalidState {
                operation: "bind inputs of",
                state: self.state,
            }),
        }
    }

    /// Resolves every input slot. Parameters in `disabled` may be absent.
    pub fn bind_inputs(&mut self, disabled: &[Parameter]) -> Result<&InputBindings, ProgramError> {
        self.require("bind inputs of", &[ProgramState::Linked])?;
        let Some(program) = self.linked.as_ref() else {
            return self.fail(ProgramError::Link("linked program is missing".into()));
        };
        match InputBindings::resolve(program, disabled) {
            Ok(bindings) => {
                for (name, slot) in bindings.iter() {
                    debug!(input = %name, offset = slot.offset, kind = %slot.kind, "bound input");
                }
                Ok(self.bindings.insert(bindings))
            }
            Err(err) => self.fail(err),
        }
    }

    /// Builds the device executable and makes this the dispatched program.
    pub fn activate(&mut self) -> Result<(), ProgramError> {
        self.require("activate", &[ProgramState::Linked])?;
        let (Some(program), Some(bindings)) = (self.linked.as_ref(), self.bindings.as_ref()) else {
            return Err(ProgramError::InvalidState {
                operation: "activate",
                state: self.state,
            });
        };
        match self.device.build(program, bindings) {
            Ok(executable) => {
                self.block = InputBlock::new(program.block_size());
                self.executable = Some(executable);
                self.state = ProgramState::Active;
                info!(
                    program = %program.label,
                    device = self.device.name(),
                    "program active"
                );
                Ok(())
            }
            Err(err) => self.fail(ProgramError::Device(format!("{err:#}"))),
        }
    }

    pub fn set_input(&mut self, slot: &Slot, value: InputValue) -> Result<(), ProgramError> {
        self.require("set inputs of", &[ProgramState::Active])?;
        self.block.write(slot, value);
        Ok(())
    }

    /// Pushes one frame's time, resolution and parameters into the block.
    pub fn write_frame(
        &mut self,
        frame: &FrameContext,
        params: &ParameterSet,
    ) -> Result<(), ProgramError> {
        self.require("set inputs of", &[ProgramState::Active])?;
        let Some(bindings) = self.bindings.as_ref() else {
            return Err(ProgramError::InvalidState {
                operation: "set inputs of",
                state: self.state,
            });
        };
        self.block
            .write(&bindings.time, InputValue::Float(frame.time));
        self.block.write(
            &bindings.resolution,
            InputValue::Vec2([frame.resolution.width, frame.resolution.height]),
        );
        for parameter in Parameter::ALL {
            if let Some(slot) = bindings.param(parameter) {
                self.block
                    .write(slot, InputValue::Float(params.get(parameter)));
            }
        }
        Ok(())
    }

    /// Runs the active program once over the whole surface.
    pub fn dispatch(&mut self) -> anyhow::Result<()> {
        self.require("dispatch", &[ProgramState::Active])?;
        let Some(executable) = self.executable.as_mut() else {
            anyhow::bail!("active program has no executable");
        };
        self.device.dispatch(executable, &self.block)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.device.resize(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use field::Style;

    /// Records what it was asked to do; never touches a surface.
    #[derive(Default)]
    struct RecordingDevice {
        fail_build: bool,
        dispatched: Vec<Vec<u8>>,
        resized: Vec<(u32, u32)>,
    }

    impl Device for RecordingDevice {
        type Executable = ();

        fn name(&self) -> &'static str {
            "recording"
        }

        fn build(&mut self, _: &LinkedProgram, _: &InputBindings) -> anyhow::Result<()> {
            if self.fail_build {
                anyhow::bail!("no kernel for this program");
            }
            Ok(())
        }

        fn dispatch(&mut self, _: &mut (), block: &InputBlock) -> anyhow::Result<()> {
            self.dispatched.push(block.as_bytes().to_vec());
            Ok(())
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.resized.push((width, height));
        }
    }

    fn prepare_err(device: RecordingDevice, sources: &[ProgramSource], disabled: &[Parameter]) -> ProgramError {
        match ProgramManager::prepare(device, sources, disabled) {
            Ok(_) => panic!("program unexpectedly activated"),
            Err(err) => err,
        }
    }

    fn builtin_sources() -> Vec<ProgramSource> {
        vec![
            ProgramSource::builtin_vertex(),
            ProgramSource::builtin_fragment(Style::classic()),
        ]
    }

    const PARTIAL_FRAGMENT: &str = "struct TunnelInputs { time: f32, speed: f32, resolution: vec2<f32>, }\n\
        @group(0) @binding(0) var<uniform> inputs: TunnelInputs;\n\
        @fragment\nfn fs_partial() -> @location(0) vec4<f32> {\n\
        return vec4<f32>(inputs.time, inputs.speed, inputs.resolution.x, 1.0);\n}\n";

    #[test]
    fn builtin_program_binds_all_six_inputs() {
        let manager =
            ProgramManager::prepare(RecordingDevice::default(), &builtin_sources(), &[]).unwrap();
        assert_eq!(manager.state(), ProgramState::Active);
        let bindings = manager.bindings().unwrap();
        assert_eq!(bindings.iter().count(), 6);
        assert_eq!(manager.block().len(), 32);
        assert_eq!(
            manager.bind_input(InputName::ColorShift).unwrap().offset,
            24
        );
    }

    #[test]
    fn write_frame_fills_bound_slots() {
        let mut manager =
            ProgramManager::prepare(RecordingDevice::default(), &builtin_sources(), &[]).unwrap();
        let params = ParameterSet {
            speed: 2.0,
            warp: 0.5,
            thickness: 0.3,
            color_shift: -1.25,
        };
        manager
            .write_frame(&FrameContext::new(4.5, (800, 600)), &params)
            .unwrap();
        manager.dispatch().unwrap();

        let block = manager.block();
        assert_eq!(block.read_f32(0), Some(4.5));
        assert_eq!(block.read_f32(4), Some(2.0));
        assert_eq!(block.read_vec2(8), Some([800.0, 600.0]));
        assert_eq!(block.read_f32(24), Some(-1.25));
        assert_eq!(manager.device().dispatched.len(), 1);
    }

    #[test]
    fn broken_source_fails_the_program() {
        let mut manager = ProgramManager::new(RecordingDevice::default());
        manager.compile(&ProgramSource::builtin_vertex()).unwrap();
        let err = manager
            .compile(&ProgramSource::custom_fragment("broken.wgsl", "fn (", Style::classic()))
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to compile program unit 'broken.wgsl'"));
        assert_eq!(manager.state(), ProgramState::Failed);
        assert!(matches!(
            manager.link(),
            Err(ProgramError::InvalidState { operation: "link", state: ProgramState::Failed })
        ));
    }

    #[test]
    fn missing_required_input_is_fatal() {
        let sources = [
            ProgramSource::builtin_vertex(),
            ProgramSource::new("partial", PARTIAL_FRAGMENT),
        ];
        let err = prepare_err(RecordingDevice::default(), &sources, &[]);
        assert!(matches!(err, ProgramError::MissingInput(InputName::Warp)), "{err}");
    }

    #[test]
    fn disabled_controls_may_be_absent() {
        let sources = [
            ProgramSource::builtin_vertex(),
            ProgramSource::new("partial", PARTIAL_FRAGMENT),
        ];
        let disabled = [Parameter::Warp, Parameter::Thickness, Parameter::ColorShift];
        let mut manager =
            ProgramManager::prepare(RecordingDevice::default(), &sources, &disabled).unwrap();
        let bindings = manager.bindings().unwrap();
        assert!(bindings.param(Parameter::Warp).is_none());
        assert!(bindings.param(Parameter::Speed).is_some());
        manager
            .write_frame(&FrameContext::new(1.0, (64, 64)), &ParameterSet::default())
            .unwrap();
        assert_eq!(manager.block().read_f32(4), Some(6.0));
    }

    #[test]
    fn required_inputs_cannot_be_disabled_away() {
        let sources = [
            ProgramSource::builtin_vertex(),
            ProgramSource::new(
                "timeless",
                "struct B { speed: f32, }\n@group(0) @binding(0) var<uniform> inputs: B;\n\
                 @fragment\nfn fs() -> @location(0) vec4<f32> { return vec4<f32>(inputs.speed); }\n",
            ),
        ];
        let err = prepare_err(RecordingDevice::default(), &sources, &Parameter::ALL);
        assert!(matches!(err, ProgramError::MissingInput(InputName::Time)));
    }

    #[test]
    fn mistyped_input_is_rejected() {
        let sources = [
            ProgramSource::builtin_vertex(),
            ProgramSource::new(
                "flat resolution",
                "struct B { time: f32, resolution: f32, }\n@group(0) @binding(0) var<uniform> inputs: B;\n\
                 @fragment\nfn fs() -> @location(0) vec4<f32> { return vec4<f32>(inputs.time + inputs.resolution); }\n",
            ),
        ];
        let err = prepare_err(RecordingDevice::default(), &sources, &Parameter::ALL);
        assert_eq!(
            err.to_string(),
            "input 'resolution' has type f32, expected vec2<f32>"
        );
    }

    #[test]
    fn out_of_order_operations_are_rejected() {
        let mut manager = ProgramManager::new(RecordingDevice::default());
        assert!(matches!(
            manager.link(),
            Err(ProgramError::InvalidState { state: ProgramState::Uncompiled, .. })
        ));
        assert!(manager.activate().is_err());
        assert!(manager.dispatch().is_err());
        assert!(manager.bind_input(InputName::Time).is_err());
        assert_eq!(manager.state(), ProgramState::Uncompiled);

        for source in builtin_sources() {
            manager.compile(&source).unwrap();
        }
        manager.link().unwrap();
        assert!(matches!(
            manager.activate(),
            Err(ProgramError::InvalidState { operation: "activate", .. })
        ));
        assert!(manager.compile(&ProgramSource::builtin_vertex()).is_err());
        assert_eq!(manager.state(), ProgramState::Linked);
    }

    #[test]
    fn device_build_failure_fails_the_program() {
        let device = RecordingDevice {
            fail_build: true,
            ..Default::default()
        };
        let err = prepare_err(device, &builtin_sources(), &[]);
        assert_eq!(
            err.to_string(),
            "device could not build the program: no kernel for this program"
        );
    }

    #[test]
    fn resize_reaches_the_device() {
        let mut manager =
            ProgramManager::prepare(RecordingDevice::default(), &builtin_sources(), &[]).unwrap();
        manager.resize(800, 600);
        assert_eq!(manager.device().resized, vec![(800, 600)]);
    }
}
