use std::fmt;

use field::Parameter;

use super::link::LinkedProgram;
use super::ProgramError;

/// Largest input block a linked program may declare, in bytes.
pub const INPUT_BLOCK_CAPACITY: usize = 256;

/// Inputs the session writes every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputName {
    Time,
    Resolution,
    Speed,
    Warp,
    Thickness,
    ColorShift,
}

impl InputName {
    /// Member name looked up in the program's uniform block.
    pub fn uniform_name(self) -> &'static str {
        match self {
            InputName::Time => "time",
            InputName::Resolution => "resolution",
            InputName::Speed => "speed",
            InputName::Warp => "warp",
            InputName::Thickness => "thickness",
            InputName::ColorShift => "colorShift",
        }
    }

    pub fn expected_kind(self) -> SlotKind {
        match self {
            InputName::Resolution => SlotKind::Vec2F32,
            _ => SlotKind::F32,
        }
    }
}

impl fmt::Display for InputName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uniform_name())
    }
}

impl From<Parameter> for InputName {
    fn from(parameter: Parameter) -> Self {
        match parameter {
            Parameter::Speed => InputName::Speed,
            Parameter::Warp => InputName::Warp,
            Parameter::Thickness => InputName::Thickness,
            Parameter::ColorShift => InputName::ColorShift,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKind {
    F32,
    Vec2F32,
    /// Any member type the session cannot write, described for diagnostics.
    Other(String),
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::F32 => f.write_str("f32"),
            SlotKind::Vec2F32 => f.write_str("vec2<f32>"),
            SlotKind::Other(desc) => f.write_str(desc),
        }
    }
}

/// Byte offset and type of one member of the linked input block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub offset: u32,
    pub kind: SlotKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputValue {
    Float(f32),
    Vec2([f32; 2]),
}

/// CPU-side image of the uniform block, rewritten before every dispatch.
#[derive(Clone)]
pub struct InputBlock {
    bytes: [u8; INPUT_BLOCK_CAPACITY],
    len: usize,
}

impl InputBlock {
    pub fn new(len: usize) -> Self {
        Self {
            bytes: [0; INPUT_BLOCK_CAPACITY],
            len: len.min(INPUT_BLOCK_CAPACITY),
        }
    }

    /// Stores `value` at the slot's offset. Writes past the block are dropped.
    pub fn write(&mut self, slot: &Slot, value: InputValue) {
        let offset = slot.offset as usize;
        match value {
            InputValue::Float(v) => self.put(offset, bytemuck::bytes_of(&v)),
            InputValue::Vec2(v) => self.put(offset, bytemuck::bytes_of(&v)),
        }
    }

    fn put(&mut self, offset: usize, data: &[u8]) {
        let Some(end) = offset.checked_add(data.len()) else {
            return;
        };
        if end <= self.len {
            self.bytes[offset..end].copy_from_slice(data);
        }
    }

    pub fn read_f32(&self, offset: u32) -> Option<f32> {
        let start = offset as usize;
        let end = start.checked_add(4)?;
        (end <= self.len).then(|| bytemuck::pod_read_unaligned(&self.bytes[start..end]))
    }

    pub fn read_vec2(&self, offset: u32) -> Option<[f32; 2]> {
        let start = offset as usize;
        let end = start.checked_add(8)?;
        (end <= self.len).then(|| bytemuck::pod_read_unaligned(&self.bytes[start..end]))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl fmt::Debug for InputBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputBlock").field("len", &self.len).finish()
    }
}

/// Resolved slot for every input the session writes.
///
/// Time and resolution are always present. A parameter slot is `None` only
/// when its control was disabled and the program does not declare it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBindings {
    pub time: Slot,
    pub resolution: Slot,
    params: [Option<Slot>; 4],
}

impl InputBindings {
    pub fn resolve(program: &LinkedProgram, disabled: &[Parameter]) -> Result<Self, ProgramError> {
        let time = bind_input(program, InputName::Time)?;
        let resolution = bind_input(program, InputName::Resolution)?;
        let mut params: [Option<Slot>; 4] = Default::default();
        for (index, parameter) in Parameter::ALL.iter().enumerate() {
            match bind_input(program, (*parameter).into()) {
                Ok(slot) => params[index] = Some(slot),
                Err(ProgramError::MissingInput(_)) if disabled.contains(parameter) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(Self {
            time,
            resolution,
            params,
        })
    }

    pub fn param(&self, parameter: Parameter) -> Option<&Slot> {
        self.params[param_index(parameter)].as_ref()
    }

    /// Time, resolution, then each bound parameter in [`Parameter::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (InputName, &Slot)> {
        [
            (InputName::Time, Some(&self.time)),
            (InputName::Resolution, Some(&self.resolution)),
        ]
        .into_iter()
        .chain(
            Parameter::ALL
                .iter()
                .map(|p| (InputName::from(*p), self.param(*p))),
        )
        .filter_map(|(name, slot)| slot.map(|slot| (name, slot)))
    }
}

fn param_index(parameter: Parameter) -> usize {
    match parameter {
        Parameter::Speed => 0,
        Parameter::Warp => 1,
        Parameter::Thickness => 2,
        Parameter::ColorShift => 3,
    }
}

/// Looks up one input in the linked block and checks its type.
pub fn bind_input(program: &LinkedProgram, name: InputName) -> Result<Slot, ProgramError> {
    let slot = program
        .slots
        .get(name.uniform_name())
        .ok_or(ProgramError::MissingInput(name))?;
    let expected = name.expected_kind();
    if slot.kind != expected {
        return Err(ProgramError::InputType {
            name,
            expected,
            found: slot.kind.clone(),
        });
    }
    Ok(slot.clone())
}
