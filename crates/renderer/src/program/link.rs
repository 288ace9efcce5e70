use std::collections::BTreeMap;

use tracing::debug;

use super::compile::{CompiledUnit, ConstValue, Stage, UniformBlock};
use super::slots::{Slot, INPUT_BLOCK_CAPACITY};
use super::ProgramError;

/// Names an entry point inside one of the linked units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRef {
    /// Index into [`LinkedProgram::units`].
    pub unit: usize,
    pub name: String,
}

/// Compiled units combined into one executable program description.
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    pub label: String,
    pub units: Vec<CompiledUnit>,
    pub vertex: EntryRef,
    pub fragment: EntryRef,
    pub block: UniformBlock,
    /// Input slots keyed by uniform member name.
    pub slots: BTreeMap<String, Slot>,
    pub constants: BTreeMap<String, ConstValue>,
}

impl LinkedProgram {
    pub fn block_size(&self) -> usize {
        self.block.size as usize
    }

    pub fn vertex_unit(&self) -> &CompiledUnit {
        &self.units[self.vertex.unit]
    }

    pub fn fragment_unit(&self) -> &CompiledUnit {
        &self.units[self.fragment.unit]
    }
}

/// Links units into a program with exactly one vertex and one fragment stage.
///
/// Every unit that declares the uniform block must declare the same layout.
pub fn link(units: Vec<CompiledUnit>) -> Result<LinkedProgram, ProgramError> {
    if units.is_empty() {
        return Err(ProgramError::Link("no compiled units to link".into()));
    }

    let vertex = single_entry(&units, Stage::Vertex, "vertex")?;
    let fragment = single_entry(&units, Stage::Fragment, "fragment")?;

    let mut block: Option<(usize, &UniformBlock)> = None;
    for (index, unit) in units.iter().enumerate() {
        let Some(candidate) = unit.reflection.uniform_block.as_ref() else {
            continue;
        };
        match block {
            None => block = Some((index, candidate)),
            Some((first, existing)) if existing != candidate => {
                return Err(ProgramError::Link(format!(
                    "uniform block in '{}' does not match the one declared in '{}'",
                    unit.label, units[first].label
                )));
            }
            Some(_) => {}
        }
    }
    let Some((_, block)) = block else {
        return Err(ProgramError::Link(
            "program declares no uniform input block".into(),
        ));
    };
    let block = block.clone();
    if block.size as usize > INPUT_BLOCK_CAPACITY {
        return Err(ProgramError::Link(format!(
            "uniform block is {} bytes; at most {INPUT_BLOCK_CAPACITY} are supported",
            block.size
        )));
    }

    let mut constants = BTreeMap::new();
    for unit in &units {
        for (name, value) in &unit.reflection.constants {
            match constants.insert(name.clone(), *value) {
                Some(previous) if previous != *value => {
                    return Err(ProgramError::Link(format!(
                        "constant '{name}' has conflicting values {previous:?} and {value:?}"
                    )));
                }
                _ => {}
            }
        }
    }

    let slots = block
        .members
        .iter()
        .map(|member| {
            (
                member.name.clone(),
                Slot {
                    offset: member.offset,
                    kind: member.kind.clone(),
                },
            )
        })
        .collect();

    let label = units
        .iter()
        .map(|unit| unit.label.as_str())
        .collect::<Vec<_>>()
        .join(" + ");
    debug!(
        program = %label,
        block_size = block.size,
        vertex = %vertex.name,
        fragment = %fragment.name,
        "linked program"
    );

    Ok(LinkedProgram {
        label,
        units,
        vertex,
        fragment,
        block,
        slots,
        constants,
    })
}

fn single_entry(
    units: &[CompiledUnit],
    stage: Stage,
    stage_name: &str,
) -> Result<EntryRef, ProgramError> {
    let mut found = units.iter().enumerate().flat_map(|(index, unit)| {
        unit.reflection
            .entry_points
            .iter()
            .filter(move |ep| ep.stage == stage)
            .map(move |ep| EntryRef {
                unit: index,
                name: ep.name.clone(),
            })
    });
    let first = found
        .next()
        .ok_or_else(|| ProgramError::Link(format!("no {stage_name} entry point")))?;
    if let Some(second) = found.next() {
        return Err(ProgramError::Link(format!(
            "multiple {stage_name} entry points: '{}' and '{}'",
            first.name, second.name
        )));
    }
    Ok(first)
}
