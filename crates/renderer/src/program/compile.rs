use std::collections::BTreeMap;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Expression, Literal, Scalar, ShaderStage, TypeInner, VectorSize};
use tracing::debug;

use super::slots::SlotKind;
use super::source::{ProgramSource, SourceOrigin};
use super::ProgramError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
    Other,
}

impl From<ShaderStage> for Stage {
    fn from(stage: ShaderStage) -> Self {
        if stage == ShaderStage::Vertex {
            Stage::Vertex
        } else if stage == ShaderStage::Fragment {
            Stage::Fragment
        } else {
            Stage::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPointInfo {
    pub name: String,
    pub stage: Stage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    pub kind: SlotKind,
}

/// The single `var<uniform>` block a unit may declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub group: u32,
    pub binding: u32,
    /// Struct span in bytes.
    pub size: u32,
    pub members: Vec<UniformMember>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    U32(u32),
    I32(i32),
    F32(f32),
    Bool(bool),
}

/// What the rest of the pipeline needs to know about a unit without
/// re-parsing it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reflection {
    pub entry_points: Vec<EntryPointInfo>,
    pub uniform_block: Option<UniformBlock>,
    pub constants: BTreeMap<String, ConstValue>,
}

/// A validated translation unit.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub label: String,
    pub code: String,
    pub origin: SourceOrigin,
    pub reflection: Reflection,
}

/// Parses and validates one unit, returning the diagnostic text on failure.
pub fn compile(source: &ProgramSource) -> Result<CompiledUnit, ProgramError> {
    let module = naga::front::wgsl::parse_str(&source.code).map_err(|err| ProgramError::Compile {
        label: source.label.clone(),
        diagnostic: err.emit_to_string(&source.code),
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| ProgramError::Compile {
            label: source.label.clone(),
            diagnostic: err.emit_to_string(&source.code),
        })?;

    let reflection = reflect(&module).map_err(|diagnostic| ProgramError::Compile {
        label: source.label.clone(),
        diagnostic,
    })?;
    debug!(
        label = %source.label,
        entry_points = reflection.entry_points.len(),
        uniform_members = reflection
            .uniform_block
            .as_ref()
            .map_or(0, |block| block.members.len()),
        "compiled program unit"
    );

    Ok(CompiledUnit {
        label: source.label.clone(),
        code: source.code.clone(),
        origin: source.origin,
        reflection,
    })
}

fn reflect(module: &naga::Module) -> Result<Reflection, String> {
    let entry_points = module
        .entry_points
        .iter()
        .map(|ep| EntryPointInfo {
            name: ep.name.clone(),
            stage: ep.stage.into(),
        })
        .collect();

    let mut uniform_block = None;
    for (_, var) in module.global_variables.iter() {
        if var.space != AddressSpace::Uniform {
            continue;
        }
        let Some(binding) = var.binding.as_ref() else {
            continue;
        };
        let TypeInner::Struct { members, span } = &module.types[var.ty].inner else {
            return Err(format!(
                "uniform '{}' must be a struct",
                var.name.as_deref().unwrap_or("<unnamed>")
            ));
        };
        if uniform_block.is_some() {
            return Err("program units may declare at most one uniform block".to_string());
        }
        let members = members
            .iter()
            .map(|member| UniformMember {
                name: member.name.clone().unwrap_or_default(),
                offset: member.offset,
                kind: slot_kind(&module.types[member.ty].inner),
            })
            .collect();
        uniform_block = Some(UniformBlock {
            group: binding.group,
            binding: binding.binding,
            size: *span,
            members,
        });
    }

    let mut constants = BTreeMap::new();
    for (_, constant) in module.constants.iter() {
        let Some(name) = constant.name.as_ref() else {
            continue;
        };
        let value = match &module.global_expressions[constant.init] {
            Expression::Literal(Literal::U32(v)) => ConstValue::U32(*v),
            Expression::Literal(Literal::I32(v)) => ConstValue::I32(*v),
            Expression::Literal(Literal::F32(v)) => ConstValue::F32(*v),
            Expression::Literal(Literal::Bool(v)) => ConstValue::Bool(*v),
            _ => continue,
        };
        constants.insert(name.clone(), value);
    }

    Ok(Reflection {
        entry_points,
        uniform_block,
        constants,
    })
}

fn slot_kind(inner: &TypeInner) -> SlotKind {
    match inner {
        TypeInner::Scalar(scalar) if *scalar == Scalar::F32 => SlotKind::F32,
        TypeInner::Vector {
            size: VectorSize::Bi,
            scalar,
        } if *scalar == Scalar::F32 => SlotKind::Vec2F32,
        TypeInner::Scalar(scalar) => SlotKind::Other(describe_scalar(*scalar)),
        TypeInner::Vector { size, scalar } => {
            SlotKind::Other(format!("vec{}<{}>", *size as u8, describe_scalar(*scalar)))
        }
        TypeInner::Matrix { columns, rows, .. } => {
            SlotKind::Other(format!("mat{}x{}", *columns as u8, *rows as u8))
        }
        TypeInner::Array { .. } => SlotKind::Other("array".to_string()),
        TypeInner::Struct { .. } => SlotKind::Other("struct".to_string()),
        _ => SlotKind::Other("unsupported type".to_string()),
    }
}

fn describe_scalar(scalar: Scalar) -> String {
    match scalar {
        Scalar::F32 => "f32".to_string(),
        Scalar::U32 => "u32".to_string(),
        Scalar::I32 => "i32".to_string(),
        Scalar::BOOL => "bool".to_string(),
        other => format!("{:?}{}", other.kind, other.width * 8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use field::Style;

    #[test]
    fn builtin_fragment_reflects_block_and_style() {
        let unit = compile(&ProgramSource::builtin_fragment(Style::twirl())).unwrap();
        let block = unit.reflection.uniform_block.as_ref().unwrap();
        assert_eq!((block.group, block.binding), (0, 0));
        let offsets: Vec<(&str, u32)> = block
            .members
            .iter()
            .map(|m| (m.name.as_str(), m.offset))
            .collect();
        assert_eq!(
            offsets,
            vec![
                ("time", 0),
                ("speed", 4),
                ("resolution", 8),
                ("warp", 16),
                ("thickness", 20),
                ("colorShift", 24),
            ]
        );
        assert_eq!(block.members[2].kind, SlotKind::Vec2F32);
        assert_eq!(
            unit.reflection.constants.get("TUNNEL_STYLE"),
            Some(&ConstValue::U32(Style::twirl().bits()))
        );
        assert!(unit
            .reflection
            .entry_points
            .iter()
            .any(|ep| ep.name == "fs_tunnel" && ep.stage == Stage::Fragment));
    }

    #[test]
    fn every_preset_fragment_validates() {
        for style in [Style::classic(), Style::twirl(), Style::thor(), Style::rings()] {
            let unit = compile(&ProgramSource::builtin_fragment(style)).unwrap();
            assert_eq!(
                unit.reflection.constants.get("TUNNEL_STYLE"),
                Some(&ConstValue::U32(style.bits())),
                "{style}"
            );
        }
    }

    #[test]
    fn builtin_vertex_has_no_block() {
        let unit = compile(&ProgramSource::builtin_vertex()).unwrap();
        assert!(unit.reflection.uniform_block.is_none());
        assert_eq!(unit.reflection.entry_points[0].stage, Stage::Vertex);
    }

    #[test]
    fn broken_source_yields_diagnostic() {
        let source = ProgramSource::new("broken", "fn main( -> {");
        match compile(&source) {
            Err(ProgramError::Compile { label, diagnostic }) => {
                assert_eq!(label, "broken");
                assert!(!diagnostic.is_empty());
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_module_fails_validation() {
        let source = ProgramSource::new(
            "mismatch",
            "@fragment\nfn main() -> @location(0) vec4<f32> { return 1.0; }\n",
        );
        assert!(matches!(compile(&source), Err(ProgramError::Compile { .. })));
    }

    #[test]
    fn non_float_members_are_described() {
        let source = ProgramSource::new(
            "ints",
            "struct B { time: u32, resolution: vec4<f32>, }\n\
             @group(0) @binding(0) var<uniform> b: B;\n\
             @fragment\nfn main() -> @location(0) vec4<f32> { return vec4<f32>(f32(b.time)); }\n",
        );
        let unit = compile(&source).unwrap();
        let block = unit.reflection.uniform_block.unwrap();
        assert_eq!(block.members[0].kind, SlotKind::Other("u32".into()));
        assert_eq!(block.members[1].kind, SlotKind::Other("vec4<f32>".into()));
    }
}
