use std::fmt;
use std::str::FromStr;

/// User-tunable parameters read by every evaluation.
///
/// The evaluator never clamps these; the ranges below are enforced by
/// whoever mutates the set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSet {
    pub speed: f32,
    pub warp: f32,
    pub thickness: f32,
    pub color_shift: f32,
}

impl ParameterSet {
    pub const MIN_SPEED: f32 = 0.001;
    pub const MAX_SPEED: f32 = 1000.0;
    pub const MIN_WARP: f32 = 0.1;
    pub const MIN_THICKNESS: f32 = 0.01;

    pub fn get(&self, parameter: Parameter) -> f32 {
        match parameter {
            Parameter::Speed => self.speed,
            Parameter::Warp => self.warp,
            Parameter::Thickness => self.thickness,
            Parameter::ColorShift => self.color_shift,
        }
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            speed: 6.0,
            warp: 1.0,
            thickness: 0.18,
            color_shift: 0.0,
        }
    }
}

/// Names one field of [`ParameterSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    Speed,
    Warp,
    Thickness,
    ColorShift,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown parameter '{0}'; expected speed, warp, thickness or color_shift")]
pub struct UnknownParameter(pub String);

impl Parameter {
    pub const ALL: [Parameter; 4] = [
        Parameter::Speed,
        Parameter::Warp,
        Parameter::Thickness,
        Parameter::ColorShift,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Parameter::Speed => "speed",
            Parameter::Warp => "warp",
            Parameter::Thickness => "thickness",
            Parameter::ColorShift => "color_shift",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Parameter {
    type Err = UnknownParameter;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "speed" => Ok(Parameter::Speed),
            "warp" => Ok(Parameter::Warp),
            "thickness" => Ok(Parameter::Thickness),
            "color_shift" | "colorshift" => Ok(Parameter::ColorShift),
            _ => Err(UnknownParameter(value.trim().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_parameter_spellings() {
        assert_eq!("Speed".parse::<Parameter>().unwrap(), Parameter::Speed);
        assert_eq!("color-shift".parse::<Parameter>().unwrap(), Parameter::ColorShift);
        assert_eq!("colorShift".parse::<Parameter>().unwrap(), Parameter::ColorShift);
        assert!("gamma".parse::<Parameter>().is_err());
    }

    #[test]
    fn get_reads_each_field() {
        let params = ParameterSet {
            speed: 1.0,
            warp: 2.0,
            thickness: 3.0,
            color_shift: 4.0,
        };
        let values: Vec<f32> = Parameter::ALL.iter().map(|p| params.get(*p)).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }
}
