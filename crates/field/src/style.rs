use std::fmt;
use std::str::FromStr;

/// Decorative terms layered on top of the shared ray-march pipeline.
///
/// Every style runs the same march and composition; the flags only switch the
/// optional terms on. Styles round-trip through a bitmask so program sources
/// can carry them as a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Style {
    /// Wandering path center, swirl and a drifting depth wrap.
    pub drift: bool,
    /// Eased 90° turns of the tunnel center along cardinal directions.
    pub corner_path: bool,
    /// Roll around the travel axis.
    pub banking: bool,
    /// Red/blue palette smear plus angular motion streaks near the axis.
    pub chromatic_streaks: bool,
    /// Procedural hammer silhouette riding the axis.
    pub hammer: bool,
    /// Polar ring and stripe field blended over the tunnel.
    pub rings: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StyleError {
    #[error("unknown style '{0}'; expected classic, twirl, thor, rings, or flags joined by '+'")]
    Unknown(String),
    #[error("style bitmask {0:#x} contains unknown bits")]
    InvalidBits(u32),
}

const DRIFT: u32 = 1 << 0;
const CORNER_PATH: u32 = 1 << 1;
const BANKING: u32 = 1 << 2;
const CHROMATIC_STREAKS: u32 = 1 << 3;
const HAMMER: u32 = 1 << 4;
const RINGS: u32 = 1 << 5;
const ALL_BITS: u32 = DRIFT | CORNER_PATH | BANKING | CHROMATIC_STREAKS | HAMMER | RINGS;

const FLAG_NAMES: [(&str, u32); 6] = [
    ("drift", DRIFT),
    ("corner-path", CORNER_PATH),
    ("banking", BANKING),
    ("chromatic-streaks", CHROMATIC_STREAKS),
    ("hammer", HAMMER),
    ("rings", RINGS),
];

impl Style {
    /// Plain ray-marched tunnel with no decorative extras.
    pub const fn classic() -> Self {
        Self {
            drift: false,
            corner_path: false,
            banking: false,
            chromatic_streaks: false,
            hammer: false,
            rings: false,
        }
    }

    /// Drifting, swirling center with chromatic smear.
    pub const fn twirl() -> Self {
        Self {
            drift: true,
            corner_path: false,
            banking: false,
            chromatic_streaks: true,
            hammer: false,
            rings: false,
        }
    }

    /// Violent corner-bending travel with banking, streaks and the hammer.
    pub const fn thor() -> Self {
        Self {
            drift: false,
            corner_path: true,
            banking: true,
            chromatic_streaks: true,
            hammer: true,
            rings: false,
        }
    }

    /// Blue and orange polar rings crossed with angular stripes.
    pub const fn rings() -> Self {
        Self {
            drift: false,
            corner_path: false,
            banking: false,
            chromatic_streaks: false,
            hammer: false,
            rings: true,
        }
    }

    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.drift {
            bits |= DRIFT;
        }
        if self.corner_path {
            bits |= CORNER_PATH;
        }
        if self.banking {
            bits |= BANKING;
        }
        if self.chromatic_streaks {
            bits |= CHROMATIC_STREAKS;
        }
        if self.hammer {
            bits |= HAMMER;
        }
        if self.rings {
            bits |= RINGS;
        }
        bits
    }

    pub fn from_bits(bits: u32) -> Result<Self, StyleError> {
        if bits & !ALL_BITS != 0 {
            return Err(StyleError::InvalidBits(bits));
        }
        Ok(Self {
            drift: bits & DRIFT != 0,
            corner_path: bits & CORNER_PATH != 0,
            banking: bits & BANKING != 0,
            chromatic_streaks: bits & CHROMATIC_STREAKS != 0,
            hammer: bits & HAMMER != 0,
            rings: bits & RINGS != 0,
        })
    }

    fn preset_name(self) -> Option<&'static str> {
        if self == Self::classic() {
            Some("classic")
        } else if self == Self::twirl() {
            Some("twirl")
        } else if self == Self::thor() {
            Some("thor")
        } else if self == Self::rings() {
            Some("rings")
        } else {
            None
        }
    }
}

impl FromStr for Style {
    type Err = StyleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "classic" | "circles" | "default" => return Ok(Self::classic()),
            "twirl" => return Ok(Self::twirl()),
            "thor" | "hammer-tunnel" => return Ok(Self::thor()),
            "rings" | "45single" | "flowerpower" => return Ok(Self::rings()),
            _ => {}
        }

        let mut bits = 0;
        for part in normalized.split('+') {
            let part = part.trim().replace('_', "-");
            let Some((_, bit)) = FLAG_NAMES.iter().find(|(name, _)| *name == part) else {
                return Err(StyleError::Unknown(value.trim().to_string()));
            };
            bits |= bit;
        }
        Self::from_bits(bits)
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.preset_name() {
            return f.write_str(name);
        }
        let bits = self.bits();
        let names: Vec<&str> = FLAG_NAMES
            .iter()
            .filter(|(_, bit)| bits & bit != 0)
            .map(|(name, _)| *name)
            .collect();
        f.write_str(&names.join("+"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_presets_and_flag_lists() {
        assert_eq!("classic".parse::<Style>().unwrap(), Style::classic());
        assert_eq!(" Thor ".parse::<Style>().unwrap(), Style::thor());
        let custom: Style = "drift+banking".parse().unwrap();
        assert!(custom.drift && custom.banking);
        assert!(!custom.hammer);
        assert_eq!(
            "corner_path+hammer".parse::<Style>().unwrap(),
            Style {
                corner_path: true,
                hammer: true,
                ..Style::classic()
            }
        );
        assert!(matches!(
            "sparkles".parse::<Style>(),
            Err(StyleError::Unknown(_))
        ));
    }

    #[test]
    fn display_prefers_preset_names() {
        assert_eq!(Style::twirl().to_string(), "twirl");
        let custom = Style {
            banking: true,
            hammer: true,
            ..Style::classic()
        };
        assert_eq!(custom.to_string(), "banking+hammer");
        assert_eq!(custom.to_string().parse::<Style>().unwrap(), custom);
    }

    #[test]
    fn rejects_unknown_bits() {
        assert_eq!(Style::from_bits(1 << 9), Err(StyleError::InvalidBits(1 << 9)));
        assert_eq!(Style::from_bits(Style::thor().bits()).unwrap(), Style::thor());
        assert_eq!(Style::from_bits(1 << 5).unwrap(), Style::rings());
    }

    #[test]
    fn rings_preset_and_aliases() {
        assert_eq!(Style::rings().to_string(), "rings");
        assert_eq!("45single".parse::<Style>().unwrap(), Style::rings());
        assert_eq!("FlowerPower".parse::<Style>().unwrap(), Style::rings());
        let layered: Style = "drift+rings".parse().unwrap();
        assert!(layered.drift && layered.rings);
        assert_eq!(layered.to_string(), "drift+rings");
    }
}
