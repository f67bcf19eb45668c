use std::fmt;
use std::str::FromStr;

use image::DynamicImage;

use crate::config::ConfigError;

/// How far to turn each frame, clockwise, before it is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Half,
    CounterClockwise90,
}

impl Rotation {
    /// Accepts any whole multiple of 90 degrees, normalized to one turn.
    /// `-90` and `270` are the same rotation.
    pub fn from_degrees(degrees: i64) -> Result<Self, ConfigError> {
        if degrees % 90 != 0 {
            return Err(ConfigError::BadRotation(degrees.to_string()));
        }

        let rotation = match degrees.rem_euclid(360) {
            0 => Rotation::None,
            90 => Rotation::Clockwise90,
            180 => Rotation::Half,
            _ => Rotation::CounterClockwise90,
        };
        Ok(rotation)
    }

    /// Same as `from_degrees`, for values read from JSON, where `90.0` is fine
    /// but `45.5` is not.
    pub fn from_float(degrees: f64) -> Result<Self, ConfigError> {
        if !degrees.is_finite() || degrees.fract() != 0.0 {
            return Err(ConfigError::BadRotation(degrees.to_string()));
        }
        Self::from_degrees(degrees as i64)
    }

    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Clockwise90 => 90,
            Rotation::Half => 180,
            Rotation::CounterClockwise90 => 270,
        }
    }

    pub fn apply(&self, frame: DynamicImage) -> DynamicImage {
        match self {
            Rotation::None => frame,
            Rotation::Clockwise90 => frame.rotate90(),
            Rotation::Half => frame.rotate180(),
            Rotation::CounterClockwise90 => frame.rotate270(),
        }
    }
}

impl FromStr for Rotation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(degrees) = trimmed.parse::<i64>() {
            return Self::from_degrees(degrees);
        }
        match trimmed.parse::<f64>() {
            Ok(degrees) => Self::from_float(degrees),
            Err(_) => Err(ConfigError::BadRotation(s.to_string())),
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}
