//! Simulation parameters and the display-level configuration wrapped around
//! them.
//!
//! Both types deserialize from YAML; every field is optional and falls back
//! to the defaults below:
//!
//! ```yaml
//! orb_radii_in_dim: 6.6667
//! gas_density: 0.00005
//! temperature: 5.0
//! max_link_thickness_per_radius: 0.5
//! max_range_per_radius: 1.5
//! background_color: "#000"
//! fill_color: "#fff"
//! static: false
//! square: false
//! global_alpha: 1.0
//! object_fit: cover
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// An 8-bit RGBA colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl FromStr for Rgba {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() {
            return Err(invalid());
        }

        let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).map(|v| v * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);

        let parsed = match hex.len() {
            3 => (nibble(0), nibble(1), nibble(2), Ok(255)),
            4 => (nibble(0), nibble(1), nibble(2), nibble(3)),
            6 => (byte(0), byte(2), byte(4), Ok(255)),
            8 => (byte(0), byte(2), byte(4), byte(6)),
            _ => return Err(invalid()),
        };

        match parsed {
            (Ok(r), Ok(g), Ok(b), Ok(a)) => Ok(Rgba { r, g, b, a }),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Rgba {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgba> for String {
    fn from(c: Rgba) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

/// Parameters of one simulation run. Any change re-seeds the simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// The smaller surface side divided by the orb radius.
    pub orb_radii_in_dim: f64,
    /// Gas particles per square pixel.
    pub gas_density: f64,
    /// Standard deviation of the gas velocity components.
    pub temperature: f64,
    pub max_link_thickness_per_radius: f64,
    pub max_range_per_radius: f64,
    pub background_color: Rgba,
    pub fill_color: Rgba,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            orb_radii_in_dim: 20.0 / 3.0,
            gas_density: 0.00005,
            temperature: 5.0,
            max_link_thickness_per_radius: 0.5,
            max_range_per_radius: 1.5,
            background_color: Rgba::BLACK,
            fill_color: Rgba::WHITE,
        }
    }
}

impl SimulationParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("orb_radii_in_dim", self.orb_radii_in_dim)?;
        positive(
            "max_link_thickness_per_radius",
            self.max_link_thickness_per_radius,
        )?;
        positive("max_range_per_radius", self.max_range_per_radius)?;
        non_negative("gas_density", self.gas_density)?;
        non_negative("temperature", self.temperature)?;
        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { name, value })
    }
}

/// Whether the host keeps animating or renders one settled frame and halts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Animated,
    Static,
}

/// Layout hint for fitting the frame into the visible surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectFit {
    Contain,
    #[default]
    Cover,
}

/// Everything the display side is configured with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoConfig {
    #[serde(flatten)]
    pub params: SimulationParams,
    #[serde(rename = "static")]
    pub static_frame: bool,
    /// Force a 1:1 surface by padding to the larger measured side.
    pub square: bool,
    pub global_alpha: f32,
    pub object_fit: ObjectFit,
}

impl Default for LogoConfig {
    fn default() -> Self {
        Self {
            params: SimulationParams::default(),
            static_frame: false,
            square: false,
            global_alpha: 1.0,
            object_fit: ObjectFit::Cover,
        }
    }
}

impl LogoConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: LogoConfig = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.params.validate()?;
        if !(0.0..=1.0).contains(&self.global_alpha) {
            return Err(ConfigError::AlphaOutOfRange(self.global_alpha));
        }
        Ok(())
    }

    pub fn mode(&self) -> RenderMode {
        if self.static_frame {
            RenderMode::Static
        } else {
            RenderMode::Animated
        }
    }
}
