//! Color handling for stage objects.
//!
//! The document format stores colors as plain `[r, g, b, a]` component
//! arrays. CSS color strings ("#ff0000", "rgb(255, 0, 0)", "red", ...) are
//! accepted at the configuration boundary and resolved to sRGB components
//! on parse.

use std::str::FromStr;

use color::{DynamicColor, Srgb};
use serde::{Deserialize, Serialize};

/// An sRGB color with alpha, stored as resolved components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct Color {
    components: [f32; 4],
}

impl From<[f32; 4]> for Color {
    fn from(components: [f32; 4]) -> Self {
        Self { components }
    }
}

impl From<Color> for [f32; 4] {
    fn from(color: Color) -> Self {
        color.components
    }
}

impl Color {
    /// Fully transparent black, the color of a freshly created object.
    pub const TRANSPARENT: Color = Color {
        components: [0.0, 0.0, 0.0, 0.0],
    };

    /// Creates a color from explicit sRGB components in the `0.0..=1.0` range.
    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            components: [r, g, b, a],
        }
    }

    /// Parses a CSS color string such as "#ff0000", "rgb(255, 0, 0)" or "red".
    pub fn from_css(color_str: &str) -> Result<Self, String> {
        match DynamicColor::from_str(color_str) {
            Ok(color) => Ok(Self {
                components: color.to_alpha_color::<Srgb>().components,
            }),
            Err(err) => Err(format!("Invalid color '{color_str}': {err}")),
        }
    }

    /// Returns the raw `[r, g, b, a]` components.
    pub fn components(self) -> [f32; 4] {
        self.components
    }

    /// Returns the alpha component.
    pub fn alpha(self) -> f32 {
        self.components[3]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::TRANSPARENT
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r, g, b, a] = self.components;
        write!(f, "rgba({r}, {g}, {b}, {a})")
    }
}
