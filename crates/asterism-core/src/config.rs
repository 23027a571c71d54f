//! Engine configuration.
//!
//! This module provides the configuration tree that controls edge routing,
//! history bounds, the autosave cadence and default styling. All types
//! implement [`serde::Deserialize`] for loading from external sources.
//!
//! # Overview
//!
//! - [`EngineConfig`] - Top-level configuration combining the sections below.
//! - [`EdgeConfig`] - Edge routing mode and curvature cap.
//! - [`HistoryConfig`] - Undo/redo snapshot bound.
//! - [`AutosaveConfig`] - Elapsed-time gate interval for periodic saves.
//! - [`StyleConfig`] - Default colors for freshly created objects.

use serde::Deserialize;

use crate::{collision::EdgeRouting, color::Color, history::DEFAULT_MAX_SIZE};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Edge routing section.
    #[serde(default)]
    edge: EdgeConfig,

    /// History section.
    #[serde(default)]
    history: HistoryConfig,

    /// Autosave section.
    #[serde(default)]
    autosave: AutosaveConfig,

    /// Style section.
    #[serde(default)]
    style: StyleConfig,
}

impl EngineConfig {
    /// Returns the edge routing configuration.
    pub fn edge(&self) -> &EdgeConfig {
        &self.edge
    }

    /// Returns the history configuration.
    pub fn history(&self) -> &HistoryConfig {
        &self.history
    }

    /// Returns the autosave configuration.
    pub fn autosave(&self) -> &AutosaveConfig {
        &self.autosave
    }

    /// Returns the style configuration.
    pub fn style(&self) -> &StyleConfig {
        &self.style
    }
}

/// Edge routing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    /// Routing mode for newly computed edge geometry.
    #[serde(default)]
    routing: EdgeRouting,

    /// Upper bound on bezier control tangent length, so far-apart nodes do
    /// not produce runaway curve bulge.
    #[serde(default = "default_max_curve_radius")]
    max_curve_radius: f32,
}

fn default_max_curve_radius() -> f32 {
    120.0
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            routing: EdgeRouting::default(),
            max_curve_radius: default_max_curve_radius(),
        }
    }
}

impl EdgeConfig {
    pub fn routing(&self) -> EdgeRouting {
        self.routing
    }

    pub fn max_curve_radius(&self) -> f32 {
        self.max_curve_radius
    }
}

/// History configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of retained snapshots.
    #[serde(default = "default_history_max_size")]
    max_size: usize,
}

fn default_history_max_size() -> usize {
    DEFAULT_MAX_SIZE
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_size: default_history_max_size(),
        }
    }
}

impl HistoryConfig {
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

/// Autosave configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AutosaveConfig {
    /// Seconds between autosave opportunities. The gate simply answers
    /// "not due" until the interval has elapsed; saves are never queued.
    #[serde(default = "default_autosave_interval_secs")]
    interval_secs: u64,
}

fn default_autosave_interval_secs() -> u64 {
    60
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_autosave_interval_secs(),
        }
    }
}

impl AutosaveConfig {
    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }
}

/// Default styling for freshly created objects.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct StyleConfig {
    /// Default node [`Color`], as a CSS color string.
    #[serde(default)]
    default_node_color: Option<String>,
}

impl StyleConfig {
    /// Returns the parsed default node [`Color`], or `None` if not
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured color string cannot be parsed.
    pub fn default_node_color(&self) -> Result<Option<Color>, String> {
        self.default_node_color
            .as_ref()
            .map(|color| Color::from_css(color))
            .transpose()
            .map_err(|err| format!("Invalid default node color in config: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();

        assert_eq!(config.edge().routing(), EdgeRouting::Straight);
        assert_eq!(config.edge().max_curve_radius(), 120.0);
        assert_eq!(config.history().max_size(), DEFAULT_MAX_SIZE);
        assert_eq!(config.autosave().interval_secs(), 60);
        assert!(config.style().default_node_color().unwrap().is_none());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let json = serde_json::json!({
            "edge": { "routing": "bezier" },
            "history": { "max_size": 5 },
        });

        let config: EngineConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.edge().routing(), EdgeRouting::Bezier);
        assert_eq!(config.edge().max_curve_radius(), 120.0); // untouched default
        assert_eq!(config.history().max_size(), 5);
        assert_eq!(config.autosave().interval_secs(), 60);
    }

    #[test]
    fn test_invalid_style_color_surfaces_on_access() {
        let json = serde_json::json!({
            "style": { "default_node_color": "definitely-not-a-color" },
        });

        let config: EngineConfig = serde_json::from_value(json).unwrap();
        assert!(config.style().default_node_color().is_err());
    }
}
