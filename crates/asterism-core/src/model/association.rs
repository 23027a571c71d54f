//! Association variants: typed relationships between entities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{color::Color, geometry::Point};

/// A typed relationship between two or more entities.
///
/// Binary edges carry a `source`/`target` pair; the hyperedge variant
/// carries an unordered member set. Every referenced uuid must resolve to a
/// live entity at construction time; the registry rejects dangling
/// references instead of keeping placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub uuid: Uuid,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub color: Color,

    #[serde(default)]
    pub is_selected: bool,

    #[serde(flatten)]
    pub kind: AssociationKind,
}

/// The concrete association variant, discriminated by the `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssociationKind {
    /// A straight or curved directed edge.
    #[serde(rename = "core:line_edge")]
    LineEdge {
        source: Uuid,
        target: Uuid,
        #[serde(default)]
        curved: bool,
        /// Where on the source border the edge attaches, 0.0..=1.0.
        #[serde(default = "default_anchor_rate")]
        source_anchor_rate: f32,
        #[serde(default = "default_anchor_rate")]
        target_anchor_rate: f32,
    },

    /// A directed spline through interior control points.
    #[serde(rename = "core:cublic_catmull_rom_spline_edge")]
    CubicCatmullRomSplineEdge {
        source: Uuid,
        target: Uuid,
        #[serde(default)]
        control_points: Vec<Point>,
        #[serde(default)]
        tension: f32,
        #[serde(default = "default_alpha")]
        alpha: f32,
    },

    /// An N-ary undirected hyperedge over a member set.
    #[serde(rename = "core:multi_target_undirected_edge")]
    MultiTargetUndirectedEdge {
        targets: Vec<Uuid>,
        #[serde(default)]
        arrow_style: ArrowStyle,
        #[serde(default)]
        line_style: LineStyle,
    },
}

fn default_anchor_rate() -> f32 {
    0.5
}

fn default_alpha() -> f32 {
    0.5
}

/// Arrowhead rendering for hyperedges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrowStyle {
    #[default]
    None,
    Single,
    Both,
}

/// Stroke rendering for hyperedges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl AssociationKind {
    /// Returns the `core:<kind>` type tag for this variant.
    pub fn type_tag(&self) -> &'static str {
        match self {
            AssociationKind::LineEdge { .. } => "core:line_edge",
            AssociationKind::CubicCatmullRomSplineEdge { .. } => {
                "core:cublic_catmull_rom_spline_edge"
            }
            AssociationKind::MultiTargetUndirectedEdge { .. } => {
                "core:multi_target_undirected_edge"
            }
        }
    }
}

impl Association {
    /// Creates a straight line edge between two entities.
    pub fn new_line_edge(source: Uuid, target: Uuid) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            text: String::new(),
            color: Color::default(),
            is_selected: false,
            kind: AssociationKind::LineEdge {
                source,
                target,
                curved: false,
                source_anchor_rate: default_anchor_rate(),
                target_anchor_rate: default_anchor_rate(),
            },
        }
    }

    /// Creates an undirected hyperedge over the given member set.
    pub fn new_multi_target_edge(targets: Vec<Uuid>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            text: String::new(),
            color: Color::default(),
            is_selected: false,
            kind: AssociationKind::MultiTargetUndirectedEdge {
                targets,
                arrow_style: ArrowStyle::default(),
                line_style: LineStyle::default(),
            },
        }
    }

    /// Returns the `(source, target)` pair for binary edge variants.
    pub fn binary_endpoints(&self) -> Option<(Uuid, Uuid)> {
        match &self.kind {
            AssociationKind::LineEdge { source, target, .. }
            | AssociationKind::CubicCatmullRomSplineEdge { source, target, .. } => {
                Some((*source, *target))
            }
            AssociationKind::MultiTargetUndirectedEdge { .. } => None,
        }
    }

    /// Returns every entity uuid this association references.
    pub fn endpoints(&self) -> Vec<Uuid> {
        match &self.kind {
            AssociationKind::LineEdge { source, target, .. }
            | AssociationKind::CubicCatmullRomSplineEdge { source, target, .. } => {
                vec![*source, *target]
            }
            AssociationKind::MultiTargetUndirectedEdge { targets, .. } => targets.clone(),
        }
    }

    /// Returns true if this association references the given entity.
    pub fn references(&self, uuid: Uuid) -> bool {
        match &self.kind {
            AssociationKind::LineEdge { source, target, .. }
            | AssociationKind::CubicCatmullRomSplineEdge { source, target, .. } => {
                *source == uuid || *target == uuid
            }
            AssociationKind::MultiTargetUndirectedEdge { targets, .. } => targets.contains(&uuid),
        }
    }

    /// Replaces every occurrence of `old` in the endpoint set with `new`.
    pub fn redirect(&mut self, old: Uuid, new: Uuid) {
        match &mut self.kind {
            AssociationKind::LineEdge { source, target, .. }
            | AssociationKind::CubicCatmullRomSplineEdge { source, target, .. } => {
                if *source == old {
                    *source = new;
                }
                if *target == old {
                    *target = new;
                }
            }
            AssociationKind::MultiTargetUndirectedEdge { targets, .. } => {
                for member in targets.iter_mut() {
                    if *member == old {
                        *member = new;
                    }
                }
            }
        }
    }
}
