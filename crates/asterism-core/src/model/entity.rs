//! Entity variants: positioned document objects.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    color::Color,
    geometry::{Point, Size},
};

/// A positioned document object.
///
/// Common fields live on the struct; variant-specific fields live in
/// [`EntityKind`]. `is_hidden_by_section_collapse` is derived state (true
/// iff at least one ancestor section is collapsed) and is not persisted:
/// it is recomputed whenever the containment hierarchy or a collapse flag
/// changes, and after every load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub uuid: Uuid,

    #[serde(default)]
    pub location: Point,

    #[serde(default)]
    pub details: String,

    #[serde(default)]
    pub is_selected: bool,

    #[serde(default, skip_serializing)]
    pub is_hidden_by_section_collapse: bool,

    #[serde(flatten)]
    pub kind: EntityKind,
}

/// The concrete entity variant, discriminated by the `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntityKind {
    #[serde(rename = "core:text_node")]
    TextNode {
        #[serde(default)]
        text: String,
        #[serde(default)]
        size: Size,
        #[serde(default)]
        color: Color,
        #[serde(default)]
        size_adjust: SizeAdjust,
    },

    #[serde(rename = "core:section")]
    Section {
        #[serde(default)]
        text: String,
        #[serde(default)]
        size: Size,
        #[serde(default)]
        color: Color,
        #[serde(default)]
        is_collapsed: bool,
        #[serde(default)]
        children: Vec<Uuid>,
    },

    /// A zero-size anchor other objects can connect to.
    #[serde(rename = "core:connect_point")]
    ConnectPoint,

    #[serde(rename = "core:image_node")]
    ImageNode {
        source: String,
        #[serde(default)]
        size: Size,
    },

    #[serde(rename = "core:url_node")]
    UrlNode {
        url: String,
        #[serde(default)]
        title: String,
    },

    /// A live view into another document.
    #[serde(rename = "core:portal_node")]
    PortalNode {
        target_path: String,
        #[serde(default)]
        size: Size,
    },

    #[serde(rename = "core:pen_stroke")]
    PenStroke {
        #[serde(default)]
        points: Vec<Point>,
        #[serde(default = "default_stroke_width")]
        stroke_width: f32,
        #[serde(default)]
        color: Color,
    },

    #[serde(rename = "core:svg_node")]
    SvgNode {
        markup: String,
        #[serde(default)]
        size: Size,
    },
}

fn default_stroke_width() -> f32 {
    2.0
}

/// How a text node's box tracks its text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeAdjust {
    /// The box grows and shrinks with the text.
    #[default]
    Auto,
    /// The box keeps whatever size the user dragged it to.
    Manual,
}

impl EntityKind {
    /// Returns the `core:<kind>` type tag for this variant.
    pub fn type_tag(&self) -> &'static str {
        match self {
            EntityKind::TextNode { .. } => "core:text_node",
            EntityKind::Section { .. } => "core:section",
            EntityKind::ConnectPoint => "core:connect_point",
            EntityKind::ImageNode { .. } => "core:image_node",
            EntityKind::UrlNode { .. } => "core:url_node",
            EntityKind::PortalNode { .. } => "core:portal_node",
            EntityKind::PenStroke { .. } => "core:pen_stroke",
            EntityKind::SvgNode { .. } => "core:svg_node",
        }
    }
}

impl Entity {
    /// Creates a text node at the given location with default size and color.
    pub fn new_text_node(location: Point, text: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            location,
            details: String::new(),
            is_selected: false,
            is_hidden_by_section_collapse: false,
            kind: EntityKind::TextNode {
                text: text.into(),
                size: Size::default(),
                color: Color::default(),
                size_adjust: SizeAdjust::default(),
            },
        }
    }

    /// Creates an expanded, empty section.
    pub fn new_section(location: Point, size: Size, text: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            location,
            details: String::new(),
            is_selected: false,
            is_hidden_by_section_collapse: false,
            kind: EntityKind::Section {
                text: text.into(),
                size,
                color: Color::default(),
                is_collapsed: false,
                children: Vec::new(),
            },
        }
    }

    /// Creates a zero-size connect point anchor.
    pub fn new_connect_point(location: Point) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            location,
            details: String::new(),
            is_selected: false,
            is_hidden_by_section_collapse: false,
            kind: EntityKind::ConnectPoint,
        }
    }

    /// Returns true for section entities.
    pub fn is_section(&self) -> bool {
        matches!(self.kind, EntityKind::Section { .. })
    }

    /// Returns the entity's box size. Zero for sizeless variants.
    pub fn size(&self) -> Size {
        match &self.kind {
            EntityKind::TextNode { size, .. }
            | EntityKind::Section { size, .. }
            | EntityKind::ImageNode { size, .. }
            | EntityKind::PortalNode { size, .. }
            | EntityKind::SvgNode { size, .. } => *size,
            EntityKind::ConnectPoint | EntityKind::UrlNode { .. } => Size::default(),
            EntityKind::PenStroke { points, .. } => {
                // A stroke's extent is the span of its points.
                let mut min = Point::new(f32::MAX, f32::MAX);
                let mut max = Point::new(f32::MIN, f32::MIN);
                for p in points {
                    min = Point::new(min.x().min(p.x()), min.y().min(p.y()));
                    max = Point::new(max.x().max(p.x()), max.y().max(p.y()));
                }
                if points.is_empty() {
                    Size::default()
                } else {
                    Size::new(max.x() - min.x(), max.y() - min.y())
                }
            }
        }
    }

    /// Returns the section child list, if this entity is a section.
    pub fn children(&self) -> Option<&[Uuid]> {
        match &self.kind {
            EntityKind::Section { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Returns the mutable section child list, if this entity is a section.
    pub fn children_mut(&mut self) -> Option<&mut Vec<Uuid>> {
        match &mut self.kind {
            EntityKind::Section { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Returns the collapse flag for sections, false otherwise.
    pub fn is_collapsed(&self) -> bool {
        match &self.kind {
            EntityKind::Section { is_collapsed, .. } => *is_collapsed,
            _ => false,
        }
    }
}
