//! Section containment operations.
//!
//! Sections nest into a containment forest, independent of the association
//! graph. This module provides the user-facing operations over that forest:
//! collapsing and expanding (with synchronous hidden-flag propagation over
//! the whole subtree), converting text nodes into sections (singly, or a
//! whole association tree at once), and packing/unpacking a selection into
//! and out of a wrapping section.
//!
//! Every operation validates its preconditions before mutating; a returned
//! error means nothing changed. Physical relocation of entities between
//! containment levels is delegated to the [`SectionHooks`] collaborator.

use log::warn;
use uuid::Uuid;

use crate::{
    collision::entity_collision_box,
    error::StageError,
    geometry::Insets,
    graph::{AssociationGraph, edges_between},
    model::{Entity, EntityKind},
    registry::Registry,
};

/// Padding added around the union of packed entities when auto-sizing a new
/// section's box.
const SECTION_PADDING: f32 = 16.0;

/// Collaborator notified when entities physically move between containment
/// levels. The registry keeps the parent bookkeeping; implementations handle
/// whatever else relocation means for them (canvas re-layering, animation).
pub trait SectionHooks {
    fn go_in_section(&mut self, _moved: &[Uuid], _section: Uuid) {}
    fn go_out_section(&mut self, _moved: &[Uuid], _section: Uuid) {}
}

/// The do-nothing hooks implementation.
pub struct NoHooks;

impl SectionHooks for NoHooks {}

/// Section operations over one registry.
pub struct Sections<'a> {
    registry: &'a mut Registry,
    hooks: Option<&'a mut dyn SectionHooks>,
}

impl<'a> Sections<'a> {
    pub fn new(registry: &'a mut Registry) -> Self {
        Self {
            registry,
            hooks: None,
        }
    }

    pub fn with_hooks(registry: &'a mut Registry, hooks: &'a mut dyn SectionHooks) -> Self {
        Self {
            registry,
            hooks: Some(hooks),
        }
    }

    /// Collapses a section, hiding its entire subtree.
    pub fn pack(&mut self, section: Uuid) -> Result<(), StageError> {
        self.set_collapsed(section, true)
    }

    /// Expands a section. Descendants under a separately collapsed nested
    /// section stay hidden: hidden state is the OR over all ancestors.
    pub fn unpack(&mut self, section: Uuid) -> Result<(), StageError> {
        self.set_collapsed(section, false)
    }

    /// Sets the collapse flag and synchronously re-derives
    /// `is_hidden_by_section_collapse` so no stale flags survive the call.
    pub fn set_collapsed(&mut self, section: Uuid, collapsed: bool) -> Result<(), StageError> {
        match self.registry.entity_mut(section) {
            Some(entity) => match &mut entity.kind {
                EntityKind::Section { is_collapsed, .. } => *is_collapsed = collapsed,
                _ => {
                    return Err(StageError::InvalidGrouping(format!(
                        "{section} is not a section"
                    )));
                }
            },
            None => {
                return Err(StageError::InvalidGrouping(format!(
                    "{section} is not a live entity"
                )));
            }
        }
        self.registry.recompute_hidden_flags();
        Ok(())
    }

    /// Converts each selected text node in place into a section with the
    /// same text, color and details, preserving its parent-section
    /// membership and redirecting associations to the replacement.
    ///
    /// Non-text-nodes in the input are skipped without effect. Returns the
    /// `(old, new)` uuid pairs of performed conversions.
    pub fn text_node_to_section(&mut self, uuids: &[Uuid]) -> Vec<(Uuid, Uuid)> {
        uuids
            .iter()
            .filter_map(|&uuid| {
                self.convert_text_node(uuid)
                    .map(|new_uuid| (uuid, new_uuid))
            })
            .collect()
    }

    /// Converts the association tree rooted at `root` into nested sections.
    ///
    /// Post-order: children are converted first, the connecting edges are
    /// deleted (containment replaces association for these relationships),
    /// the node itself is converted, and the converted children move into
    /// the new section's child list. Returns the root section's uuid.
    ///
    /// # Errors
    ///
    /// [`StageError::InvalidGrouping`] if the component is not a tree, if a
    /// reachable node is not a text node, or if a non-root member already
    /// lives inside a section. Nothing is mutated on failure.
    pub fn text_node_tree_to_section(&mut self, root: Uuid) -> Result<Uuid, StageError> {
        let graph = AssociationGraph::from_registry(self.registry);
        self.validate_tree_conversion(&graph, root)?;
        self.convert_tree_node(&graph, root)
    }

    /// The single-level variant: converts only `root` into a section and
    /// promotes its immediate children into it, leaving deeper descendants
    /// where they are.
    pub fn text_node_tree_to_section_single_level(
        &mut self,
        root: Uuid,
    ) -> Result<Uuid, StageError> {
        let graph = AssociationGraph::from_registry(self.registry);
        self.validate_tree_conversion(&graph, root)?;

        let children = graph.children_of(root);
        for child in &children {
            self.remove_edges_between(root, *child);
        }
        let section = self
            .convert_text_node(root)
            .expect("root validated as a text node");
        for child in &children {
            self.registry.attach_child(section, *child)?;
        }
        self.notify_in_section(&children, section);
        Ok(section)
    }

    /// Packs the given entities into a freshly created section.
    ///
    /// All entities must share one identical parent-section level; the new
    /// section takes their place at that level and its box is auto-sized
    /// from their union.
    ///
    /// # Errors
    ///
    /// [`StageError::InvalidGrouping`] on an empty selection, a uuid that is
    /// not a live entity, or a cross-level selection. Nothing is mutated on
    /// failure.
    pub fn pack_entities_into_section(&mut self, uuids: &[Uuid]) -> Result<Uuid, StageError> {
        // Selections are sets; a uuid listed twice counts once.
        let mut uuids = uuids.to_vec();
        let mut seen = std::collections::HashSet::new();
        uuids.retain(|uuid| seen.insert(*uuid));
        let uuids = &uuids[..];

        if uuids.is_empty() {
            return Err(StageError::InvalidGrouping(
                "cannot pack an empty selection".to_string(),
            ));
        }

        let mut union = None;
        for &uuid in uuids {
            let Some(entity) = self.registry.entity(uuid) else {
                return Err(StageError::InvalidGrouping(format!(
                    "{uuid} is not a live entity"
                )));
            };
            let bounds = entity_collision_box(entity).bounding_rectangle();
            union = Some(match union {
                None => bounds,
                Some(acc) => bounds.merge(&acc),
            });
        }

        let parent = self.registry.parent_section_of(uuids[0]);
        for &uuid in &uuids[1..] {
            if self.registry.parent_section_of(uuid) != parent {
                return Err(StageError::InvalidGrouping(
                    "selected entities are on different containment levels".to_string(),
                ));
            }
        }

        let bounds = union
            .expect("selection validated non-empty")
            .add_padding(Insets::uniform(SECTION_PADDING));
        let section = Entity::new_section(bounds.min_point(), bounds.to_size(), "");
        let section_uuid = self.registry.add(section)?;

        if let Some(parent) = parent {
            for &uuid in uuids {
                self.registry.detach_child(parent, uuid);
            }
        }
        for &uuid in uuids {
            self.registry.attach_child(section_uuid, uuid)?;
        }
        if let Some(parent) = parent {
            self.registry.attach_child(parent, section_uuid)?;
        }

        self.notify_in_section(uuids, section_uuid);
        Ok(section_uuid)
    }

    /// The inverse of packing: replaces each selected section with a text
    /// node carrying its text, details and color, and promotes the
    /// section's children up to the section's own parent level.
    ///
    /// Non-sections in the input are skipped without effect. Returns the
    /// `(old section, replacement)` uuid pairs.
    pub fn unpack_sections(&mut self, uuids: &[Uuid]) -> Vec<(Uuid, Uuid)> {
        let mut replaced = Vec::new();
        for &uuid in uuids {
            let Some(entity) = self.registry.entity(uuid) else {
                continue;
            };
            let EntityKind::Section {
                text,
                size,
                color,
                children,
                ..
            } = &entity.kind
            else {
                continue;
            };
            let (text, size, color, children) =
                (text.clone(), *size, *color, children.clone());
            let location = entity.location;
            let details = entity.details.clone();
            let parent = self.registry.parent_section_of(uuid);

            let mut replacement = Entity::new_text_node(location, text);
            replacement.details = details;
            if let EntityKind::TextNode {
                size: node_size,
                color: node_color,
                ..
            } = &mut replacement.kind
            {
                *node_size = size;
                *node_color = color;
            }
            let new_uuid = replacement.uuid;
            self.registry
                .add(replacement)
                .expect("freshly generated uuid cannot collide");

            // Empty the child list first so promotion passes the
            // exclusivity check.
            if let Some(list) = self
                .registry
                .entity_mut(uuid)
                .and_then(Entity::children_mut)
            {
                list.clear();
            }
            self.registry.redirect_references(uuid, new_uuid);

            if let Some(parent) = parent {
                for &child in &children {
                    if let Err(err) = self.registry.attach_child(parent, child) {
                        warn!(
                            child = child.to_string(),
                            parent = parent.to_string(),
                            err = err.to_string();
                            "Could not promote child while unpacking section"
                        );
                    }
                }
            }

            self.notify_out_section(&children, uuid);
            self.registry.remove(uuid);
            replaced.push((uuid, new_uuid));
        }
        replaced
    }

    /// In-place conversion of one text node into a section. Returns the
    /// replacement's uuid, or `None` if the uuid is not a live text node.
    fn convert_text_node(&mut self, uuid: Uuid) -> Option<Uuid> {
        let entity = self.registry.entity(uuid)?;
        let EntityKind::TextNode {
            text, size, color, ..
        } = &entity.kind
        else {
            return None;
        };
        let (text, size, color) = (text.clone(), *size, *color);
        let location = entity.location;
        let details = entity.details.clone();
        let selected = entity.is_selected;

        let mut section = Entity::new_section(location, size, text);
        section.details = details;
        section.is_selected = selected;
        if let EntityKind::Section {
            color: section_color,
            ..
        } = &mut section.kind
        {
            *section_color = color;
        }
        let new_uuid = section.uuid;

        self.registry
            .add(section)
            .expect("freshly generated uuid cannot collide");
        self.registry.redirect_references(uuid, new_uuid);
        self.registry.remove(uuid);
        Some(new_uuid)
    }

    fn validate_tree_conversion(
        &self,
        graph: &AssociationGraph,
        root: Uuid,
    ) -> Result<(), StageError> {
        if !graph.is_tree(root) {
            return Err(StageError::InvalidGrouping(format!(
                "the component containing {root} is not a tree"
            )));
        }
        for member in graph.successor_set(root, true) {
            let is_text_node = self
                .registry
                .entity(member)
                .is_some_and(|entity| matches!(entity.kind, EntityKind::TextNode { .. }));
            if !is_text_node {
                return Err(StageError::InvalidGrouping(format!(
                    "{member} is not a text node"
                )));
            }
            if member != root && self.registry.parent_section_of(member).is_some() {
                return Err(StageError::InvalidGrouping(format!(
                    "{member} already lives inside a section"
                )));
            }
        }
        Ok(())
    }

    fn convert_tree_node(
        &mut self,
        graph: &AssociationGraph,
        node: Uuid,
    ) -> Result<Uuid, StageError> {
        let children = graph.children_of(node);

        let mut converted = Vec::with_capacity(children.len());
        for child in &children {
            converted.push(self.convert_tree_node(graph, *child)?);
        }
        // Containment replaces association for these relationships. The
        // children's edges were redirected to their replacements, so the
        // lookup goes through the converted uuids.
        for child in &converted {
            self.remove_edges_between(node, *child);
        }

        let section = self
            .convert_text_node(node)
            .expect("members validated as text nodes");
        for child in &converted {
            self.registry.attach_child(section, *child)?;
        }
        self.notify_in_section(&converted, section);
        Ok(section)
    }

    fn remove_edges_between(&mut self, a: Uuid, b: Uuid) {
        let doomed: Vec<Uuid> = edges_between(self.registry, a, b)
            .iter()
            .map(|association| association.uuid)
            .collect();
        for uuid in doomed {
            self.registry.remove(uuid);
        }
    }

    fn notify_in_section(&mut self, moved: &[Uuid], section: Uuid) {
        if let Some(hooks) = self.hooks.as_deref_mut() {
            hooks.go_in_section(moved, section);
        }
    }

    fn notify_out_section(&mut self, moved: &[Uuid], section: Uuid) {
        if let Some(hooks) = self.hooks.as_deref_mut() {
            hooks.go_out_section(moved, section);
        }
    }
}
