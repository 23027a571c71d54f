//! The stage object model.
//!
//! Every document object is either an [`Entity`] (a positioned node) or an
//! [`Association`] (a typed relationship between entities). Both are tagged
//! sum types: the concrete variant is carried in a `type` discriminant
//! string of the form `core:<kind>` in the serialized form, and as an
//! ordinary Rust enum in memory, so dispatch is exhaustive at compile time.

mod association;
mod entity;

pub use association::{ArrowStyle, Association, AssociationKind, LineStyle};
pub use entity::{Entity, EntityKind, SizeAdjust};

use uuid::Uuid;

/// Any live object in the registry: an entity or an association.
///
/// Entities and associations share one uuid namespace; a [`StageObject`]
/// is the unit the registry stores and snapshots capture.
#[derive(Debug, Clone)]
pub enum StageObject {
    Entity(Entity),
    Association(Association),
}

impl StageObject {
    /// Returns the object's uuid.
    pub fn uuid(&self) -> Uuid {
        match self {
            StageObject::Entity(entity) => entity.uuid,
            StageObject::Association(association) => association.uuid,
        }
    }

    /// Returns the `core:<kind>` type tag for this object.
    pub fn type_tag(&self) -> &'static str {
        match self {
            StageObject::Entity(entity) => entity.kind.type_tag(),
            StageObject::Association(association) => association.kind.type_tag(),
        }
    }

    /// Returns the transient selection flag.
    pub fn is_selected(&self) -> bool {
        match self {
            StageObject::Entity(entity) => entity.is_selected,
            StageObject::Association(association) => association.is_selected,
        }
    }

    /// Sets the transient selection flag.
    pub fn set_selected(&mut self, selected: bool) {
        match self {
            StageObject::Entity(entity) => entity.is_selected = selected,
            StageObject::Association(association) => association.is_selected = selected,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            StageObject::Entity(entity) => Some(entity),
            StageObject::Association(_) => None,
        }
    }

    pub fn as_entity_mut(&mut self) -> Option<&mut Entity> {
        match self {
            StageObject::Entity(entity) => Some(entity),
            StageObject::Association(_) => None,
        }
    }

    pub fn as_association(&self) -> Option<&Association> {
        match self {
            StageObject::Entity(_) => None,
            StageObject::Association(association) => Some(association),
        }
    }

    pub fn as_association_mut(&mut self) -> Option<&mut Association> {
        match self {
            StageObject::Entity(_) => None,
            StageObject::Association(association) => Some(association),
        }
    }
}

impl From<Entity> for StageObject {
    fn from(entity: Entity) -> Self {
        StageObject::Entity(entity)
    }
}

impl From<Association> for StageObject {
    fn from(association: Association) -> Self {
        StageObject::Association(association)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Size};

    #[test]
    fn test_stage_object_accessors() {
        let entity = Entity::new_text_node(Point::new(0.0, 0.0), "hello");
        let uuid = entity.uuid;

        let mut object = StageObject::from(entity);
        assert_eq!(object.uuid(), uuid);
        assert_eq!(object.type_tag(), "core:text_node");
        assert!(!object.is_selected());

        object.set_selected(true);
        assert!(object.is_selected());
        assert!(object.as_entity().is_some());
        assert!(object.as_association().is_none());
    }

    #[test]
    fn test_entity_type_tags() {
        let text = Entity::new_text_node(Point::default(), "t");
        assert_eq!(text.kind.type_tag(), "core:text_node");

        let section = Entity::new_section(Point::default(), Size::new(10.0, 10.0), "s");
        assert_eq!(section.kind.type_tag(), "core:section");
        assert!(section.is_section());
        assert!(!text.is_section());
    }
}
