//! The authoritative uuid-indexed store of all live document objects.
//!
//! The registry owns every [`StageObject`] in the open document and
//! enforces the structural invariants: uuid uniqueness across the shared
//! entity/association namespace, non-dangling association endpoints, and
//! exclusive containment (an entity is a child of at most one section, so
//! the containment hierarchy forms a forest independent of the association
//! graph). Violations are detected before any mutation, so a failed call
//! leaves the registry unchanged.

use std::collections::HashMap;

use indexmap::IndexMap;
use log::debug;
use uuid::Uuid;

use crate::{
    error::StageError,
    model::{Association, AssociationKind, Entity, StageObject},
};

/// The uuid-indexed object store for one document.
///
/// Iteration order is insertion order, which keeps dumps and snapshots
/// deterministic.
#[derive(Debug, Default)]
pub struct Registry {
    objects: IndexMap<Uuid, StageObject>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            objects: IndexMap::new(),
        }
    }

    /// Returns the number of live objects (entities plus associations).
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Checks whether an object with the given uuid exists.
    pub fn contains(&self, uuid: Uuid) -> bool {
        self.objects.contains_key(&uuid)
    }

    /// Inserts an object into the registry.
    ///
    /// # Errors
    ///
    /// * [`StageError::DuplicateUuid`] if the uuid is already present.
    /// * [`StageError::DanglingReference`] if the object is an association
    ///   and any endpoint does not resolve to a live entity.
    pub fn add(&mut self, object: impl Into<StageObject>) -> Result<Uuid, StageError> {
        let object = object.into();
        let uuid = object.uuid();

        if self.objects.contains_key(&uuid) {
            return Err(StageError::DuplicateUuid(uuid));
        }

        if let StageObject::Association(association) = &object {
            for endpoint in association.endpoints() {
                if self.entity(endpoint).is_none() {
                    return Err(StageError::DanglingReference {
                        association: uuid,
                        endpoint,
                    });
                }
            }
        }

        self.objects.insert(uuid, object);
        Ok(uuid)
    }

    /// Returns the object with the given uuid.
    pub fn get(&self, uuid: Uuid) -> Option<&StageObject> {
        self.objects.get(&uuid)
    }

    pub fn get_mut(&mut self, uuid: Uuid) -> Option<&mut StageObject> {
        self.objects.get_mut(&uuid)
    }

    /// Returns the entity with the given uuid, if the uuid names an entity.
    pub fn entity(&self, uuid: Uuid) -> Option<&Entity> {
        self.objects.get(&uuid).and_then(StageObject::as_entity)
    }

    pub fn entity_mut(&mut self, uuid: Uuid) -> Option<&mut Entity> {
        self.objects
            .get_mut(&uuid)
            .and_then(StageObject::as_entity_mut)
    }

    /// Returns the association with the given uuid, if the uuid names one.
    pub fn association(&self, uuid: Uuid) -> Option<&Association> {
        self.objects
            .get(&uuid)
            .and_then(StageObject::as_association)
    }

    pub fn association_mut(&mut self, uuid: Uuid) -> Option<&mut Association> {
        self.objects
            .get_mut(&uuid)
            .and_then(StageObject::as_association_mut)
    }

    /// Returns a lazy view over all entities in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.objects.values().filter_map(StageObject::as_entity)
    }

    /// Returns a lazy view over all associations in insertion order.
    pub fn associations(&self) -> impl Iterator<Item = &Association> {
        self.objects
            .values()
            .filter_map(StageObject::as_association)
    }

    pub(crate) fn associations_mut(&mut self) -> impl Iterator<Item = &mut Association> {
        self.objects
            .values_mut()
            .filter_map(StageObject::as_association_mut)
    }

    /// Returns a lazy view over the currently selected objects.
    pub fn selected(&self) -> impl Iterator<Item = &StageObject> {
        self.objects.values().filter(|object| object.is_selected())
    }

    /// Sets the transient selection flag on one object.
    pub fn set_selected(&mut self, uuid: Uuid, selected: bool) {
        if let Some(object) = self.objects.get_mut(&uuid) {
            object.set_selected(selected);
        }
    }

    /// Clears the selection flag on every object.
    pub fn clear_selection(&mut self) {
        for object in self.objects.values_mut() {
            object.set_selected(false);
        }
    }

    /// Removes an object and everything that references it.
    ///
    /// Removing an entity strips it from every section child list, removes
    /// its uuid from hyperedge member sets, and removes outright any
    /// association left with a dangling or degenerate endpoint set. No
    /// reference to the removed uuid survives the call.
    pub fn remove(&mut self, uuid: Uuid) -> Option<StageObject> {
        let removed = self.objects.shift_remove(&uuid)?;

        if let StageObject::Entity(_) = &removed {
            // Binary edges die with their endpoint; hyperedges shrink, and
            // die when fewer than two members remain.
            let doomed: Vec<Uuid> = self
                .associations()
                .filter(|association| {
                    association.references(uuid)
                        && (association.binary_endpoints().is_some()
                            || association.endpoints().len() <= 2)
                })
                .map(|association| association.uuid)
                .collect();
            for association_uuid in doomed {
                self.objects.shift_remove(&association_uuid);
            }
            for association in self.associations_mut() {
                if let AssociationKind::MultiTargetUndirectedEdge { targets, .. } =
                    &mut association.kind
                {
                    targets.retain(|member| *member != uuid);
                }
            }

            for object in self.objects.values_mut() {
                if let Some(entity) = object.as_entity_mut()
                    && let Some(children) = entity.children_mut()
                {
                    children.retain(|child| *child != uuid);
                }
            }

            self.recompute_hidden_flags();
        }

        debug!(uuid = uuid.to_string(); "Removed object from registry");
        Some(removed)
    }

    /// Clears the registry entirely, used before loading a new document or
    /// reconstructing from a history snapshot.
    pub fn destroy(&mut self) {
        self.objects.clear();
    }

    /// Returns the section containing the given entity, if any.
    pub fn parent_section_of(&self, uuid: Uuid) -> Option<Uuid> {
        self.entities()
            .find(|entity| {
                entity
                    .children()
                    .is_some_and(|children| children.contains(&uuid))
            })
            .map(|entity| entity.uuid)
    }

    /// Inserts `child` into `section`'s child list.
    ///
    /// # Errors
    ///
    /// [`StageError::InvalidGrouping`] if either uuid does not name a live
    /// entity, `section` is not a section, the child already has a parent
    /// section, or the insertion would create a containment cycle. Nothing
    /// is mutated on failure.
    pub fn attach_child(&mut self, section: Uuid, child: Uuid) -> Result<(), StageError> {
        if section == child {
            return Err(StageError::InvalidGrouping(format!(
                "cannot place section {section} inside itself"
            )));
        }
        match self.entity(section) {
            Some(entity) if entity.is_section() => {}
            _ => {
                return Err(StageError::InvalidGrouping(format!(
                    "{section} is not a section"
                )));
            }
        }
        if self.entity(child).is_none() {
            return Err(StageError::InvalidGrouping(format!(
                "{child} is not a live entity"
            )));
        }
        if let Some(parent) = self.parent_section_of(child) {
            return Err(StageError::InvalidGrouping(format!(
                "{child} is already contained in section {parent}"
            )));
        }
        // The child may itself be a section; refuse to nest a section under
        // one of its own descendants.
        let mut ancestor = Some(section);
        while let Some(current) = ancestor {
            if current == child {
                return Err(StageError::InvalidGrouping(format!(
                    "{child} is an ancestor of section {section}"
                )));
            }
            ancestor = self.parent_section_of(current);
        }

        self.entity_mut(section)
            .and_then(Entity::children_mut)
            .expect("validated section above")
            .push(child);
        self.recompute_hidden_flags();
        Ok(())
    }

    /// Removes `child` from `section`'s child list. Returns true if the
    /// child was present.
    pub fn detach_child(&mut self, section: Uuid, child: Uuid) -> bool {
        let Some(children) = self.entity_mut(section).and_then(Entity::children_mut) else {
            return false;
        };
        let before = children.len();
        children.retain(|member| *member != child);
        let detached = children.len() != before;
        if detached {
            self.recompute_hidden_flags();
        }
        detached
    }

    /// Replaces `old` with `new` wherever `old` appears: association
    /// endpoints, hyperedge member sets and section child lists. Used by
    /// in-place conversions that swap one entity for another.
    pub(crate) fn redirect_references(&mut self, old: Uuid, new: Uuid) {
        for association in self.associations_mut() {
            association.redirect(old, new);
        }
        for object in self.objects.values_mut() {
            if let Some(entity) = object.as_entity_mut()
                && let Some(children) = entity.children_mut()
            {
                for child in children.iter_mut() {
                    if *child == old {
                        *child = new;
                    }
                }
            }
        }
    }

    /// Re-derives `is_hidden_by_section_collapse` for every entity.
    ///
    /// An entity is hidden iff at least one ancestor section in the
    /// containment forest is collapsed.
    pub fn recompute_hidden_flags(&mut self) {
        let mut parent_of: HashMap<Uuid, Uuid> = HashMap::new();
        let mut collapsed: HashMap<Uuid, bool> = HashMap::new();
        for entity in self.entities() {
            if let Some(children) = entity.children() {
                collapsed.insert(entity.uuid, entity.is_collapsed());
                for child in children {
                    parent_of.insert(*child, entity.uuid);
                }
            }
        }

        let uuids: Vec<Uuid> = self.entities().map(|entity| entity.uuid).collect();
        for uuid in uuids {
            let mut hidden = false;
            let mut ancestor = parent_of.get(&uuid).copied();
            while let Some(current) = ancestor {
                if collapsed.get(&current).copied().unwrap_or(false) {
                    hidden = true;
                    break;
                }
                ancestor = parent_of.get(&current).copied();
            }
            if let Some(entity) = self.entity_mut(uuid) {
                entity.is_hidden_by_section_collapse = hidden;
            }
        }
    }
}
