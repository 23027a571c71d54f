//! Versioned serialization of the registry.
//!
//! The persisted form is the [`Envelope`]: `{ version, entities,
//! associations, tags }` with every object tagged by a `core:<kind>` type
//! string. [`dump`] walks the live registry into a current-version
//! envelope; [`load`] runs raw bytes through the migration chain
//! (schema v1 up to [`CURRENT_VERSION`]) and reconstructs typed objects in
//! two phases, entities before associations, so an association can never
//! come to life with a dangling endpoint.
//!
//! Forward compatibility: objects with unknown type tags are skipped with a
//! warning, as are associations whose endpoints did not survive the entity
//! pass. A field with no sensible default (uuid, edge endpoints) missing is
//! a [`StageError::MalformedDocument`] and aborts the whole load.

mod migrate;

use std::collections::HashSet;

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::StageError,
    model::{Association, Entity},
    registry::Registry,
};

/// The schema version this build writes.
pub const CURRENT_VERSION: u64 = 17;

/// Entity type tags this build understands.
const ENTITY_TAGS: &[&str] = &[
    "core:text_node",
    "core:section",
    "core:connect_point",
    "core:image_node",
    "core:url_node",
    "core:portal_node",
    "core:pen_stroke",
    "core:svg_node",
];

/// Association type tags this build understands.
const ASSOCIATION_TAGS: &[&str] = &[
    "core:line_edge",
    "core:cublic_catmull_rom_spline_edge",
    "core:multi_target_undirected_edge",
];

/// The versioned top-level document shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u64,

    #[serde(default)]
    pub entities: Vec<Entity>,

    #[serde(default)]
    pub associations: Vec<Association>,

    #[serde(default)]
    pub tags: Vec<Uuid>,
}

impl Envelope {
    /// An empty current-version envelope, the state of a fresh document.
    pub fn empty() -> Self {
        Self {
            version: CURRENT_VERSION,
            entities: Vec::new(),
            associations: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Encodes the envelope to pretty-printed JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StageError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Snapshots the whole registry into a current-version envelope.
pub fn dump(registry: &Registry, tags: &[Uuid]) -> Envelope {
    Envelope {
        version: CURRENT_VERSION,
        entities: registry.entities().cloned().collect(),
        associations: registry.associations().cloned().collect(),
        tags: tags.to_vec(),
    }
}

/// Snapshots a selection: the given entities plus, for any selected
/// section, its entire descendant subtree, and only the associations whose
/// every endpoint lies inside that expanded set.
pub fn dump_selected(registry: &Registry, selected: &[Uuid], tags: &[Uuid]) -> Envelope {
    let mut included = HashSet::new();
    let mut stack: Vec<Uuid> = selected.to_vec();
    while let Some(uuid) = stack.pop() {
        let Some(entity) = registry.entity(uuid) else {
            continue;
        };
        if included.insert(uuid)
            && let Some(children) = entity.children()
        {
            stack.extend(children.iter().copied());
        }
    }

    Envelope {
        version: CURRENT_VERSION,
        entities: registry
            .entities()
            .filter(|entity| included.contains(&entity.uuid))
            .cloned()
            .collect(),
        associations: registry
            .associations()
            .filter(|association| {
                association
                    .endpoints()
                    .iter()
                    .all(|endpoint| included.contains(endpoint))
            })
            .cloned()
            .collect(),
        tags: tags
            .iter()
            .filter(|tag| included.contains(tag))
            .copied()
            .collect(),
    }
}

/// Parses raw document bytes, migrating legacy schema versions up to
/// [`CURRENT_VERSION`].
///
/// # Errors
///
/// [`StageError::MalformedDocument`] on undecodable input, a version newer
/// than this build, or an object missing a non-defaultable field. Unknown
/// type tags are not errors; those objects are skipped with a warning.
pub fn load(raw: &[u8]) -> Result<Envelope, StageError> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|err| StageError::MalformedDocument(format!("invalid document encoding: {err}")))?;
    let value = migrate::to_current(value)?;
    let root = value
        .as_object()
        .expect("migration output is always a map");

    let mut entities = Vec::new();
    if let Some(Value::Array(items)) = root.get("entities") {
        for item in items {
            if let Some(entity) = reconstruct::<Entity>(item, ENTITY_TAGS)? {
                entities.push(entity);
            }
        }
    }

    let mut associations = Vec::new();
    if let Some(Value::Array(items)) = root.get("associations") {
        for item in items {
            if let Some(association) = reconstruct::<Association>(item, ASSOCIATION_TAGS)? {
                associations.push(association);
            }
        }
    }

    let tags = match root.get("tags") {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|err| StageError::MalformedDocument(format!("invalid tags list: {err}")))?,
        None => Vec::new(),
    };

    Ok(Envelope {
        version: CURRENT_VERSION,
        entities,
        associations,
        tags,
    })
}

/// Rebuilds the registry wholesale from an envelope.
///
/// The registry is destroyed first, then entities are inserted, then
/// associations; an association whose endpoint did not survive the entity
/// pass (for example because its entity carried an unknown type tag) is
/// skipped with a warning rather than kept as a placeholder.
pub fn restore(envelope: &Envelope, registry: &mut Registry) -> Result<(), StageError> {
    registry.destroy();

    for entity in &envelope.entities {
        registry.add(entity.clone()).map_err(|err| {
            StageError::MalformedDocument(format!("rejected entity during restore: {err}"))
        })?;
    }
    for association in &envelope.associations {
        match registry.add(association.clone()) {
            Ok(_) => {}
            Err(StageError::DanglingReference {
                association,
                endpoint,
            }) => {
                warn!(
                    association = association.to_string(),
                    endpoint = endpoint.to_string();
                    "Skipping association with missing endpoint"
                );
            }
            Err(err) => {
                return Err(StageError::MalformedDocument(format!(
                    "rejected association during restore: {err}"
                )));
            }
        }
    }

    registry.recompute_hidden_flags();
    Ok(())
}

/// Reconstructs one typed object from its migrated JSON form.
///
/// Returns `Ok(None)` for unknown type tags (forward compatibility);
/// everything else that fails to decode is a malformed document.
fn reconstruct<T: DeserializeOwned>(item: &Value, known: &[&str]) -> Result<Option<T>, StageError> {
    let map = item
        .as_object()
        .ok_or_else(|| StageError::MalformedDocument("object entry is not a map".to_string()))?;
    if !map.contains_key("uuid") {
        return Err(StageError::MalformedDocument(
            "object without uuid".to_string(),
        ));
    }

    let tag = map.get("type").and_then(Value::as_str).unwrap_or_default();
    if !known.contains(&tag) {
        warn!(tag; "Skipping object with unsupported type tag");
        return Ok(None);
    }

    serde_json::from_value(item.clone())
        .map(Some)
        .map_err(|err| StageError::MalformedDocument(format!("invalid `{tag}` object: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Size};
    use crate::model::EntityKind;

    fn sample_registry() -> (Registry, Uuid, Uuid, Uuid) {
        let mut registry = Registry::new();
        let a = registry
            .add(Entity::new_text_node(Point::new(1.0, 2.0), "a"))
            .unwrap();
        let b = registry
            .add(Entity::new_text_node(Point::new(3.0, 4.0), "b"))
            .unwrap();
        let edge = registry.add(Association::new_line_edge(a, b)).unwrap();
        (registry, a, b, edge)
    }

    #[test]
    fn test_dump_restore_round_trip() {
        let (registry, a, b, edge) = sample_registry();
        let envelope = dump(&registry, &[a]);

        let mut rebuilt = Registry::new();
        restore(&envelope, &mut rebuilt).unwrap();

        assert_eq!(rebuilt.len(), registry.len());
        assert!(rebuilt.entity(a).is_some());
        assert!(rebuilt.entity(b).is_some());
        assert!(rebuilt.association(edge).is_some());
        assert_eq!(rebuilt.entity(a).unwrap().location, Point::new(1.0, 2.0));
    }

    #[test]
    fn test_bytes_round_trip() {
        let (registry, a, _, edge) = sample_registry();
        let bytes = dump(&registry, &[a]).to_bytes().unwrap();

        let envelope = load(&bytes).unwrap();
        assert_eq!(envelope.version, CURRENT_VERSION);
        assert_eq!(envelope.entities.len(), 2);
        assert_eq!(envelope.associations.len(), 1);
        assert_eq!(envelope.associations[0].uuid, edge);
        assert_eq!(envelope.tags, vec![a]);
    }

    #[test]
    fn test_dump_selected_expands_section_subtree() {
        let mut registry = Registry::new();
        let section = registry
            .add(Entity::new_section(
                Point::default(),
                Size::new(100.0, 100.0),
                "s",
            ))
            .unwrap();
        let inside = registry
            .add(Entity::new_text_node(Point::default(), "inside"))
            .unwrap();
        let outside = registry
            .add(Entity::new_text_node(Point::default(), "outside"))
            .unwrap();
        registry.attach_child(section, inside).unwrap();
        let inner_edge = registry
            .add(Association::new_line_edge(section, inside))
            .unwrap();
        registry
            .add(Association::new_line_edge(inside, outside))
            .unwrap();

        let envelope = dump_selected(&registry, &[section], &[]);

        let uuids: Vec<Uuid> = envelope.entities.iter().map(|entity| entity.uuid).collect();
        assert!(uuids.contains(&section));
        assert!(uuids.contains(&inside));
        assert!(!uuids.contains(&outside));

        // Only associations with every endpoint inside the expanded set.
        assert_eq!(envelope.associations.len(), 1);
        assert_eq!(envelope.associations[0].uuid, inner_edge);
    }

    #[test]
    fn test_load_skips_unknown_type_tags() {
        let raw = serde_json::json!({
            "version": CURRENT_VERSION,
            "entities": [
                {
                    "type": "core:hologram_node",
                    "uuid": Uuid::new_v4(),
                    "location": [0.0, 0.0],
                },
                {
                    "type": "core:text_node",
                    "uuid": Uuid::new_v4(),
                    "location": [0.0, 0.0],
                    "text": "kept",
                },
            ],
            "associations": [],
            "tags": [],
        });

        let envelope = load(raw.to_string().as_bytes()).unwrap();
        assert_eq!(envelope.entities.len(), 1);
        match &envelope.entities[0].kind {
            EntityKind::TextNode { text, .. } => assert_eq!(text, "kept"),
            other => panic!("expected text node, got {other:?}"),
        }
    }

    #[test]
    fn test_load_rejects_object_without_uuid() {
        let raw = serde_json::json!({
            "version": CURRENT_VERSION,
            "entities": [{ "type": "core:text_node", "text": "anonymous" }],
            "associations": [],
            "tags": [],
        });

        let err = load(raw.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, StageError::MalformedDocument(_)));
    }

    #[test]
    fn test_load_rejects_garbage_bytes() {
        let err = load(b"not json at all").unwrap_err();
        assert!(matches!(err, StageError::MalformedDocument(_)));
    }

    #[test]
    fn test_restore_skips_dangling_association() {
        let a = Entity::new_text_node(Point::default(), "a");
        let a_uuid = a.uuid;
        let edge = Association::new_line_edge(a_uuid, Uuid::new_v4());

        let envelope = Envelope {
            version: CURRENT_VERSION,
            entities: vec![a],
            associations: vec![edge],
            tags: vec![],
        };

        let mut registry = Registry::new();
        restore(&envelope, &mut registry).unwrap();

        // The entity survives; the dangling edge is dropped, never a stub.
        assert!(registry.entity(a_uuid).is_some());
        assert_eq!(registry.associations().count(), 0);
    }

    #[test]
    fn test_restore_rederives_hidden_flags() {
        let mut registry = Registry::new();
        let section = registry
            .add(Entity::new_section(
                Point::default(),
                Size::new(50.0, 50.0),
                "s",
            ))
            .unwrap();
        let child = registry
            .add(Entity::new_text_node(Point::default(), "child"))
            .unwrap();
        registry.attach_child(section, child).unwrap();
        match &mut registry.entity_mut(section).unwrap().kind {
            EntityKind::Section { is_collapsed, .. } => *is_collapsed = true,
            _ => unreachable!(),
        }
        registry.recompute_hidden_flags();

        // The hidden flag is derived, not persisted: it must come back
        // after a round trip through the envelope.
        let envelope = dump(&registry, &[]);
        let mut rebuilt = Registry::new();
        restore(&envelope, &mut rebuilt).unwrap();

        assert!(rebuilt.entity(child).unwrap().is_hidden_by_section_collapse);
    }
}
