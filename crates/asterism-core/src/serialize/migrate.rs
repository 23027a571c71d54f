//! The schema migration chain.
//!
//! Documents carry a monotonically increasing `version`; files written
//! before versioning existed read as version 1. [`to_current`] runs a raw
//! document tree through a strictly ordered chain of pure steps, one per
//! historical schema version. Each step only fires when the document is
//! older than its target, performs a structural transform (renames,
//! defaults for newly introduced fields, reshaping) and stamps the target
//! version, so running the chain on an already current document changes
//! nothing.
//!
//! Steps fill defaults for defaultable fields and fail with
//! [`StageError::MalformedDocument`] only for fields that have no sensible
//! default, such as a missing uuid or missing edge endpoints.

use log::debug;
use serde_json::{Map, Value, json};

use crate::error::StageError;

use super::CURRENT_VERSION;

type JsonMap = Map<String, Value>;

struct Step {
    target: u64,
    name: &'static str,
    apply: fn(&mut JsonMap) -> Result<(), StageError>,
}

const STEPS: [Step; 16] = [
    Step {
        target: 2,
        name: "rename collections and introduce type tags",
        apply: rename_collections,
    },
    Step {
        target: 3,
        name: "flatten shape into location and size",
        apply: flatten_shape,
    },
    Step {
        target: 4,
        name: "rename inner_text to text",
        apply: rename_inner_text,
    },
    Step {
        target: 5,
        name: "rename edge endpoints to source/target",
        apply: rename_edge_endpoints,
    },
    Step {
        target: 6,
        name: "introduce colors",
        apply: introduce_colors,
    },
    Step {
        target: 7,
        name: "introduce entity details",
        apply: introduce_details,
    },
    Step {
        target: 8,
        name: "introduce document tags",
        apply: introduce_tags,
    },
    Step {
        target: 9,
        name: "turn groups into sections",
        apply: groups_to_sections,
    },
    Step {
        target: 10,
        name: "introduce text size adjust",
        apply: introduce_size_adjust,
    },
    Step {
        target: 11,
        name: "introduce line edge anchors",
        apply: introduce_line_anchors,
    },
    Step {
        target: 12,
        name: "rename catmull-rom splines",
        apply: rename_spline_edges,
    },
    Step {
        target: 13,
        name: "generalize undirected edges to target sets",
        apply: hyperedge_targets,
    },
    Step {
        target: 14,
        name: "normalize media node fields",
        apply: normalize_media_fields,
    },
    Step {
        target: 15,
        name: "normalize pen stroke fields",
        apply: normalize_pen_strokes,
    },
    Step {
        target: 16,
        name: "drop persisted hidden flags",
        apply: drop_derived_hidden,
    },
    Step {
        target: 17,
        name: "introduce selection flags",
        apply: introduce_selection_flags,
    },
];

/// Migrates a raw document tree to [`CURRENT_VERSION`].
///
/// # Errors
///
/// [`StageError::MalformedDocument`] if the root is not a map, the version
/// is newer than this build supports, or a step finds a non-defaultable
/// field missing.
pub(super) fn to_current(value: Value) -> Result<Value, StageError> {
    let Value::Object(mut root) = value else {
        return Err(StageError::MalformedDocument(
            "document root is not a map".to_string(),
        ));
    };

    let version = version_of(&root);
    if version > CURRENT_VERSION {
        return Err(StageError::MalformedDocument(format!(
            "document version {version} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    for step in &STEPS {
        if version_of(&root) < step.target {
            debug!(target = step.target, step = step.name; "Applying migration step");
            (step.apply)(&mut root)?;
            root.insert("version".to_string(), json!(step.target));
        }
    }

    Ok(Value::Object(root))
}

/// Documents from before versioning read as version 1.
fn version_of(root: &JsonMap) -> u64 {
    root.get("version").and_then(Value::as_u64).unwrap_or(1)
}

// ===================
// Shared helpers
// ===================

fn for_each_object(
    root: &mut JsonMap,
    field: &str,
    mut apply: impl FnMut(&mut JsonMap) -> Result<(), StageError>,
) -> Result<(), StageError> {
    if let Some(Value::Array(items)) = root.get_mut(field) {
        for item in items {
            if let Value::Object(map) = item {
                apply(map)?;
            }
        }
    }
    Ok(())
}

fn rename_root_field(root: &mut JsonMap, old: &str, new: &str) {
    if !root.contains_key(new)
        && let Some(value) = root.remove(old)
    {
        root.insert(new.to_string(), value);
    }
}

fn rename_field(map: &mut JsonMap, old: &str, new: &str) {
    if !map.contains_key(new)
        && let Some(value) = map.remove(old)
    {
        map.insert(new.to_string(), value);
    }
}

fn default_field(map: &mut JsonMap, key: &str, value: Value) {
    map.entry(key.to_string()).or_insert(value);
}

fn tag_of(map: &JsonMap) -> &str {
    map.get("type").and_then(Value::as_str).unwrap_or_default()
}

fn retag(map: &mut JsonMap, old: &str, new: &str) {
    if tag_of(map) == old {
        map.insert("type".to_string(), json!(new));
    }
}

fn require_uuid(map: &JsonMap, what: &str) -> Result<(), StageError> {
    if map.get("uuid").and_then(Value::as_str).is_none() {
        return Err(StageError::MalformedDocument(format!(
            "legacy {what} without uuid"
        )));
    }
    Ok(())
}

// ===================
// Steps
// ===================

/// v1 -> v2: the pre-tag format called the collections `nodes` and `links`
/// and had only text nodes and plain edges, so the tags are implied.
fn rename_collections(root: &mut JsonMap) -> Result<(), StageError> {
    rename_root_field(root, "nodes", "entities");
    rename_root_field(root, "links", "associations");
    for_each_object(root, "entities", |map| {
        require_uuid(map, "node")?;
        default_field(map, "type", json!("core:text_node"));
        Ok(())
    })?;
    for_each_object(root, "associations", |map| {
        require_uuid(map, "link")?;
        default_field(map, "type", json!("core:line_edge"));
        Ok(())
    })
}

/// v2 -> v3: `shape: { location_left_top, width, height }` becomes flat
/// `location` and `size` fields.
fn flatten_shape(root: &mut JsonMap) -> Result<(), StageError> {
    for_each_object(root, "entities", |map| {
        if let Some(Value::Object(shape)) = map.remove("shape") {
            let location = shape
                .get("location_left_top")
                .cloned()
                .unwrap_or(json!([0.0, 0.0]));
            let width = shape.get("width").cloned().unwrap_or(json!(0.0));
            let height = shape.get("height").cloned().unwrap_or(json!(0.0));
            map.insert("location".to_string(), location);
            map.insert("size".to_string(), json!([width, height]));
        }
        default_field(map, "location", json!([0.0, 0.0]));
        Ok(())
    })
}

/// v3 -> v4
fn rename_inner_text(root: &mut JsonMap) -> Result<(), StageError> {
    for_each_object(root, "entities", |map| {
        rename_field(map, "inner_text", "text");
        default_field(map, "text", json!(""));
        Ok(())
    })
}

/// v4 -> v5: edges used `from`/`to`; both endpoints are required, there is
/// no sensible default for a missing one.
fn rename_edge_endpoints(root: &mut JsonMap) -> Result<(), StageError> {
    for_each_object(root, "associations", |map| {
        rename_field(map, "from", "source");
        rename_field(map, "to", "target");
        if !map.contains_key("source") || !map.contains_key("target") {
            return Err(StageError::MalformedDocument(
                "legacy edge without both endpoints".to_string(),
            ));
        }
        Ok(())
    })
}

/// v5 -> v6: colors arrive; edges also lose their `label` alias.
fn introduce_colors(root: &mut JsonMap) -> Result<(), StageError> {
    for_each_object(root, "entities", |map| {
        default_field(map, "color", json!([0.0, 0.0, 0.0, 0.0]));
        Ok(())
    })?;
    for_each_object(root, "associations", |map| {
        rename_field(map, "label", "text");
        default_field(map, "text", json!(""));
        default_field(map, "color", json!([0.0, 0.0, 0.0, 0.0]));
        Ok(())
    })
}

/// v6 -> v7
fn introduce_details(root: &mut JsonMap) -> Result<(), StageError> {
    for_each_object(root, "entities", |map| {
        default_field(map, "details", json!(""));
        Ok(())
    })
}

/// v7 -> v8
fn introduce_tags(root: &mut JsonMap) -> Result<(), StageError> {
    if !root.contains_key("tags") {
        root.insert("tags".to_string(), json!([]));
    }
    Ok(())
}

/// v8 -> v9: the old `core:group` container becomes `core:section` with a
/// `children` list and a collapse flag.
fn groups_to_sections(root: &mut JsonMap) -> Result<(), StageError> {
    for_each_object(root, "entities", |map| {
        retag(map, "core:group", "core:section");
        if tag_of(map) == "core:section" {
            rename_field(map, "members", "children");
            default_field(map, "children", json!([]));
            default_field(map, "is_collapsed", json!(false));
        }
        Ok(())
    })
}

/// v9 -> v10
fn introduce_size_adjust(root: &mut JsonMap) -> Result<(), StageError> {
    for_each_object(root, "entities", |map| {
        if tag_of(map) == "core:text_node" {
            default_field(map, "size_adjust", json!("auto"));
        }
        Ok(())
    })
}

/// v10 -> v11
fn introduce_line_anchors(root: &mut JsonMap) -> Result<(), StageError> {
    for_each_object(root, "associations", |map| {
        if tag_of(map) == "core:line_edge" {
            default_field(map, "curved", json!(false));
            default_field(map, "source_anchor_rate", json!(0.5));
            default_field(map, "target_anchor_rate", json!(0.5));
        }
        Ok(())
    })
}

/// v11 -> v12
fn rename_spline_edges(root: &mut JsonMap) -> Result<(), StageError> {
    for_each_object(root, "associations", |map| {
        retag(map, "core:catmull_rom_edge", "core:cublic_catmull_rom_spline_edge");
        if tag_of(map) == "core:cublic_catmull_rom_spline_edge" {
            default_field(map, "control_points", json!([]));
            default_field(map, "tension", json!(0.0));
            default_field(map, "alpha", json!(0.5));
        }
        Ok(())
    })
}

/// v12 -> v13: binary undirected edges generalize to N-ary target sets.
fn hyperedge_targets(root: &mut JsonMap) -> Result<(), StageError> {
    for_each_object(root, "associations", |map| {
        retag(map, "core:undirected_edge", "core:multi_target_undirected_edge");
        if tag_of(map) == "core:multi_target_undirected_edge" {
            if !map.contains_key("targets") {
                match (map.remove("source"), map.remove("target")) {
                    (Some(source), Some(target)) => {
                        map.insert("targets".to_string(), json!([source, target]));
                    }
                    _ => {
                        return Err(StageError::MalformedDocument(
                            "undirected edge without targets".to_string(),
                        ));
                    }
                }
            }
            default_field(map, "arrow_style", json!("none"));
            default_field(map, "line_style", json!("solid"));
        }
        Ok(())
    })
}

/// v13 -> v14
fn normalize_media_fields(root: &mut JsonMap) -> Result<(), StageError> {
    for_each_object(root, "entities", |map| {
        match tag_of(map) {
            "core:image_node" => {
                rename_field(map, "path", "source");
                default_field(map, "source", json!(""));
            }
            "core:url_node" => {
                default_field(map, "url", json!(""));
                default_field(map, "title", json!(""));
            }
            "core:portal_node" => {
                default_field(map, "target_path", json!(""));
            }
            "core:svg_node" => {
                default_field(map, "markup", json!(""));
            }
            _ => {}
        }
        Ok(())
    })
}

/// v14 -> v15
fn normalize_pen_strokes(root: &mut JsonMap) -> Result<(), StageError> {
    for_each_object(root, "entities", |map| {
        if tag_of(map) == "core:pen_stroke" {
            rename_field(map, "stroke_points", "points");
            default_field(map, "points", json!([]));
            default_field(map, "stroke_width", json!(2.0));
        }
        Ok(())
    })
}

/// v15 -> v16: the hidden flag is derived from ancestor collapse state and
/// no longer persisted.
fn drop_derived_hidden(root: &mut JsonMap) -> Result<(), StageError> {
    for_each_object(root, "entities", |map| {
        map.remove("is_hidden_by_section_collapse");
        Ok(())
    })
}

/// v16 -> v17: selection became part of snapshots; the abandoned z_index
/// experiment is dropped.
fn introduce_selection_flags(root: &mut JsonMap) -> Result<(), StageError> {
    let normalize = |map: &mut JsonMap| -> Result<(), StageError> {
        default_field(map, "is_selected", json!(false));
        map.remove("z_index");
        Ok(())
    };
    for_each_object(root, "entities", normalize)?;
    for_each_object(root, "associations", normalize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrate(value: Value) -> Value {
        to_current(value).expect("migration should succeed")
    }

    #[test]
    fn test_v1_fixture_reaches_current_shape() {
        let v1 = json!({
            "nodes": [{
                "uuid": "a",
                "shape": { "location_left_top": [0.0, 0.0], "width": 10.0, "height": 10.0 },
                "inner_text": "hi",
            }],
            "links": [],
        });

        let migrated = migrate(v1);
        assert_eq!(migrated["version"], json!(CURRENT_VERSION));

        let entity = &migrated["entities"][0];
        assert_eq!(entity["type"], json!("core:text_node"));
        assert_eq!(entity["uuid"], json!("a"));
        assert_eq!(entity["location"], json!([0.0, 0.0]));
        assert_eq!(entity["size"], json!([10.0, 10.0]));
        assert_eq!(entity["text"], json!("hi"));
        assert_eq!(entity["size_adjust"], json!("auto"));
        assert_eq!(entity["color"], json!([0.0, 0.0, 0.0, 0.0]));
        assert_eq!(entity["details"], json!(""));
        assert_eq!(entity["is_selected"], json!(false));
        assert_eq!(migrated["associations"], json!([]));
        assert_eq!(migrated["tags"], json!([]));
    }

    #[test]
    fn test_missing_version_reads_as_v1() {
        let no_version = json!({ "nodes": [], "links": [] });
        let migrated = migrate(no_version);
        assert_eq!(migrated["version"], json!(CURRENT_VERSION));
    }

    #[test]
    fn test_migration_is_idempotent_on_current_data() {
        let v1 = json!({
            "nodes": [{
                "uuid": "a",
                "shape": { "location_left_top": [1.0, 2.0], "width": 3.0, "height": 4.0 },
                "inner_text": "hello",
            }],
            "links": [{ "uuid": "e", "from": "a", "to": "a" }],
        });

        let once = migrate(v1);
        let twice = migrate(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let future = json!({ "version": CURRENT_VERSION + 1, "entities": [], "associations": [] });
        let err = to_current(future).unwrap_err();
        assert!(matches!(err, StageError::MalformedDocument(_)));
    }

    #[test]
    fn test_non_map_root_is_rejected() {
        let err = to_current(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, StageError::MalformedDocument(_)));
    }

    #[test]
    fn test_missing_uuid_is_malformed() {
        let v1 = json!({ "nodes": [{ "inner_text": "anonymous" }], "links": [] });
        let err = to_current(v1).unwrap_err();
        assert!(matches!(err, StageError::MalformedDocument(_)));
    }

    #[test]
    fn test_missing_endpoint_is_malformed() {
        let v1 = json!({
            "nodes": [{ "uuid": "a", "inner_text": "a" }],
            "links": [{ "uuid": "e", "from": "a" }],
        });
        let err = to_current(v1).unwrap_err();
        assert!(matches!(err, StageError::MalformedDocument(_)));
    }

    #[test]
    fn test_groups_become_sections() {
        let v8 = json!({
            "version": 8,
            "entities": [{
                "uuid": "g",
                "type": "core:group",
                "location": [0.0, 0.0],
                "members": ["a"],
            }],
            "associations": [],
            "tags": [],
        });

        let migrated = migrate(v8);
        let entity = &migrated["entities"][0];
        assert_eq!(entity["type"], json!("core:section"));
        assert_eq!(entity["children"], json!(["a"]));
        assert_eq!(entity["is_collapsed"], json!(false));
        assert!(entity.get("members").is_none());
    }

    #[test]
    fn test_undirected_edges_gain_target_sets() {
        let v12 = json!({
            "version": 12,
            "entities": [],
            "associations": [{
                "uuid": "h",
                "type": "core:undirected_edge",
                "source": "a",
                "target": "b",
            }],
            "tags": [],
        });

        let migrated = migrate(v12);
        let association = &migrated["associations"][0];
        assert_eq!(association["type"], json!("core:multi_target_undirected_edge"));
        assert_eq!(association["targets"], json!(["a", "b"]));
        assert_eq!(association["arrow_style"], json!("none"));
        assert!(association.get("source").is_none());
        assert!(association.get("target").is_none());
    }

    #[test]
    fn test_spline_rename_and_defaults() {
        let v11 = json!({
            "version": 11,
            "entities": [],
            "associations": [{
                "uuid": "s",
                "type": "core:catmull_rom_edge",
                "source": "a",
                "target": "b",
            }],
            "tags": [],
        });

        let migrated = migrate(v11);
        let association = &migrated["associations"][0];
        assert_eq!(
            association["type"],
            json!("core:cublic_catmull_rom_spline_edge")
        );
        assert_eq!(association["control_points"], json!([]));
        assert_eq!(association["alpha"], json!(0.5));
    }

    #[test]
    fn test_persisted_hidden_flag_is_dropped() {
        let v15 = json!({
            "version": 15,
            "entities": [{
                "uuid": "a",
                "type": "core:text_node",
                "location": [0.0, 0.0],
                "text": "t",
                "is_hidden_by_section_collapse": true,
            }],
            "associations": [],
            "tags": [],
        });

        let migrated = migrate(v15);
        assert!(
            migrated["entities"][0]
                .get("is_hidden_by_section_collapse")
                .is_none()
        );
    }

    #[test]
    fn test_partial_version_only_runs_remaining_steps() {
        // A v10 document keeps its existing fields; only later steps fire.
        let v10 = json!({
            "version": 10,
            "entities": [{
                "uuid": "a",
                "type": "core:text_node",
                "location": [5.0, 6.0],
                "size": [7.0, 8.0],
                "text": "kept",
                "size_adjust": "manual",
                "color": [1.0, 0.0, 0.0, 1.0],
                "details": "d",
            }],
            "associations": [],
            "tags": ["11111111-2222-3333-4444-555555555555"],
        });

        let migrated = migrate(v10);
        let entity = &migrated["entities"][0];
        assert_eq!(entity["size_adjust"], json!("manual"));
        assert_eq!(entity["color"], json!([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(entity["is_selected"], json!(false));
        assert_eq!(migrated["version"], json!(CURRENT_VERSION));
    }
}
