//! The document context.
//!
//! A [`Document`] is an explicit value owning one [`Registry`], its
//! [`History`], the document tag list and the [`EngineConfig`]. There is
//! no global document state, so multiple documents coexist and tests stay
//! isolated. All mutation is synchronous; the only asynchronous boundary
//! is the [`Storage`] collaborator, and a save dumps the registry into a
//! snapshot *before* the byte write, so later mutation cannot corrupt a
//! write already in flight.

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use log::{debug, info};
use uuid::Uuid;

use crate::{
    collision::{
        CollisionBox, SelectionPolicy, edge_collision_box, entity_collision_box,
        self_loop_collision_box,
    },
    config::EngineConfig,
    error::StageError,
    geometry::{Bounds, Point},
    history::History,
    registry::Registry,
    section::{SectionHooks, Sections},
    serialize::{self, Envelope},
    storage::Storage,
};

/// An elapsed-time gate for periodic work.
///
/// `due` answers true at most once per interval; when not yet due the
/// caller simply skips its action; nothing is queued or retried.
#[derive(Debug)]
pub struct AutosaveGate {
    interval: Duration,
    last: Instant,
}

impl AutosaveGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    /// Returns true and rearms when the interval has elapsed.
    pub fn due(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}

/// One open document: registry, history, tags and configuration.
#[derive(Debug)]
pub struct Document {
    registry: Registry,
    history: History,
    tags: Vec<Uuid>,
    config: EngineConfig,
    path: Option<PathBuf>,
    autosave: AutosaveGate,
}

impl Document {
    /// Creates an empty document.
    pub fn new(config: EngineConfig) -> Self {
        let autosave = AutosaveGate::new(Duration::from_secs(config.autosave().interval_secs()));
        Self {
            registry: Registry::new(),
            history: History::new(Envelope::empty(), config.history().max_size()),
            tags: Vec::new(),
            config,
            path: None,
            autosave,
        }
    }

    /// Reads and migrates a document from storage.
    ///
    /// The registry is built up fresh and only swapped in on success, so a
    /// failed load leaves no partial document behind.
    pub fn open(
        storage: &dyn Storage,
        path: impl Into<PathBuf>,
        config: EngineConfig,
    ) -> Result<Self, StageError> {
        let path = path.into();
        let raw = storage.read_bytes(&path)?;
        let envelope = serialize::load(&raw)?;

        let mut registry = Registry::new();
        serialize::restore(&envelope, &mut registry)?;

        info!(
            path = path.display().to_string(),
            entities = registry.entities().count(),
            associations = registry.associations().count();
            "Opened document"
        );

        let mut document = Self::new(config);
        document.registry = registry;
        document.tags = envelope.tags.clone();
        document.history.reset(envelope);
        document.path = Some(path);
        Ok(document)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The storage path this document was opened from or last saved to.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Section operations over this document's registry.
    pub fn sections(&mut self) -> Sections<'_> {
        Sections::new(&mut self.registry)
    }

    /// Section operations with a relocation collaborator attached.
    pub fn sections_with_hooks<'a>(
        &'a mut self,
        hooks: &'a mut dyn SectionHooks,
    ) -> Sections<'a> {
        Sections::with_hooks(&mut self.registry, hooks)
    }

    pub fn tags(&self) -> &[Uuid] {
        &self.tags
    }

    /// Tags an object. No-op for uuids not in the registry or already
    /// tagged.
    pub fn add_tag(&mut self, uuid: Uuid) {
        if self.registry.contains(uuid) && !self.tags.contains(&uuid) {
            self.tags.push(uuid);
        }
    }

    pub fn remove_tag(&mut self, uuid: Uuid) {
        self.tags.retain(|tag| *tag != uuid);
    }

    /// The hit-test geometry of one entity.
    pub fn entity_geometry(&self, uuid: Uuid) -> Option<CollisionBox> {
        self.registry.entity(uuid).map(entity_collision_box)
    }

    /// The hit-test geometry of one binary association under the configured
    /// routing mode. `shift_midpoint` is the drag midpoint of an edge being
    /// interactively shifted. Hyperedges have no single curve and return
    /// `None`.
    pub fn edge_geometry(&self, uuid: Uuid, shift_midpoint: Option<Point>) -> Option<CollisionBox> {
        let association = self.registry.association(uuid)?;
        let (source, target) = association.binary_endpoints()?;

        let source_box = entity_collision_box(self.registry.entity(source)?);
        if source == target {
            return Some(self_loop_collision_box(&source_box));
        }
        let target_box = entity_collision_box(self.registry.entity(target)?);
        Some(edge_collision_box(
            &source_box,
            &target_box,
            self.config.edge().routing(),
            shift_midpoint,
            self.config.edge().max_curve_radius(),
        ))
    }

    /// The topmost visible entity whose box contains the point, if any.
    /// Entities hidden by a collapsed ancestor section are not hit.
    pub fn hit_test(&self, point: Point) -> Option<Uuid> {
        self.registry
            .entities()
            .filter(|entity| !entity.is_hidden_by_section_collapse)
            .filter(|entity| entity_collision_box(entity).contains_point(point))
            .map(|entity| entity.uuid)
            .last()
    }

    /// Visible entities hit by a selection rectangle under the given
    /// policy.
    pub fn entities_in_rect(&self, rect: Bounds, policy: SelectionPolicy) -> Vec<Uuid> {
        self.registry
            .entities()
            .filter(|entity| !entity.is_hidden_by_section_collapse)
            .filter(|entity| entity_collision_box(entity).hit_by_rect(rect, policy))
            .map(|entity| entity.uuid)
            .collect()
    }

    /// Snapshots the whole registry into a current-version envelope.
    pub fn dump(&self) -> Envelope {
        serialize::dump(&self.registry, &self.tags)
    }

    /// Snapshots the given entities plus the subtrees of any selected
    /// sections.
    pub fn dump_selected(&self, selected: &[Uuid]) -> Envelope {
        serialize::dump_selected(&self.registry, selected, &self.tags)
    }

    /// Records an undo step: a fresh dump appended to the history stack.
    pub fn record_step(&mut self) {
        let snapshot = self.dump();
        self.history.record(snapshot);
        debug!(
            cursor = self.history.cursor(),
            len = self.history.len();
            "Recorded history step"
        );
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Steps back one snapshot, destroying and fully reconstructing the
    /// registry. Returns false (a silent no-op) when already at the start.
    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.history.undo() else {
            return false;
        };
        let snapshot = snapshot.clone();
        self.reconstruct(&snapshot);
        true
    }

    /// Steps forward one snapshot, symmetric to [`Document::undo`].
    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.history.redo() else {
            return false;
        };
        let snapshot = snapshot.clone();
        self.reconstruct(&snapshot);
        true
    }

    /// Changes the history bound at runtime.
    pub fn set_history_max_size(&mut self, max_size: usize) {
        self.history.set_max_size(max_size);
    }

    /// Saves to the document's current path.
    ///
    /// # Errors
    ///
    /// [`StageError::MalformedDocument`] if the document has never been
    /// given a path; storage and encoding errors pass through.
    pub fn save(&mut self, storage: &mut dyn Storage) -> Result<(), StageError> {
        let Some(path) = self.path.clone() else {
            return Err(StageError::MalformedDocument(
                "document has no storage path; use save_as".to_string(),
            ));
        };
        self.write_to(storage, &path)
    }

    /// Saves to a new path and rebases history on the saved snapshot.
    pub fn save_as(
        &mut self,
        storage: &mut dyn Storage,
        path: impl Into<PathBuf>,
    ) -> Result<(), StageError> {
        let path = path.into();
        self.write_to(storage, &path)?;
        self.path = Some(path);
        self.history.reset(self.dump());
        Ok(())
    }

    /// Saves through the autosave gate: a no-op unless the configured
    /// interval has elapsed and the document has a path. Returns whether a
    /// save happened.
    pub fn maybe_autosave(&mut self, storage: &mut dyn Storage) -> Result<bool, StageError> {
        if self.path.is_none() || !self.autosave.due() {
            return Ok(false);
        }
        self.save(storage)?;
        Ok(true)
    }

    fn write_to(&self, storage: &mut dyn Storage, path: &Path) -> Result<(), StageError> {
        // Snapshot synchronously first; the byte write happens outside the
        // mutation path and cannot observe later edits.
        let bytes = self.dump().to_bytes()?;
        storage.write_bytes(path, &bytes)?;
        info!(path = path.display().to_string(), bytes = bytes.len(); "Saved document");
        Ok(())
    }

    fn reconstruct(&mut self, snapshot: &Envelope) {
        serialize::restore(snapshot, &mut self.registry)
            .expect("history snapshots are well-formed by construction");
        self.tags = snapshot.tags.clone();
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::Point,
        model::{Association, Entity},
        storage::MemStorage,
    };

    fn doc_with_node(text: &str) -> (Document, Uuid) {
        let mut document = Document::default();
        let uuid = document
            .registry_mut()
            .add(Entity::new_text_node(Point::default(), text))
            .unwrap();
        (document, uuid)
    }

    #[test]
    fn test_undo_redo_reconstructs_registry() {
        let (mut document, first) = doc_with_node("first");
        document.record_step();

        let second = document
            .registry_mut()
            .add(Entity::new_text_node(Point::default(), "second"))
            .unwrap();
        document
            .registry_mut()
            .add(Association::new_line_edge(first, second))
            .unwrap();
        document.record_step();

        assert!(document.undo());
        assert!(document.registry().contains(first));
        assert!(!document.registry().contains(second));
        assert_eq!(document.registry().associations().count(), 0);

        assert!(document.redo());
        assert!(document.registry().contains(second));
        assert_eq!(document.registry().associations().count(), 1);
    }

    #[test]
    fn test_undo_at_start_is_a_no_op() {
        let mut document = Document::default();
        assert!(!document.can_undo());
        assert!(!document.undo());
        assert!(!document.redo());
    }

    #[test]
    fn test_record_after_undo_discards_redo() {
        let (mut document, _) = doc_with_node("a");
        document.record_step();
        document
            .registry_mut()
            .add(Entity::new_text_node(Point::default(), "b"))
            .unwrap();
        document.record_step();

        document.undo();
        document.undo();
        document.record_step();

        assert!(!document.can_redo());
        assert!(!document.redo());
    }

    #[test]
    fn test_save_as_and_open_round_trip() {
        let mut storage = MemStorage::new();
        let (mut document, uuid) = doc_with_node("persisted");
        document.add_tag(uuid);

        document.save_as(&mut storage, "doc.json").unwrap();
        assert!(storage.exists(Path::new("doc.json")));
        // Save-as rebases history: nothing to undo.
        assert!(!document.can_undo());

        let reopened =
            Document::open(&storage, "doc.json", EngineConfig::default()).unwrap();
        assert!(reopened.registry().contains(uuid));
        assert_eq!(reopened.tags(), &[uuid]);
        assert_eq!(reopened.path(), Some(Path::new("doc.json")));
    }

    #[test]
    fn test_open_missing_file_fails_cleanly() {
        let storage = MemStorage::new();
        let err = Document::open(&storage, "absent.json", EngineConfig::default()).unwrap_err();
        assert!(matches!(err, StageError::Io(_)));
    }

    #[test]
    fn test_save_without_path_fails() {
        let mut storage = MemStorage::new();
        let (mut document, _) = doc_with_node("unsaved");
        let err = document.save(&mut storage).unwrap_err();
        assert!(matches!(err, StageError::MalformedDocument(_)));
    }

    #[test]
    fn test_tags_follow_registry_membership() {
        let (mut document, uuid) = doc_with_node("tagged");
        document.add_tag(uuid);
        document.add_tag(uuid); // idempotent
        document.add_tag(Uuid::new_v4()); // unknown uuid ignored

        assert_eq!(document.tags(), &[uuid]);

        document.remove_tag(uuid);
        assert!(document.tags().is_empty());
    }

    #[test]
    fn test_tags_travel_through_history() {
        let (mut document, uuid) = doc_with_node("tagged");
        document.record_step();
        document.add_tag(uuid);
        document.record_step();

        document.undo();
        assert!(document.tags().is_empty());
        document.redo();
        assert_eq!(document.tags(), &[uuid]);
    }

    #[test]
    fn test_hit_test_skips_hidden_entities() {
        use crate::geometry::Size;
        use crate::model::EntityKind;

        let mut document = Document::default();
        let section = document
            .registry_mut()
            .add(Entity::new_section(
                Point::new(0.0, 0.0),
                Size::new(100.0, 100.0),
                "s",
            ))
            .unwrap();
        let mut node = Entity::new_text_node(Point::new(10.0, 10.0), "n");
        if let EntityKind::TextNode { size, .. } = &mut node.kind {
            *size = Size::new(20.0, 20.0);
        }
        let node = document.registry_mut().add(node).unwrap();
        document.registry_mut().attach_child(section, node).unwrap();

        // The node sits on top of the section, so it wins the hit.
        assert_eq!(document.hit_test(Point::new(15.0, 15.0)), Some(node));

        document.sections().pack(section).unwrap();
        assert_eq!(document.hit_test(Point::new(15.0, 15.0)), Some(section));
    }

    #[test]
    fn test_self_loop_edge_geometry() {
        use crate::collision::CollisionShape;

        let (mut document, uuid) = doc_with_node("loop");
        let edge = document
            .registry_mut()
            .add(Association::new_line_edge(uuid, uuid))
            .unwrap();

        let geometry = document.edge_geometry(edge, None).unwrap();
        assert!(matches!(
            geometry.shapes()[0],
            CollisionShape::Circle { .. }
        ));
    }

    #[test]
    fn test_shifted_edge_geometry_passes_through_midpoint() {
        let mut document = Document::default();
        let a = document
            .registry_mut()
            .add(Entity::new_text_node(Point::new(0.0, 0.0), "a"))
            .unwrap();
        let b = document
            .registry_mut()
            .add(Entity::new_text_node(Point::new(100.0, 0.0), "b"))
            .unwrap();
        let edge = document
            .registry_mut()
            .add(Association::new_line_edge(a, b))
            .unwrap();

        let midpoint = Point::new(50.0, 30.0);
        let geometry = document.edge_geometry(edge, Some(midpoint)).unwrap();
        assert!(geometry.contains_point(midpoint));
    }

    #[test]
    fn test_autosave_gate_skips_until_due() {
        let mut gate = AutosaveGate::new(Duration::from_secs(3600));
        assert!(!gate.due());

        let mut instant_gate = AutosaveGate::new(Duration::ZERO);
        assert!(instant_gate.due());
    }

    #[test]
    fn test_maybe_autosave_without_path_is_a_no_op() {
        let mut storage = MemStorage::new();
        let (mut document, _) = doc_with_node("a");
        assert!(!document.maybe_autosave(&mut storage).unwrap());
    }
}
