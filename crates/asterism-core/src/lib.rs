//! Asterism Stage Document Engine
//!
//! This crate provides the in-memory document model for Asterism
//! node-graph diagrams. It includes:
//!
//! - **Model**: tagged entity and association sum types ([`model`] module)
//! - **Registry**: the authoritative uuid-indexed object store ([`registry`] module)
//! - **Collision**: spatial hit-testing and boundary intersection ([`collision`] module)
//! - **Graph**: pure algorithms over the association edges ([`graph`] module)
//! - **Sections**: the nested containment hierarchy ([`section`] module)
//! - **Serialization**: the versioned envelope and its migration chain ([`serialize`] module)
//! - **History**: bounded snapshot undo/redo ([`history`] module)
//! - **Document**: the explicit per-document context ([`document`] module)

pub mod collision;
pub mod color;
pub mod config;
pub mod document;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod history;
pub mod model;
pub mod registry;
pub mod section;
pub mod serialize;
pub mod storage;

pub use config::EngineConfig;
pub use document::Document;
pub use error::StageError;
pub use registry::Registry;
