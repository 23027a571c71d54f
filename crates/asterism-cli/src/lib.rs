//! CLI logic for the Asterism document tool.
//!
//! This module contains the core CLI logic: inspecting, migrating and
//! extracting stage documents through the engine's storage boundary.

pub mod error_adapter;

mod args;
mod config;

pub use args::{Args, Command};

use std::path::Path;

use log::info;

use asterism_core::{
    Document, StageError,
    serialize,
    storage::{FsStorage, Storage},
};

/// Run the Asterism CLI application.
///
/// # Arguments
///
/// * `args` - Command-line arguments
///
/// # Errors
///
/// Returns `StageError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Malformed or unsupported documents
pub fn run(args: &Args) -> Result<(), StageError> {
    let engine_config = config::load_config(args.config.as_ref())?;

    match &args.command {
        Command::Info { input } => {
            let document = Document::open(&FsStorage, input, engine_config)?;
            let registry = document.registry();

            println!("document:     {input}");
            println!("version:      {}", serialize::CURRENT_VERSION);
            println!("entities:     {}", registry.entities().count());
            println!("associations: {}", registry.associations().count());
            println!("tags:         {}", document.tags().len());
        }
        Command::Migrate { input, output } => {
            info!(input_path = input.as_str(), output_path = output.as_str(); "Migrating document");

            let mut storage = FsStorage;
            let raw = storage.read_bytes(Path::new(input))?;
            let envelope = serialize::load(&raw)?;
            storage.write_bytes(Path::new(output), &envelope.to_bytes()?)?;

            info!(output_file = output.as_str(); "Document migrated successfully");
        }
        Command::Extract {
            input,
            uuids,
            output,
        } => {
            info!(
                input_path = input.as_str(),
                selected = uuids.len();
                "Extracting selection"
            );

            let document = Document::open(&FsStorage, input, engine_config)?;
            let envelope = document.dump_selected(uuids);

            let mut storage = FsStorage;
            storage.write_bytes(Path::new(output), &envelope.to_bytes()?)?;

            info!(
                output_file = output.as_str(),
                entities = envelope.entities.len(),
                associations = envelope.associations.len();
                "Selection extracted successfully"
            );
        }
    }

    Ok(())
}
