//! Command-line argument definitions for the Asterism CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments select the subcommand to run and control
//! configuration file selection and logging verbosity.

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Command-line arguments for the Asterism document tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect a document: schema version, object counts, tags
    Info {
        /// Path to the input document
        input: String,
    },

    /// Migrate a legacy document to the current schema version
    Migrate {
        /// Path to the input document
        input: String,

        /// Path to the migrated output document
        #[arg(short, long, default_value = "out.json")]
        output: String,
    },

    /// Extract entities (plus the subtrees of selected sections) into a
    /// new document
    Extract {
        /// Path to the input document
        input: String,

        /// Entity uuids to extract
        #[arg(long, value_delimiter = ',', required = true)]
        uuids: Vec<Uuid>,

        /// Path to the extracted output document
        #[arg(short, long, default_value = "out.json")]
        output: String,
    },
}
