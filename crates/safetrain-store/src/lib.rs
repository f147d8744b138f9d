//! safetrain-store: Record-store adapters.
//!
//! Implements the `Repository` trait over the Airtable REST API and wires up
//! configuration for either that store or a local JSON fixture.

pub mod airtable;
pub mod config;

pub use airtable::{AirtableStore, TableNames};
pub use config::{create_backend, load_config, load_config_from, Backend, SafetrainConfig, StoreConfig};
