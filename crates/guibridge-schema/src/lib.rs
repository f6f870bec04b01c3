//! Optional JSON Schema validation of command payloads.
//!
//! Schemas are keyed by command verb. A directory of `<verb>.schema.json`
//! files (JSON Schema 2020-12) is loaded once at startup and consulted by the
//! dispatcher before a command reaches its handler.

pub mod config;
pub mod error;
pub mod registry;
pub mod validator;

pub use config::{RegistryConfig, DEFAULT_MAX_SCHEMA_BYTES, DEFAULT_MAX_SCHEMA_FILES};
pub use error::{Result, SchemaError};
pub use registry::VerbSchemaRegistry;
