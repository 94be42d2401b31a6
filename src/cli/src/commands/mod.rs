//! CLI subcommands.

pub mod entity;
pub mod ingest;
pub mod schema;
