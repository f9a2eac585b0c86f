//! Core library for comparing image-generation providers side by side.
//!
//! Module map:
//! - [`agents`] holds the provider clients, credentials and the orchestrator
//!   that fans a prompt out to every provider.
//! - [`api`] exposes the command surface the front end invokes.
//! - [`config`] reads startup settings from the environment.
//! - [`db`] initialises the SQLite database and applies migrations.
//! - [`errors`] keeps the generation error catalogue with stable codes.
//! - [`history`] persists prompts and their successful images.
//! - [`logging`] writes structured diagnostics to the event log table.
//! - [`mapping`] resolves prompts against the offline image table.
//! - [`media`] normalises and decodes image references.

pub mod agents;
pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod history;
pub mod logging;
pub mod mapping;
pub mod media;
