//! Personal task tracker.
//!
//! An HTTP API over per-user task lists: create, list with filters and
//! sorting, partial update, status toggle, delete, and summary statistics.
//! Every operation is scoped to the authenticated caller.

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod query;
pub mod server;
pub mod service;
pub mod stats;
pub mod store;
pub mod types;
pub mod validate;
