//! aec - describe cloud compute resources from the command line
//!
//! The [`resource`] module holds the query engine: identifier
//! classification, paginated fetching, state filtering, cross-resource joins,
//! column projection and sorting. [`commands`] builds the per-family describe
//! operations on top of it and [`provider`] supplies the HTTP transport.

pub mod commands;
pub mod config;
pub mod output;
pub mod provider;
pub mod resource;
pub mod testing;

/// Version injected at compile time via AEC_VERSION env var (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("AEC_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
