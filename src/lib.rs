//! Catalog loader library - shared modules for the loader and report binaries.

pub mod cache;
pub mod error;
pub mod guard;
pub mod loader;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod report;
pub mod resolver;
pub mod safety;
pub mod schema;
pub mod source;
pub mod store;
