//! `famarchive`: a family archive tracker.
//!
//! This crate provides the core library for keeping a catalog of family
//! items (photos, letters, heirlooms) with attached files: merging the
//! items a user owns with those shared with them, uploading and enriching
//! attachments, keeping per-user storage accounting consistent, and
//! exporting the catalog.

pub mod backend;
pub mod config;
pub mod enrich;
pub mod error;
pub mod export;
pub mod model;
pub mod search;
pub mod sync;
