//! Search and filtering over the visible item list.
//!
//! Everything here is pure: it works on the merged list already held by
//! the caller and never talks to the catalog.

pub mod filter;
pub mod html;

pub use filter::{filter_and_search, ItemFilters, OwnerFilter};
pub use html::strip_html;
