//! Per-session view state: the loaded items, the storage counter, and the
//! current search, filters and page.

use crate::error::Result;
use crate::model::{Category, Viewer, VisibleItem};
use crate::search::{filter_and_search, ItemFilters};

use super::Synchronizer;

/// What one viewer currently sees.
///
/// `storage_used` is always the value last read from the catalog; uploads
/// and deletions are reflected by calling [`refresh`](Self::refresh).
#[derive(Debug, Clone)]
pub struct ArchiveView {
    items: Vec<VisibleItem>,
    storage_used: u64,
    search: String,
    filters: ItemFilters,
    page: usize,
    page_size: usize,
}

impl ArchiveView {
    pub fn new(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            storage_used: 0,
            search: String::new(),
            filters: ItemFilters::default(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    /// Build a view over an already loaded list.
    pub fn with_items(items: Vec<VisibleItem>, storage_used: u64, page_size: usize) -> Self {
        let mut view = Self::new(page_size);
        view.items = items;
        view.storage_used = storage_used;
        view
    }

    /// Reload the items and the storage counter from the catalog.
    ///
    /// On failure the previous state is kept.
    pub fn refresh(&mut self, sync: &Synchronizer<'_>, viewer: &Viewer) -> Result<()> {
        let items = sync.load_visible_items(viewer)?;
        let storage_used = sync.storage_used(viewer)?;
        self.items = items;
        self.storage_used = storage_used;
        self.clamp_page();
        Ok(())
    }

    pub fn items(&self) -> &[VisibleItem] {
        &self.items
    }

    pub fn storage_used(&self) -> u64 {
        self.storage_used
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn filters(&self) -> &ItemFilters {
        &self.filters
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
        self.page = 1;
    }

    pub fn set_filters(&mut self, filters: ItemFilters) {
        self.filters = filters;
        self.page = 1;
    }

    /// Items matching the current search and filters, newest first.
    pub fn visible(&self) -> Vec<VisibleItem> {
        filter_and_search(&self.items, &self.search, &self.filters)
    }

    /// At least 1, so an empty list still has a page to show.
    pub fn page_count(&self) -> usize {
        self.visible().len().div_ceil(self.page_size).max(1)
    }

    /// Go to `page` (1-based), clamped to the available pages.
    pub fn set_page(&mut self, page: usize) {
        self.page = page;
        self.clamp_page();
    }

    pub fn page_items(&self) -> Vec<VisibleItem> {
        let start = (self.page - 1) * self.page_size;
        self.visible()
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .collect()
    }

    /// Distinct categories present in the loaded items, sorted.
    pub fn categories(&self) -> Vec<Category> {
        let mut categories: Vec<Category> = self.items.iter().map(|i| i.category).collect();
        categories.sort();
        categories.dedup();
        categories
    }

    /// The `limit` newest items, ignoring search and filters.
    pub fn recent(&self, limit: usize) -> &[VisibleItem] {
        &self.items[..limit.min(self.items.len())]
    }

    fn clamp_page(&mut self) {
        self.page = self.page.clamp(1, self.page_count());
    }
}
