//! Page slicing for dashboard tables.

use serde::Serialize;

/// Page buttons rendered at most.
const PAGE_WINDOW: usize = 5;

/// One page of a sequence. Indices are zero-based and `end_index` exclusive.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// One-based, always within `1..=max(total_pages, 1)`.
    pub current_page: usize,
    pub total_pages: usize,
    pub start_index: usize,
    pub end_index: usize,
    pub total_items: usize,
}

impl<T> Page<'_, T> {
    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Page buttons to render around the current page.
    pub fn window(&self) -> Vec<usize> {
        page_window(self.current_page, self.total_pages)
    }
}

/// `ceil(total_items / page_size)`; an empty sequence has zero pages.
pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    total_items.div_ceil(page_size.max(1))
}

/// Re-clamps `page` after the underlying length changed.
pub fn clamp_page(page: usize, total_items: usize, page_size: usize) -> usize {
    page.clamp(1, total_pages(total_items, page_size).max(1))
}

/// Slices `items` for `page`. A `page_size` of zero is treated as one.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let current_page = clamp_page(page, total_items, page_size);
    let start_index = ((current_page - 1) * page_size).min(total_items);
    let end_index = (start_index + page_size).min(total_items);

    Page {
        items: &items[start_index..end_index],
        current_page,
        total_pages: total_pages(total_items, page_size),
        start_index,
        end_index,
        total_items,
    }
}

/// Up to five page numbers centred on `current`, sliding at either end.
pub fn page_window(current: usize, total_pages: usize) -> Vec<usize> {
    if total_pages == 0 {
        return Vec::new();
    }
    if total_pages <= PAGE_WINDOW {
        return (1..=total_pages).collect();
    }

    let current = current.clamp(1, total_pages);
    let mut start = current.saturating_sub(PAGE_WINDOW / 2).max(1);
    let mut end = start + PAGE_WINDOW - 1;
    if end > total_pages {
        end = total_pages;
        start = total_pages + 1 - PAGE_WINDOW;
    }
    (start..=end).collect()
}
