//! Tabular views over the warehouse: row materialization, filtering,
//! sorting and paging.
//!
//! Every function here is a pure pass over a [`WarehouseSnapshot`]; nothing
//! is cached at this level.
//!
//! [`WarehouseSnapshot`]: crate::warehouse::WarehouseSnapshot

pub mod filter;
mod rows;
pub mod sort;

pub use filter::{apply_filters, filter_records, matches_all, EntityRecord, FieldSource};
pub use rows::{build_rows, infer_primary_entity, RowKey, RowView, TableView};
pub use sort::{compare_values, sort_rows};

use serde::Serialize;

/// One page of a sequence plus the totals needed to navigate it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number actually returned.
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// Slice out page `page` (1-based). Out-of-range pages clamp to the nearest
/// valid one; a `page_size` of 0 returns everything on one page.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let total_items = items.len();
    let page_size = if page_size == 0 {
        total_items.max(1)
    } else {
        page_size
    };
    let total_pages = total_items.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);

    let start = (page - 1) * page_size;
    let end = (start + page_size).min(total_items);

    Page {
        items: items[start.min(end)..end].to_vec(),
        page,
        page_size,
        total_items,
        total_pages,
    }
}
