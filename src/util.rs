//! Small utility helpers used across modules.

use serde::Serialize;

/// Largest page a listing endpoint will return.
pub const MAX_PER_PAGE: usize = 50;

/// One page of a newest-first (or chronological) listing.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub pagination: Pagination,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct Pagination {
  pub page: usize,
  pub per_page: usize,
  pub total: usize,
  pub pages: usize,
  pub has_next: bool,
  pub has_prev: bool,
}

impl Pagination {
  pub fn new(page: usize, per_page: usize, total: usize) -> Self {
    let pages = if per_page == 0 { 0 } else { total.div_ceil(per_page) };
    Self { page, per_page, total, pages, has_next: page < pages, has_prev: page > 1 }
  }
}

/// Clamp user-supplied paging to `page >= 1` and `1 <= per_page <= MAX_PER_PAGE`.
/// Returns (page, per_page, offset).
pub fn page_window(page: Option<usize>, per_page: Option<usize>) -> (usize, usize, usize) {
  let page = page.unwrap_or(1).max(1);
  let per_page = per_page.unwrap_or(20).clamp(1, MAX_PER_PAGE);
  (page, per_page, (page - 1).saturating_mul(per_page))
}

/// Round to two decimals (confidence values).
pub fn round2(v: f64) -> f64 {
  (v * 100.0).round() / 100.0
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with full chat messages.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}
