/// Fixed-size pages over a sorted result list. Pages are zero-based.
#[derive(Debug, Clone, PartialEq)]
pub struct Pages<T> {
    items: Vec<T>,
    per_page: usize,
}

impl<T> Pages<T> {
    pub fn new(items: Vec<T>, per_page: usize) -> Self {
        Self {
            items,
            per_page: per_page.max(1),
        }
    }

    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    /// Always at least one, so an empty list still has a (blank) first page.
    pub fn total_pages(&self) -> usize {
        self.items.len().div_ceil(self.per_page).max(1)
    }

    /// Clamp a requested page to the valid range.
    pub fn clamp(&self, page: usize) -> usize {
        page.min(self.total_pages() - 1)
    }

    /// Items of `page`, or `None` past the last page.
    pub fn page(&self, page: usize) -> Option<&[T]> {
        if page >= self.total_pages() {
            return None;
        }
        let start = page * self.per_page;
        let end = (start + self.per_page).min(self.items.len());
        Some(&self.items[start.min(end)..end])
    }

    /// e.g. `Page 2/3 · results 6-10 of 12`
    pub fn label(&self, page: usize) -> String {
        let page = self.clamp(page);
        let total = self.items.len();
        if total == 0 {
            return "Page 1/1 · no results".to_string();
        }
        let first = page * self.per_page + 1;
        let last = ((page + 1) * self.per_page).min(total);
        format!(
            "Page {}/{} · results {first}-{last} of {total}",
            page + 1,
            self.total_pages()
        )
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}
