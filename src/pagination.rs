use serde::{Deserialize, Serialize};

/// `?page=N` query parameter.
///
/// Kept as a raw string so that junk like `?page=abc` falls back to the
/// first page instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// One page of items plus what a client needs to render page links.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub per_page: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            per_page: self.per_page,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// Fixed-size paginator over an already ordered list.
pub struct Paginator<T> {
    items: Vec<T>,
    per_page: usize,
}

impl<T> Paginator<T> {
    pub fn new(items: Vec<T>, per_page: usize) -> Self {
        Self {
            items,
            per_page: per_page.max(1),
        }
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// An empty list still has one (empty) page.
    pub fn num_pages(&self) -> usize {
        self.count().div_ceil(self.per_page).max(1)
    }

    /// Resolves a raw page number leniently: missing or non-numeric input
    /// means page 1, anything out of range (including 0 and negatives)
    /// means the last page.
    pub fn resolve(&self, raw: Option<&str>) -> usize {
        let Some(number) = raw.and_then(|raw| raw.trim().parse::<i64>().ok()) else {
            return 1;
        };
        let last = self.num_pages();
        match usize::try_from(number) {
            Ok(number) if (1..=last).contains(&number) => number,
            _ => last,
        }
    }

    pub fn get_page(self, raw: Option<&str>) -> Page<T> {
        let number = self.resolve(raw);
        let num_pages = self.num_pages();
        let count = self.count();
        let per_page = self.per_page;

        let items = self
            .items
            .into_iter()
            .skip((number - 1) * per_page)
            .take(per_page)
            .collect();

        Page {
            items,
            number,
            num_pages,
            count,
            per_page,
            has_next: number < num_pages,
            has_previous: number > 1,
        }
    }
}
