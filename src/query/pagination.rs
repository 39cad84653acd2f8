pub const DEFAULT_OFFSET: usize = 0;
pub const DEFAULT_LIMIT: usize = 100;
/// Upper bound of any page, whatever the caller asks for
pub const MAX_LIMIT: usize = 500;

/// Normalised offset and limit shared by every paged query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    offset: usize,
    limit: usize,
}

impl Pagination {
    pub fn new(offset: Option<usize>, limit: Option<usize>) -> Self {
        let offset = match offset {
            None | Some(0) => DEFAULT_OFFSET,
            Some(x) => x,
        };

        let limit = match limit {
            None | Some(0) => DEFAULT_LIMIT,
            Some(x) => x.min(MAX_LIMIT),
        };

        Self { offset, limit }
    }

    /// Everything up to the maximum page size
    pub fn max() -> Self {
        Self::new(None, Some(MAX_LIMIT))
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Applies the page to an ordered sequence.
    pub fn page<I: IntoIterator>(&self, items: I) -> impl Iterator<Item = I::Item> + use<I> {
        items.into_iter().skip(self.offset).take(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}
