use serde::{Deserialize, Serialize};

/// A conjunction of row predicates, or the explicit empty set.
///
/// `Query::none()` never matches anything and is never sent to the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query<P> {
    predicates: Vec<P>,
    none: bool,
}

impl<P> Query<P> {
    pub fn all() -> Self {
        Self {
            predicates: Vec::new(),
            none: false,
        }
    }

    pub fn none() -> Self {
        Self {
            predicates: Vec::new(),
            none: true,
        }
    }

    pub fn and(mut self, predicate: P) -> Self {
        if !self.none {
            self.predicates.push(predicate);
        }
        self
    }

    pub fn and_all(self, predicates: impl IntoIterator<Item = P>) -> Self {
        predicates.into_iter().fold(self, Query::and)
    }

    pub fn is_none(&self) -> bool {
        self.none
    }

    pub fn predicates(&self) -> &[P] {
        &self.predicates
    }
}

pub const MAX_PAGE_SIZE: i64 = 100;

/// `?limit=&offset=` on list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub fn window(self, default_limit: i64) -> Window {
        Window {
            limit: self.limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
            offset: self.offset.unwrap_or(0).max(0),
        }
    }
}

/// List envelope.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            count: 0,
            results: Vec::new(),
        }
    }
}
