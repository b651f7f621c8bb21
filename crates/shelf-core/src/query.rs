//! Filtering, sorting, and category derivation over an in-memory product list.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::Product;

/// Sentinel category value that disables category filtering.
pub const ALL_CATEGORIES: &str = "all";

/// Category selection: everything, or one exact label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    /// No category restriction.
    #[default]
    All,
    /// Only products whose category equals this label exactly.
    Only(String),
}

impl CategoryFilter {
    /// Parse a raw selection, treating the `all` sentinel as no restriction.
    pub fn parse(value: impl Into<String>) -> Self {
        let value = value.into();
        if value == ALL_CATEGORIES {
            Self::All
        } else {
            Self::Only(value)
        }
    }

    /// Check whether a category label passes the filter.
    pub fn matches(&self, category: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(label) => label == category,
        }
    }

    /// Raw selection value, `all` for the sentinel.
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL_CATEGORIES,
            Self::Only(label) => label,
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field used to order the displayed collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Title,
    Price,
    Stock,
    Category,
}

impl SortField {
    pub fn label(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Price => "Price",
            Self::Stock => "Stock",
            Self::Category => "Category",
        }
    }

    /// The following field in menu order, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Self::Title => Self::Price,
            Self::Price => Self::Stock,
            Self::Stock => Self::Category,
            Self::Category => Self::Title,
        }
    }

    fn compare(self, a: &Product, b: &Product) -> Ordering {
        match self {
            Self::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            Self::Price => a.price.total_cmp(&b.price),
            Self::Stock => a.stock.cmp(&b.stock),
            Self::Category => a.category.to_lowercase().cmp(&b.category.to_lowercase()),
        }
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn label(self) -> &'static str {
        match self {
            Self::Ascending => "Ascending",
            Self::Descending => "Descending",
        }
    }

    /// Flip the direction.
    pub fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    fn orient(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// The current search, category, and sort selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuerySpec {
    /// Case-insensitive substring matched against titles. Empty matches everything.
    pub search_text: String,
    /// Category restriction.
    pub category: CategoryFilter,
    /// Ordering key.
    pub sort_field: SortField,
    /// Ordering direction.
    pub sort_order: SortOrder,
}

impl QuerySpec {
    /// Check both filter predicates against a product.
    pub fn matches(&self, product: &Product) -> bool {
        matches_search(product, &self.search_text.to_lowercase())
            && self.category.matches(&product.category)
    }

    /// Compare two products under the selected field and direction.
    pub fn compare(&self, a: &Product, b: &Product) -> Ordering {
        self.sort_order.orient(self.sort_field.compare(a, b))
    }
}

fn matches_search(product: &Product, needle: &str) -> bool {
    needle.is_empty() || product.title.to_lowercase().contains(needle)
}

/// Filter and order a product list. The input is left untouched.
///
/// Products with equal sort keys keep the relative order they had in `products`,
/// in both directions.
pub fn apply(products: &[Product], spec: &QuerySpec) -> Vec<Product> {
    let needle = spec.search_text.to_lowercase();
    let mut visible: Vec<Product> = products
        .iter()
        .filter(|product| {
            matches_search(product, &needle) && spec.category.matches(&product.category)
        })
        .cloned()
        .collect();
    // `sort_by` is stable; ties keep their filtered order.
    visible.sort_by(|a, b| spec.compare(a, b));
    visible
}

/// Distinct category labels present in `products`, sorted ascending.
pub fn categories_of(products: &[Product]) -> Vec<String> {
    products
        .iter()
        .map(|product| product.category.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
