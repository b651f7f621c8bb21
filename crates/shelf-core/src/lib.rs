//! Core domain entities, rules, and pure catalog operations for Shelfview.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod query;
mod tasks;
mod validate;
mod view;

pub use query::{
    apply, categories_of, CategoryFilter, QuerySpec, SortField, SortOrder, ALL_CATEGORIES,
};
pub use tasks::{
    describe_due, filter_tasks, recount_projects, Priority, PriorityFilter, Project, ProjectFilter,
    StatusFilter, Task, TaskFilter,
};
pub use validate::{validate, DraftField, DraftProduct, ProductIds, ValidationErrors};
pub use view::{CatalogStats, CatalogView};

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors returned by core validation and domain rules.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Returned when a validation rule is violated.
    #[error("validation error: {0}")]
    Validation(String),
    /// Returned when storage or configuration operations fail.
    #[error("storage error: {0}")]
    Storage(String),
}

/// A catalog item as served by the remote source or accepted from the add form.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier within the authoritative collection.
    pub id: u64,
    /// Display title.
    pub title: String,
    /// Free-form description, possibly empty.
    #[serde(default)]
    pub description: String,
    /// Unit price.
    pub price: f64,
    /// Discount applied by the source, in percent.
    #[serde(default)]
    pub discount_percentage: f64,
    /// Average rating.
    #[serde(default)]
    pub rating: f64,
    /// Units in stock.
    pub stock: u64,
    /// Brand name, possibly empty.
    #[serde(default)]
    pub brand: String,
    /// Category label.
    pub category: String,
    /// Thumbnail URL.
    #[serde(default)]
    pub thumbnail: String,
    /// Gallery image URLs.
    #[serde(default)]
    pub images: Vec<String>,
}

/// Availability bucket derived from a product's stock level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockStatus {
    /// No units left.
    OutOfStock,
    /// Fewer than ten units left.
    LowStock,
    /// Ten or more units.
    InStock,
}

impl StockStatus {
    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::OutOfStock => "Out of Stock",
            Self::LowStock => "Low Stock",
            Self::InStock => "In Stock",
        }
    }
}

impl Product {
    /// Classify the current stock level.
    pub fn stock_status(&self) -> StockStatus {
        match self.stock {
            0 => StockStatus::OutOfStock,
            1..=9 => StockStatus::LowStock,
            _ => StockStatus::InStock,
        }
    }

    /// Badge text such as `-12%` when the product carries a discount.
    pub fn discount_badge(&self) -> Option<String> {
        if self.discount_percentage > 0.0 {
            Some(format!("-{:.0}%", self.discount_percentage.round()))
        } else {
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::Product;

    pub fn product(id: u64, title: &str, category: &str, price: f64, stock: u64) -> Product {
        Product {
            id,
            title: title.into(),
            description: String::new(),
            price,
            discount_percentage: 0.0,
            rating: 0.0,
            stock,
            brand: String::new(),
            category: category.into(),
            thumbnail: format!("https://cdn.example.com/{id}.png"),
            images: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::product;
    use super::*;

    #[test]
    fn stock_status_buckets() {
        assert_eq!(product(1, "a", "x", 1.0, 0).stock_status(), StockStatus::OutOfStock);
        assert_eq!(product(1, "a", "x", 1.0, 9).stock_status(), StockStatus::LowStock);
        assert_eq!(product(1, "a", "x", 1.0, 10).stock_status(), StockStatus::InStock);
    }

    #[test]
    fn discount_badge_rounds() {
        let mut item = product(1, "a", "x", 1.0, 1);
        assert_eq!(item.discount_badge(), None);
        item.discount_percentage = 12.6;
        assert_eq!(item.discount_badge().as_deref(), Some("-13%"));
    }

    #[test]
    fn product_decodes_remote_shape_with_missing_optionals() {
        let json = r#"{
            "id": 7,
            "title": "Apple",
            "price": 1.99,
            "discountPercentage": 4.5,
            "rating": 4.2,
            "stock": 3,
            "category": "groceries",
            "thumbnail": "https://cdn.example.com/apple.png",
            "tags": ["fruits"]
        }"#;
        let decoded: Product = serde_json::from_str(json).unwrap();
        assert_eq!(decoded.id, 7);
        assert_eq!(decoded.brand, "");
        assert_eq!(decoded.description, "");
        assert!(decoded.images.is_empty());
        assert!((decoded.discount_percentage - 4.5).abs() < f64::EPSILON);
    }
}
