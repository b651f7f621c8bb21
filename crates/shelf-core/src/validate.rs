//! Add-product form rules and identifier generation for locally created products.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Product;

/// A product being entered in the add form, before validation.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct DraftProduct {
    pub title: String,
    pub price: f64,
    pub category: String,
    pub stock: i64,
    pub thumbnail: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
}

/// Input fields of the add-product form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftField {
    Title,
    Price,
    Stock,
    Category,
    Brand,
    Thumbnail,
    Description,
}

impl DraftField {
    /// Every form field, in display order.
    pub const ALL: [DraftField; 7] = [
        Self::Title,
        Self::Price,
        Self::Stock,
        Self::Category,
        Self::Brand,
        Self::Thumbnail,
        Self::Description,
    ];

    /// Form label; required fields carry a trailing `*`.
    pub fn label(self) -> &'static str {
        match self {
            Self::Title => "Product Title *",
            Self::Price => "Price *",
            Self::Stock => "Stock *",
            Self::Category => "Category *",
            Self::Brand => "Brand",
            Self::Thumbnail => "Image URL *",
            Self::Description => "Description",
        }
    }

    /// Machine-readable field name.
    pub fn key(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Price => "price",
            Self::Stock => "stock",
            Self::Category => "category",
            Self::Brand => "brand",
            Self::Thumbnail => "thumbnail",
            Self::Description => "description",
        }
    }
}

/// Field-level messages for a rejected draft.
#[derive(Clone, Debug, Default, PartialEq, Eq, Error)]
#[error("invalid product draft: {}", summarize(.errors))]
pub struct ValidationErrors {
    errors: BTreeMap<DraftField, String>,
}

fn summarize(errors: &BTreeMap<DraftField, String>) -> String {
    errors
        .keys()
        .map(|field| field.key())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationErrors {
    fn add(&mut self, field: DraftField, message: &str) {
        self.errors.insert(field, message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Message reported for a field, if it failed.
    pub fn get(&self, field: DraftField) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    pub fn contains(&self, field: DraftField) -> bool {
        self.errors.contains_key(&field)
    }

    /// Drop the message for a field once the user edits it.
    pub fn clear(&mut self, field: DraftField) {
        self.errors.remove(&field);
    }

    /// Failing fields with their messages, in form order.
    pub fn iter(&self) -> impl Iterator<Item = (DraftField, &str)> {
        self.errors.iter().map(|(field, message)| (*field, message.as_str()))
    }
}

impl DraftProduct {
    /// Evaluate every rule and collect the failures. An empty result means the draft is valid.
    pub fn check(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::default();
        if self.title.trim().is_empty() {
            errors.add(DraftField::Title, "Title is required");
        }
        if self.price.is_nan() || self.price <= 0.0 {
            errors.add(DraftField::Price, "Price must be greater than 0");
        }
        if self.category.is_empty() {
            errors.add(DraftField::Category, "Category is required");
        }
        if self.stock < 0 {
            errors.add(DraftField::Stock, "Stock cannot be negative");
        }
        if self.thumbnail.trim().is_empty() {
            errors.add(DraftField::Thumbnail, "Image URL is required");
        }
        errors
    }
}

/// Monotonic identifier source for products created locally.
#[derive(Debug)]
pub struct ProductIds {
    next: AtomicU64,
}

impl Default for ProductIds {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl ProductIds {
    /// Start handing out identifiers from `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Move the counter past any identifier in `products`; never moves it backwards.
    pub fn observe(&self, products: &[Product]) {
        if let Some(max) = products.iter().map(|product| product.id).max() {
            self.next.fetch_max(max.saturating_add(1), Ordering::Relaxed);
        }
    }

    /// Take the next identifier.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Validate a draft and, when every rule passes, turn it into a full product.
///
/// New products start undiscounted and unrated, with the thumbnail as their only image.
pub fn validate(draft: &DraftProduct, ids: &ProductIds) -> Result<Product, ValidationErrors> {
    let errors = draft.check();
    if !errors.is_empty() {
        return Err(errors);
    }
    let Ok(stock) = u64::try_from(draft.stock) else {
        let mut errors = ValidationErrors::default();
        errors.add(DraftField::Stock, "Stock cannot be negative");
        return Err(errors);
    };

    Ok(Product {
        id: ids.next_id(),
        title: draft.title.clone(),
        description: draft.description.clone().unwrap_or_default(),
        price: draft.price,
        discount_percentage: 0.0,
        rating: 0.0,
        stock,
        brand: draft.brand.clone().unwrap_or_default(),
        category: draft.category.clone(),
        thumbnail: draft.thumbnail.clone(),
        images: vec![draft.thumbnail.clone()],
    })
}
