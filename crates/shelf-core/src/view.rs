//! Derived state for the product screen, recomputed whenever one of its inputs changes.

use crate::query::{apply, categories_of, CategoryFilter, QuerySpec, SortField, SortOrder};
use crate::{CoreError, CoreResult, Product};

/// Headline figures for the product screen.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CatalogStats {
    /// Products in the authoritative collection.
    pub total_products: usize,
    /// Products that pass the current query.
    pub visible_products: usize,
    /// Distinct categories in the authoritative collection.
    pub category_count: usize,
    /// Sum of every product's price.
    pub total_value: f64,
}

/// The authoritative collection plus everything derived from it.
///
/// Every mutator recomputes categories first and the visible list second, so the
/// category list always reflects the collection the visible list was built from.
#[derive(Clone, Debug, Default)]
pub struct CatalogView {
    products: Vec<Product>,
    spec: QuerySpec,
    categories: Vec<String>,
    visible: Vec<Product>,
}

impl CatalogView {
    pub fn new(products: Vec<Product>) -> Self {
        let mut view = Self {
            products,
            ..Self::default()
        };
        view.refresh();
        view
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Filtered and sorted products for display.
    pub fn visible(&self) -> &[Product] {
        &self.visible
    }

    /// Swap in a freshly fetched collection.
    pub fn replace_products(&mut self, products: Vec<Product>) {
        self.products = products;
        self.refresh();
    }

    /// Put a newly accepted product at the front of the collection.
    pub fn prepend(&mut self, product: Product) -> CoreResult<()> {
        if self.products.iter().any(|existing| existing.id == product.id) {
            return Err(CoreError::Validation(format!(
                "product id {} already exists",
                product.id
            )));
        }
        self.products.insert(0, product);
        self.refresh();
        Ok(())
    }

    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.update(|spec| spec.search_text = text.into());
    }

    pub fn set_category(&mut self, category: CategoryFilter) {
        self.update(|spec| spec.category = category);
    }

    pub fn set_sort(&mut self, field: SortField, order: SortOrder) {
        self.update(|spec| {
            spec.sort_field = field;
            spec.sort_order = order;
        });
    }

    /// Apply an arbitrary change to the query and recompute the visible list.
    pub fn update(&mut self, change: impl FnOnce(&mut QuerySpec)) {
        change(&mut self.spec);
        self.visible = apply(&self.products, &self.spec);
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            total_products: self.products.len(),
            visible_products: self.visible.len(),
            category_count: self.categories.len(),
            total_value: self.products.iter().map(|product| product.price).sum(),
        }
    }

    fn refresh(&mut self) {
        self.categories = categories_of(&self.products);
        self.visible = apply(&self.products, &self.spec);
    }
}
