//! Read-side catalog queries.

use tienda_catalog::{Category, Product, ProductFilter, Size};
use tienda_core::DomainError;
use tienda_inventory::StockUnit;

use crate::store::{Store, StoreError};

/// A purchasable size option for a product, paired with how much of it is
/// left on the shelf.
#[derive(Debug, Clone)]
pub struct SizeOption {
    pub size: Size,
    pub unit: StockUnit,
}

/// Storefront catalog reads: listings, detail pages, size availability.
#[derive(Debug, Clone)]
pub struct CatalogBrowse<S> {
    store: S,
}

impl<S: Store> CatalogBrowse<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Active products, optionally narrowed to a category and sorted by
    /// price. An unknown category slug yields an empty listing.
    pub async fn products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        self.store.products(filter).await
    }

    /// Detail-page lookup. Inactive products are hidden, not shown as
    /// unavailable.
    pub async fn product_by_slug(&self, slug: &str) -> Result<Product, StoreError> {
        let product = self
            .store
            .product_by_slug(slug)
            .await?
            .filter(|p| p.is_active)
            .ok_or(DomainError::NotFound)?;
        Ok(product)
    }

    pub async fn categories(&self) -> Result<Vec<Category>, StoreError> {
        self.store.categories().await
    }

    /// Size options for a product's detail page. Sold-out sizes are kept in
    /// the list so the page can render them disabled.
    pub async fn size_options(&self, slug: &str) -> Result<Vec<SizeOption>, StoreError> {
        let product = self.product_by_slug(slug).await?;
        let units = self.store.stock_units_for_product(product.id).await?;

        let mut options = Vec::with_capacity(units.len());
        for unit in units {
            let size = self
                .store
                .size(unit.size_id)
                .await?
                .ok_or(DomainError::NotFound)?;
            options.push(SizeOption { size, unit });
        }
        options.sort_by(|a, b| a.size.name.cmp(&b.size.name));
        Ok(options)
    }
}
