use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tienda_core::{CategoryId, DomainError, DomainResult, Entity, Money, ProductId, SizeId};

/// Validate a URL-stable slug: lowercase alphanumerics and hyphens only.
pub(crate) fn validate_slug(slug: &str) -> DomainResult<()> {
    if slug.is_empty()
        || !slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(DomainError::validation(format!("invalid slug: {slug:?}")));
    }
    Ok(())
}

/// A garment size (S, M, L, 42, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub id: SizeId,
    pub name: String,
}

impl Size {
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("size name cannot be empty"));
        }
        Ok(Self {
            id: SizeId::new(),
            name,
        })
    }
}

impl Entity for Size {
    type Id = SizeId;

    fn id(&self) -> &SizeId {
        &self.id
    }
}

/// A catalog product.
///
/// Read-only to the reservation core; the live `price` is what cart
/// snapshots and checkout totals are computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    /// Unique, URL-stable.
    pub slug: String,
    pub description: String,
    pub price: Money,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        category_id: CategoryId,
        name: impl Into<String>,
        slug: impl Into<String>,
        price: Money,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        let slug = slug.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        validate_slug(&slug)?;
        if price < Money::ZERO {
            return Err(DomainError::validation("price cannot be negative"));
        }
        Ok(Self {
            id: ProductId::new(),
            category_id,
            name,
            slug,
            description: String::new(),
            price,
            is_active: true,
            created_at,
        })
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &ProductId {
        &self.id
    }
}

/// Price ordering for catalog browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSort {
    PriceAsc,
    PriceDesc,
}

impl PriceSort {
    /// Comparator over live product prices.
    pub fn compare(&self, a: &Product, b: &Product) -> core::cmp::Ordering {
        match self {
            PriceSort::PriceAsc => a.price.cmp(&b.price),
            PriceSort::PriceDesc => b.price.cmp(&a.price),
        }
    }
}

/// Browse query: optional category restriction + optional price ordering.
///
/// Only active products are ever listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category_slug: Option<String>,
    pub sort: Option<PriceSort>,
}

impl ProductFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn in_category(slug: impl Into<String>) -> Self {
        Self {
            category_slug: Some(slug.into()),
            sort: None,
        }
    }

    pub fn sorted(mut self, sort: PriceSort) -> Self {
        self.sort = Some(sort);
        self
    }
}
