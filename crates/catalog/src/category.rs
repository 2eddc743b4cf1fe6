use serde::{Deserialize, Serialize};

use tienda_core::{CategoryId, DomainError, DomainResult, Entity};

use crate::product::validate_slug;

/// A catalog category (URL-addressable via its slug).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Unique, URL-stable.
    pub slug: String,
}

impl Category {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        let slug = slug.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("category name cannot be empty"));
        }
        validate_slug(&slug)?;
        Ok(Self {
            id: CategoryId::new(),
            name,
            slug,
        })
    }
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &CategoryId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_name() {
        let err = Category::new("  ", "remeras").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_bad_slug() {
        let err = Category::new("Remeras", "Remeras!").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
