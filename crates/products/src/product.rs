use serde::{Deserialize, Serialize};

use storefront_core::{impl_identity_eq, Entity, EntityId};

/// Catalog product.
///
/// Category, author, company and brand are opaque numeric references into
/// catalogs managed elsewhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    pub id: Option<EntityId>,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub company_id: Option<i64>,
    pub brand_id: Option<i64>,
}

impl Product {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn with_company(mut self, company_id: i64) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn with_brand(mut self, brand_id: i64) -> Self {
        self.brand_id = Some(brand_id);
        self
    }
}

impl Entity for Product {
    const KIND: &'static str = "product";
    const RESOURCE: &'static str = "products";

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }
}

impl_identity_eq!(Product);
