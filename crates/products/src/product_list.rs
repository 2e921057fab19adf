use serde::{Deserialize, Serialize};

use storefront_core::{
    impl_identity_eq, require_reference, DomainResult, Entity, EntityId, UserId,
};

/// A named collection of products curated by a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductList {
    pub id: Option<EntityId>,
    pub user_id: Option<UserId>,
}

/// Membership of a product in a product list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductListProduct {
    pub id: Option<EntityId>,
    pub product_list_id: Option<EntityId>,
    pub product_id: Option<EntityId>,
}

impl ProductList {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            id: None,
            user_id: Some(user_id),
        }
    }
}

impl ProductListProduct {
    pub fn new(product_list_id: EntityId, product_id: EntityId) -> Self {
        Self {
            id: None,
            product_list_id: Some(product_list_id),
            product_id: Some(product_id),
        }
    }
}

impl Entity for ProductList {
    const KIND: &'static str = "productList";
    const RESOURCE: &'static str = "product-lists";

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn owner(&self) -> Option<UserId> {
        self.user_id
    }
}

impl Entity for ProductListProduct {
    const KIND: &'static str = "productListProduct";
    const RESOURCE: &'static str = "product-list-products";

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn validate(&self) -> DomainResult<()> {
        require_reference("product_list_id", self.product_list_id)?;
        require_reference("product_id", self.product_id)?;
        Ok(())
    }
}

impl_identity_eq!(ProductList, ProductListProduct);
