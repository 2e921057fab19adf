use serde::{Deserialize, Serialize};

use storefront_core::{
    impl_identity_eq, require_reference, DomainError, DomainResult, Entity, EntityId, UserId,
};

/// A product a user wants to buy later.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Wishlist {
    pub id: Option<EntityId>,
    pub user_id: Option<UserId>,
    pub product_id: Option<EntityId>,
}

impl Wishlist {
    pub fn new(user_id: UserId, product_id: EntityId) -> Self {
        Self {
            id: None,
            user_id: Some(user_id),
            product_id: Some(product_id),
        }
    }
}

impl Entity for Wishlist {
    const KIND: &'static str = "wishlist";
    const RESOURCE: &'static str = "wishlists";

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn validate(&self) -> DomainResult<()> {
        if self.user_id.is_none() {
            return Err(DomainError::validation("user_id is required"));
        }
        require_reference("product_id", self.product_id)?;
        Ok(())
    }

    fn owner(&self) -> Option<UserId> {
        self.user_id
    }
}

impl_identity_eq!(Wishlist);
