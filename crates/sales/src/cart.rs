use serde::{Deserialize, Serialize};

use storefront_core::{
    impl_identity_eq, require_reference, DomainResult, Entity, EntityId, UserId,
};

/// A user's shopping cart.
///
/// `status` is a numeric code owned by the storefront client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Cart {
    pub id: Option<EntityId>,
    pub status: Option<i32>,
    pub user_id: Option<UserId>,
}

/// A product placed in a cart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CartProduct {
    pub id: Option<EntityId>,
    pub cart_id: Option<EntityId>,
    pub product_id: Option<EntityId>,
}

impl Cart {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            id: None,
            status: None,
            user_id: Some(user_id),
        }
    }

    pub fn with_status(mut self, status: i32) -> Self {
        self.status = Some(status);
        self
    }
}

impl CartProduct {
    pub fn new(cart_id: EntityId, product_id: EntityId) -> Self {
        Self {
            id: None,
            cart_id: Some(cart_id),
            product_id: Some(product_id),
        }
    }
}

impl Entity for Cart {
    const KIND: &'static str = "cart";
    const RESOURCE: &'static str = "carts";

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

impl Entity for CartProduct {
    const KIND: &'static str = "cartProduct";
    const RESOURCE: &'static str = "cart-products";

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn validate(&self) -> DomainResult<()> {
        require_reference("cart_id", self.cart_id)?;
        require_reference("product_id", self.product_id)?;
        Ok(())
    }
}

impl_identity_eq!(Cart, CartProduct);
