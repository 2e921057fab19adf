use serde::{Deserialize, Serialize};

use storefront_core::{impl_identity_eq, require_reference, DomainResult, Entity, EntityId, UserId};

/// A placed order.
///
/// Each shipping and billing address belongs to at most one order; the
/// record store enforces that uniqueness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub id: Option<EntityId>,
    pub shipping_address_id: Option<EntityId>,
    pub billing_address_id: Option<EntityId>,
    pub user_id: Option<UserId>,
}

/// A product line of an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderProduct {
    pub id: Option<EntityId>,
    pub order_id: Option<EntityId>,
    pub product_id: Option<EntityId>,
}

impl Order {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn with_shipping_address(mut self, address_id: EntityId) -> Self {
        self.shipping_address_id = Some(address_id);
        self
    }

    pub fn with_billing_address(mut self, address_id: EntityId) -> Self {
        self.billing_address_id = Some(address_id);
        self
    }
}

impl OrderProduct {
    pub fn new(order_id: EntityId, product_id: EntityId) -> Self {
        Self {
            id: None,
            order_id: Some(order_id),
            product_id: Some(product_id),
        }
    }
}

impl Entity for Order {
    const KIND: &'static str = "order";
    const RESOURCE: &'static str = "orders";

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn owner(&self) -> Option<UserId> {
        self.user_id
    }

    fn unique_references(&self) -> Vec<(&'static str, EntityId)> {
        [
            ("shipping_address_id", self.shipping_address_id),
            ("billing_address_id", self.billing_address_id),
        ]
        .into_iter()
        .filter_map(|(field, id)| id.map(|id| (field, id)))
        .collect()
    }
}

impl Entity for OrderProduct {
    const KIND: &'static str = "orderProduct";
    const RESOURCE: &'static str = "order-products";

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn validate(&self) -> DomainResult<()> {
        require_reference("order_id", self.order_id)?;
        require_reference("product_id", self.product_id)?;
        Ok(())
    }
}

impl_identity_eq!(Order, OrderProduct);
