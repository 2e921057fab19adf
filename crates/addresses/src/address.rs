use serde::{Deserialize, Serialize};

use storefront_core::{impl_identity_eq, Entity, EntityId};

/// Billing address attached to an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingAddress {
    pub id: Option<EntityId>,
    pub phone_number: Option<String>,
    pub alternative_phone_number: Option<String>,
}

/// Shipping address attached to an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingAddress {
    pub id: Option<EntityId>,
    pub phone_number: Option<String>,
    pub alternative_phone_number: Option<String>,
}

impl BillingAddress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    pub fn with_alternative_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.alternative_phone_number = Some(phone_number.into());
        self
    }
}

impl ShippingAddress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    pub fn with_alternative_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.alternative_phone_number = Some(phone_number.into());
        self
    }
}

impl Entity for BillingAddress {
    const KIND: &'static str = "billingAddress";
    const RESOURCE: &'static str = "billing-addresses";

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }
}

impl Entity for ShippingAddress {
    const KIND: &'static str = "shippingAddress";
    const RESOURCE: &'static str = "shipping-addresses";

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }
}

impl_identity_eq!(BillingAddress, ShippingAddress);
