//! Entity trait: store-assigned identity + per-kind configuration.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{EntityId, UserId};

/// Contract implemented by every entity kind managed by the backend.
///
/// An entity is a plain record whose identity is absent until the record store
/// persists it for the first time. The associated constants and hooks are the
/// only per-kind configuration the generic synchronizer needs. The `Default`
/// record serializes every field the kind has; search indexes derive their
/// field list from it.
pub trait Entity:
    Clone + core::fmt::Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Entity-name label used in logs, error bodies and alert headers
    /// (e.g. `shippingAddress`).
    const KIND: &'static str;

    /// Plural, kebab-case resource path segment (e.g. `shipping-addresses`).
    const RESOURCE: &'static str;

    /// Returns the identity, or `None` while the record is unpersisted.
    fn id(&self) -> Option<EntityId>;

    /// Assign the store-generated identity.
    ///
    /// Only record store adapters call this, and only for records without one.
    fn assign_id(&mut self, id: EntityId);

    /// Entity-specific checks run before any store is touched.
    fn validate(&self) -> DomainResult<()> {
        Ok(())
    }

    /// User that owns this record, for kinds scoped to a user.
    fn owner(&self) -> Option<UserId> {
        None
    }

    /// Reference fields whose values must be unique across all records of
    /// this kind, as `(field, value)` pairs. Enforced by the record store.
    fn unique_references(&self) -> Vec<(&'static str, EntityId)> {
        Vec::new()
    }
}

/// Identity equality.
///
/// Two records are the same entity only if both carry an identity and the
/// identities match. An unpersisted record is never equal to anything.
pub fn same_identity<E: Entity>(a: &E, b: &E) -> bool {
    matches!((a.id(), b.id()), (Some(x), Some(y)) if x == y)
}

/// Require a reference to be present, returning it.
///
/// Only presence is checked; whether the referenced record exists is the
/// record store's business.
pub fn require_reference(field: &str, value: Option<EntityId>) -> DomainResult<EntityId> {
    value.ok_or_else(|| DomainError::validation(format!("{field} is required")))
}

/// Implement `PartialEq` for an entity type in terms of [`same_identity`].
///
/// `Eq` is deliberately not implemented: an unpersisted record is not equal
/// to itself.
#[macro_export]
macro_rules! impl_identity_eq {
    ($($t:ty),+ $(,)?) => {
        $(
            impl PartialEq for $t {
                fn eq(&self, other: &Self) -> bool {
                    $crate::entity::same_identity(self, other)
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Note {
        id: Option<EntityId>,
        body: String,
    }

    impl Entity for Note {
        const KIND: &'static str = "note";
        const RESOURCE: &'static str = "notes";

        fn id(&self) -> Option<EntityId> {
            self.id
        }

        fn assign_id(&mut self, id: EntityId) {
            self.id = Some(id);
        }
    }

    crate::impl_identity_eq!(Note);

    fn note(id: Option<i64>, body: &str) -> Note {
        Note {
            id: id.map(EntityId::new),
            body: body.to_string(),
        }
    }

    #[test]
    fn equal_when_identities_match() {
        let a = note(Some(1), "first");
        let b = note(Some(1), "changed");
        assert_eq!(a, b);
    }

    #[test]
    fn not_equal_when_identities_differ() {
        assert_ne!(note(Some(1), "x"), note(Some(2), "x"));
    }

    #[test]
    fn unpersisted_records_are_never_equal() {
        let a = note(None, "x");
        let b = note(None, "x");
        assert_ne!(a, b);
        assert_ne!(a, a.clone());
        assert_ne!(a, note(Some(1), "x"));
        assert_ne!(note(Some(1), "x"), a);
    }

    #[test]
    fn require_reference_reports_missing_field() {
        assert_eq!(
            require_reference("cart_id", Some(EntityId::new(3))).unwrap(),
            EntityId::new(3)
        );
        let err = require_reference("cart_id", None).unwrap_err();
        assert_eq!(err, DomainError::validation("cart_id is required"));
    }

    #[test]
    fn default_hooks_accept_and_have_no_owner() {
        let n = note(None, "x");
        assert!(n.validate().is_ok());
        assert!(n.owner().is_none());
        assert!(n.unique_references().is_empty());
    }

    proptest! {
        /// Property: equality holds exactly when both identities are present and equal.
        #[test]
        fn identity_equality_matches_definition(
            a in proptest::option::of(1i64..50),
            b in proptest::option::of(1i64..50),
        ) {
            let expected = matches!((a, b), (Some(x), Some(y)) if x == y);
            prop_assert_eq!(note(a, "a") == note(b, "b"), expected);
            // Symmetric.
            prop_assert_eq!(note(b, "b") == note(a, "a"), expected);
        }
    }
}
