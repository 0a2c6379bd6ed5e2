//! # Visibility
//!
//! Row scoping for a principal. A provider returns an opaque predicate that
//! is ANDed into every count and fetch of the request.
//!
//! Anonymous principals never see rows of an ownership-scoped collection.
//! The service role sees everything.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::predicate::{Predicate, SqlValue};
use crate::registry::CollectionHandle;

/// Who is asking
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Authenticated user (None if anonymous)
    #[serde(default)]
    pub user_id: Option<Uuid>,

    /// Bypasses visibility scoping
    #[serde(default)]
    pub service_role: bool,

    /// Extra claims, available to custom providers
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub claims: HashMap<String, serde_json::Value>,
}

impl Principal {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn service_role() -> Self {
        Self {
            service_role: true,
            ..Self::default()
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none() && !self.service_role
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.service_role, self.user_id) {
            (true, _) => write!(f, "service"),
            (false, Some(id)) => write!(f, "user:{}", id),
            (false, None) => write!(f, "anonymous"),
        }
    }
}

/// Supplies the visibility predicate of a request
pub trait VisibilityProvider: Send + Sync {
    fn predicate(&self, collection: &CollectionHandle, principal: &Principal) -> Predicate;
}

/// Every row is visible
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl VisibilityProvider for Unrestricted {
    fn predicate(&self, _collection: &CollectionHandle, _principal: &Principal) -> Predicate {
        Predicate::always()
    }
}

/// Per-collection visibility policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisibilityPolicy {
    /// No scoping
    Public,
    /// Rows whose `owner_field` equals the principal's user id
    Ownership { owner_field: String },
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self::Ownership {
            owner_field: "owner_id".to_string(),
        }
    }
}

/// Ownership-based provider with per-collection overrides
#[derive(Debug, Clone, Default)]
pub struct OwnershipVisibility {
    policies: HashMap<String, VisibilityPolicy>,
    default_policy: VisibilityPolicy,
}

impl OwnershipVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, collection: impl Into<String>, policy: VisibilityPolicy) -> Self {
        self.policies.insert(collection.into(), policy);
        self
    }

    pub fn with_default_policy(mut self, policy: VisibilityPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    fn policy(&self, collection: &str) -> &VisibilityPolicy {
        self.policies.get(collection).unwrap_or(&self.default_policy)
    }
}

impl VisibilityProvider for OwnershipVisibility {
    fn predicate(&self, collection: &CollectionHandle, principal: &Principal) -> Predicate {
        if principal.service_role {
            return Predicate::always();
        }

        match self.policy(&collection.name) {
            VisibilityPolicy::Public => Predicate::always(),
            VisibilityPolicy::Ownership { owner_field } => match principal.user_id {
                Some(user_id) => Predicate::eq(owner_field.as_str(), SqlValue::text(user_id.to_string())),
                None => Predicate::never(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CollectionSchema;

    fn bugs() -> CollectionHandle {
        CollectionHandle::new("bugs", "bugs", CollectionSchema::new())
    }

    #[test]
    fn test_service_role_bypasses() {
        let provider = OwnershipVisibility::new();
        assert!(provider.predicate(&bugs(), &Principal::service_role()).is_always());
    }

    #[test]
    fn test_owner_scoping() {
        let provider = OwnershipVisibility::new();
        let id = Uuid::new_v4();
        let pred = provider.predicate(&bugs(), &Principal::user(id));
        assert_eq!(pred, Predicate::eq("owner_id", SqlValue::text(id.to_string())));
    }

    #[test]
    fn test_anonymous_sees_nothing_when_owned() {
        let provider = OwnershipVisibility::new();
        assert_eq!(provider.predicate(&bugs(), &Principal::anonymous()), Predicate::never());
    }

    #[test]
    fn test_public_policy_override() {
        let provider = OwnershipVisibility::new().with_policy("bugs", VisibilityPolicy::Public);
        assert!(provider.predicate(&bugs(), &Principal::anonymous()).is_always());
    }

    #[test]
    fn test_principal_display_and_json() {
        let principal: Principal = serde_json::from_str(r#"{"service_role": true}"#).unwrap();
        assert_eq!(principal.to_string(), "service");
        assert!(Principal::anonymous().is_anonymous());
    }
}
