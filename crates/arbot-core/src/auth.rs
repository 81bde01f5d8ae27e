//! Collaborator contracts for identity and entitlement.
//!
//! The web layer, session verification, and billing state live outside this
//! workspace; the control plane consumes them through these traits.

use crate::Result;
use async_trait::async_trait;

/// Resolves the tenant behind the current request context.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the tenant id, or `Error::Unauthenticated` when no identity
    /// is present.
    async fn resolve_tenant(&self) -> Result<String>;
}

/// Answers whether a tenant's subscription entitles it to run a bot.
#[async_trait]
pub trait EntitlementChecker: Send + Sync {
    async fn is_entitled(&self, tenant_id: &str) -> Result<bool>;
}
