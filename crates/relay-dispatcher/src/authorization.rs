// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Authorization pre-check collaborator (§4.6 step 2). The dispatcher
//! never decides policy itself; it asks this port for a yes/no and
//! grants access to newly-created resources through it.

use async_trait::async_trait;
use relay_core::RelayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Execute,
}

/// Resource the caller is asking permission for. `TaskWildcard` stands
/// for `task(*)`, i.e. "any task" (used before a task exists).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    TaskWildcard,
    Task(String),
}

#[async_trait]
pub trait AuthorizationPort: Send + Sync {
    async fn check(&self, resource: &Resource, operation: Operation) -> Result<(), RelayError>;

    /// Grant the caller access to a resource just created on their
    /// behalf (§4.6.1 step 2: "grant task(created.id) to the caller").
    async fn grant(&self, resource: Resource) -> Result<(), RelayError>;
}

/// Permissive implementation for deployments that delegate
/// authorization entirely to an upstream gateway. Grounded on
/// `sven-gateway`'s pattern of a pass-through auth stage wired in when
/// no policy engine is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllAuthorization;

#[async_trait]
impl AuthorizationPort for AllowAllAuthorization {
    async fn check(&self, _resource: &Resource, _operation: Operation) -> Result<(), RelayError> {
        Ok(())
    }

    async fn grant(&self, _resource: Resource) -> Result<(), RelayError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allow_all_never_rejects() {
        let authz = AllowAllAuthorization;
        authz.check(&Resource::TaskWildcard, Operation::Create).await.unwrap();
        authz.grant(Resource::Task("t-1".into())).await.unwrap();
    }
}
