//! Permission seam.
//!
//! Jobs ask an [`Authority`] at execution time, never trusting what was
//! true when they were created.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use bulkedit_core::{ActorId, DocumentId, DocumentRef};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Named rights consulted by jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Right {
    /// May run replacements.
    Replace,
    /// Edits are flagged as bot edits.
    Bot,
    /// Edits are recorded as patrolled.
    Patrol,
    /// Own edits are recorded as patrolled.
    Autopatrol,
    /// May rename documents.
    Move,
}

/// Answers permission questions about identities.
#[async_trait]
pub trait Authority: Send + Sync {
    /// Whether the identity is a registered account.
    async fn is_registered(&self, actor: &ActorId) -> bool;

    /// Whether the identity may run replacements on this document.
    async fn can_replace(&self, actor: &ActorId, document: &DocumentRef) -> bool;

    /// Whether the identity holds a right.
    async fn has_right(&self, actor: &ActorId, right: Right) -> bool;

    /// Whether the identity may rename `from` to `to_title`.
    async fn can_move(&self, actor: &ActorId, from: &DocumentRef, to_title: &str) -> bool;
}

/// In-memory grant table.
///
/// An identity is registered once it has been granted anything. Protected
/// documents refuse both replacement and renames.
#[derive(Debug, Default)]
pub struct StaticAuthority {
    grants: RwLock<HashMap<ActorId, BTreeSet<Right>>>,
    protected: RwLock<BTreeSet<DocumentId>>,
}

impl StaticAuthority {
    /// Create an empty grant table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity and grant it rights.
    pub async fn grant(&self, actor: impl Into<ActorId>, rights: impl IntoIterator<Item = Right>) {
        self.grants
            .write()
            .await
            .entry(actor.into())
            .or_default()
            .extend(rights);
    }

    /// Withdraw a right. The identity stays registered.
    pub async fn revoke(&self, actor: &ActorId, right: Right) {
        if let Some(rights) = self.grants.write().await.get_mut(actor) {
            rights.remove(&right);
        }
    }

    /// Protect a document against replacement and renames.
    pub async fn protect(&self, document: DocumentId) {
        self.protected.write().await.insert(document);
    }
}

#[async_trait]
impl Authority for StaticAuthority {
    async fn is_registered(&self, actor: &ActorId) -> bool {
        self.grants.read().await.contains_key(actor)
    }

    async fn can_replace(&self, actor: &ActorId, document: &DocumentRef) -> bool {
        self.has_right(actor, Right::Replace).await
            && !self.protected.read().await.contains(&document.id)
    }

    async fn has_right(&self, actor: &ActorId, right: Right) -> bool {
        self.grants
            .read()
            .await
            .get(actor)
            .is_some_and(|rights| rights.contains(&right))
    }

    async fn can_move(&self, actor: &ActorId, from: &DocumentRef, _to_title: &str) -> bool {
        self.has_right(actor, Right::Move).await && !self.protected.read().await.contains(&from.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkedit_core::NamespaceId;

    #[tokio::test]
    async fn test_grant_revoke_protect() {
        let authority = StaticAuthority::new();
        let ann = ActorId::new("Ann");
        let page = DocumentRef::new(DocumentId(7), NamespaceId::MAIN, "Page");

        assert!(!authority.is_registered(&ann).await);
        authority.grant("Ann", [Right::Replace, Right::Move]).await;
        assert!(authority.is_registered(&ann).await);
        assert!(authority.can_replace(&ann, &page).await);

        authority.protect(DocumentId(7)).await;
        assert!(!authority.can_replace(&ann, &page).await);
        assert!(!authority.can_move(&ann, &page, "Other").await);

        authority.revoke(&ann, Right::Replace).await;
        assert!(authority.is_registered(&ann).await);
        assert!(!authority.has_right(&ann, Right::Replace).await);
    }
}
