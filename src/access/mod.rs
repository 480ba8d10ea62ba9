//! Permission-based document filtering
//!
//! Access is decided by a small ordered policy table. Rules are evaluated
//! top-down and the first rule that grants access wins; a document no rule
//! grants is hidden.
//!
//! | Rule | Grants when |
//! |------|-------------|
//! | [`AccessRule::AdminBypass`] | the user has the admin role |
//! | [`AccessRule::PublicDocument`] | the document's access level is `public` |
//! | [`AccessRule::ScopedPermission`] | the user holds `read:<level>` or `read:all` |


use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::models::{Document, READ_ALL_PERMISSION, Role, SharedDocument, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("User directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
    AdminBypass,
    PublicDocument,
    ScopedPermission,
}

/// Rules in evaluation order
pub const ACCESS_POLICY: [AccessRule; 3] = [
    AccessRule::AdminBypass,
    AccessRule::PublicDocument,
    AccessRule::ScopedPermission,
];

impl AccessRule {
    #[inline]
    pub fn grants(&self, user: &User, document: &Document) -> bool {
        match self {
            Self::AdminBypass => user.role == Role::Admin,
            Self::PublicDocument => document.is_public(),
            Self::ScopedPermission => {
                user.has_permission(READ_ALL_PERMISSION)
                    || user.has_permission(&read_permission(&document.metadata.access_level))
            }
        }
    }
}

/// Permission string required to read documents of `access_level`
#[inline]
pub fn read_permission(access_level: &str) -> String {
    format!("read:{}", access_level)
}

/// First policy rule granting `user` access to `document`, if any
#[inline]
pub fn decide(user: &User, document: &Document) -> Option<AccessRule> {
    ACCESS_POLICY
        .into_iter()
        .find(|rule| rule.grants(user, document))
}

/// Keep the documents `user` may read, preserving their order
#[inline]
pub fn filter_documents(user: &User, documents: &[SharedDocument]) -> Vec<SharedDocument> {
    documents
        .iter()
        .filter(|document| decide(user, document).is_some())
        .map(Arc::clone)
        .collect()
}

/// Resolves user ids to users
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn lookup_user(&self, user_id: &str) -> Result<User, AccessError>;

    async fn list_users(&self) -> Result<Vec<User>, AccessError>;
}

/// Fixed set of users held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: HashMap<String, User>,
}

impl InMemoryUserDirectory {
    #[inline]
    pub fn new<I>(users: I) -> Self
    where
        I: IntoIterator<Item = User>,
    {
        Self {
            users: users
                .into_iter()
                .map(|user| (user.id.clone(), user))
                .collect(),
        }
    }

    /// Admin, engineer and guest demonstration users
    #[inline]
    pub fn with_sample_users() -> Self {
        Self::new(sample_users())
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    #[inline]
    async fn lookup_user(&self, user_id: &str) -> Result<User, AccessError> {
        self.users
            .get(user_id)
            .cloned()
            .ok_or_else(|| AccessError::UserNotFound(user_id.to_string()))
    }

    #[inline]
    async fn list_users(&self) -> Result<Vec<User>, AccessError> {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }
}

#[inline]
pub fn sample_users() -> Vec<User> {
    vec![
        User::new(
            "user-1",
            "admin@company.com",
            Role::Admin,
            ["read:all", "write:all", "admin:dashboard"],
        ),
        User::new(
            "user-2",
            "engineer@company.com",
            Role::User,
            ["read:internal", "read:engineering"],
        ),
        User::new("user-3", "guest@company.com", Role::Guest, ["read:public"]),
    ]
}

/// Access filter backed by a user directory
#[derive(Clone)]
pub struct AccessFilter {
    directory: Arc<dyn UserDirectory>,
}

impl AccessFilter {
    #[inline]
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    #[inline]
    pub async fn lookup_user(&self, user_id: &str) -> Result<User, AccessError> {
        self.directory.lookup_user(user_id).await
    }

    #[inline]
    pub async fn list_users(&self) -> Result<Vec<User>, AccessError> {
        self.directory.list_users().await
    }

    /// Resolve `user_id` and keep the documents that user may read
    #[inline]
    pub async fn filter(
        &self,
        user_id: &str,
        documents: &[SharedDocument],
    ) -> Result<Vec<SharedDocument>, AccessError> {
        let user = self.directory.lookup_user(user_id).await?;
        let allowed = filter_documents(&user, documents);
        debug!(
            "User {} ({}) may read {} of {} documents",
            user.id,
            user.role,
            allowed.len(),
            documents.len()
        );
        Ok(allowed)
    }

    /// Whether `user_id` holds exactly `permission`
    #[inline]
    pub async fn check_permission(
        &self,
        user_id: &str,
        permission: &str,
    ) -> Result<bool, AccessError> {
        let user = self.directory.lookup_user(user_id).await?;
        Ok(user.has_permission(permission))
    }
}
