//! Core data models
//!
//! Users, documents, queries, responses and audit events that flow through
//! the query pipeline. Everything here is immutable once constructed; the
//! pipeline shares documents through [`Arc`] rather than copying them.


use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::PipelineError;

/// Document access level that every user may read
pub const PUBLIC_ACCESS_LEVEL: &str = "public";

/// Permission granting read access to every access level
pub const READ_ALL_PERMISSION: &str = "read:all";

/// Generate a fresh identifier for users, documents, queries and events
#[inline]
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Guest,
}

impl fmt::Display for Role {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::User => write!(f, "user"),
            Self::Guest => write!(f, "guest"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            "guest" => Ok(Self::Guest),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub permissions: BTreeSet<String>,
}

impl User {
    #[inline]
    pub fn new<I, S>(id: &str, email: &str, role: Role, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            role,
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Metadata attached to a stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Where the document came from, e.g. "hr-docs"
    pub source: String,
    pub tags: Vec<String>,
    /// Scope string matched against `read:<scope>` permissions
    pub access_level: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub metadata: DocumentMetadata,
}

impl Document {
    #[inline]
    pub fn is_public(&self) -> bool {
        self.metadata.access_level == PUBLIC_ACCESS_LEVEL
    }

    #[inline]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata.tags.iter().any(|t| t == tag)
    }
}

/// Document shared between the corpus snapshot and pipeline stages
pub type SharedDocument = Arc<Document>;

/// Input for document ingestion, before an id and embedding are assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub title: String,
    pub content: String,
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub access_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub id: String,
    pub user_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

/// Final answer produced by a successful pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagResponse {
    pub id: String,
    pub query_id: String,
    pub answer: String,
    /// Authorized documents handed to the synthesizer, in ranked order
    pub sources: Vec<SharedDocument>,
    pub suggestions: Vec<String>,
    /// Always within `[0.0, 1.0]`
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    QueryInitiated,
    QueryCompleted,
    QueryFailed,
    DocumentIngested,
}

impl AuditAction {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueryInitiated => "query_initiated",
            Self::QueryCompleted => "query_completed",
            Self::QueryFailed => "query_failed",
            Self::DocumentIngested => "document_ingested",
        }
    }
}

impl fmt::Display for AuditAction {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type AuditMetadata = serde_json::Map<String, serde_json::Value>;

/// An event as submitted to the audit recorder
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEvent {
    pub user_id: String,
    pub action: AuditAction,
    pub query_id: Option<String>,
    pub metadata: AuditMetadata,
}

impl NewAuditEvent {
    #[inline]
    pub fn new(user_id: &str, action: AuditAction) -> Self {
        Self {
            user_id: user_id.to_string(),
            action,
            query_id: None,
            metadata: AuditMetadata::new(),
        }
    }

    #[inline]
    pub fn with_query_id(mut self, query_id: &str) -> Self {
        self.query_id = Some(query_id.to_string());
        self
    }

    #[inline]
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A recorded, immutable audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    /// Position in the log's total order, assigned at record time
    pub sequence: u64,
    pub user_id: String,
    pub action: AuditAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub metadata: AuditMetadata,
}

/// Structured result of one orchestration call
///
/// Callers always get one of these back, carrying a timestamp whether the
/// pipeline succeeded or not.
#[derive(Debug)]
pub struct QueryOutcome {
    pub query_id: String,
    pub timestamp: DateTime<Utc>,
    pub result: Result<RagResponse, PipelineError>,
}

impl QueryOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    #[inline]
    pub fn response(&self) -> Option<&RagResponse> {
        self.result.as_ref().ok()
    }

    #[inline]
    pub fn error(&self) -> Option<&PipelineError> {
        self.result.as_ref().err()
    }

    /// Human-readable failure message, if the pipeline failed
    #[inline]
    pub fn error_message(&self) -> Option<String> {
        self.error().map(ToString::to_string)
    }

    #[inline]
    pub fn into_result(self) -> Result<RagResponse, PipelineError> {
        self.result
    }
}
