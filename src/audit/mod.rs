//! Append-only audit log
//!
//! Every recorded event receives the next sequence number while the log lock
//! is held, so the log has a single total order even with concurrent writers.
//! Per-user views are slices of that same order.


use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use crate::models::{AuditEvent, NewAuditEvent, generate_id};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("Audit log lock poisoned: {0}")]
    LockPoisoned(String),
    #[error("Audit backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AuditRecorder: Send + Sync {
    /// Append an event, returning it as stored
    async fn record(&self, event: NewAuditEvent) -> Result<AuditEvent, AuditError>;

    /// Events for `user_id` in insertion order
    async fn query_by_user(&self, user_id: &str) -> Result<Vec<AuditEvent>, AuditError>;

    /// Up to `limit` events, newest timestamp first
    async fn recent(&self, limit: usize) -> Result<Vec<AuditEvent>, AuditError>;

    /// Every event in insertion order
    async fn all(&self) -> Result<Vec<AuditEvent>, AuditError>;
}

#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditLog {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_events<T>(&self, f: impl FnOnce(&[AuditEvent]) -> T) -> Result<T, AuditError> {
        let events = self
            .events
            .lock()
            .map_err(|e| AuditError::LockPoisoned(e.to_string()))?;
        Ok(f(&events))
    }
}

#[async_trait]
impl AuditRecorder for InMemoryAuditLog {
    #[inline]
    async fn record(&self, event: NewAuditEvent) -> Result<AuditEvent, AuditError> {
        let mut events = self
            .events
            .lock()
            .map_err(|e| AuditError::LockPoisoned(e.to_string()))?;

        let stored = AuditEvent {
            id: generate_id(),
            sequence: events.len() as u64,
            user_id: event.user_id,
            action: event.action,
            query_id: event.query_id,
            timestamp: Utc::now(),
            metadata: event.metadata,
        };
        events.push(stored.clone());

        debug!(
            "Recorded audit event #{} {} for user {}",
            stored.sequence, stored.action, stored.user_id
        );
        Ok(stored)
    }

    #[inline]
    async fn query_by_user(&self, user_id: &str) -> Result<Vec<AuditEvent>, AuditError> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|event| event.user_id == user_id)
                .cloned()
                .collect()
        })
    }

    #[inline]
    async fn recent(&self, limit: usize) -> Result<Vec<AuditEvent>, AuditError> {
        let mut events = self.all().await?;
        sort_most_recent_first(&mut events);
        events.truncate(limit);
        Ok(events)
    }

    #[inline]
    async fn all(&self) -> Result<Vec<AuditEvent>, AuditError> {
        self.with_events(<[AuditEvent]>::to_vec)
    }
}

/// Newest timestamp first; equal timestamps fall back to later insertion first
#[inline]
pub fn sort_most_recent_first(events: &mut [AuditEvent]) {
    events.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.sequence.cmp(&a.sequence))
    });
}
