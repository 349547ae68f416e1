//! Per-operation context: who is acting and which audit entry rows belong to.

use crate::error::TrailError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, OnceLock};
use trail_core::EntryId;

/// Source of the audit entry for the current operation.
///
/// Implementations create the entry on first use and hand out the same
/// identifier for the rest of the operation.
#[async_trait]
pub trait EntryProvider: Send + Sync {
    async fn current_entry_id(&self) -> anyhow::Result<EntryId>;
}

/// Source of the current user, e.g. a request session.
pub trait IdentityProvider {
    /// `None` when nobody is signed in or there is no end-user request.
    fn current_user_id(&self) -> Option<String>;
}

/// Entry provider that always returns the same identifier.
#[derive(Debug, Clone)]
pub struct StaticEntryProvider(EntryId);

impl StaticEntryProvider {
    pub fn new(entry_id: impl Into<EntryId>) -> Self {
        Self(entry_id.into())
    }
}

#[async_trait]
impl EntryProvider for StaticEntryProvider {
    async fn current_entry_id(&self) -> anyhow::Result<EntryId> {
        Ok(self.0.clone())
    }
}

/// Entry provider that generates a random entry id on first use.
///
/// Create one per request so that all rows of that request share an entry.
#[derive(Debug, Default)]
pub struct RequestEntryProvider {
    entry: OnceLock<EntryId>,
}

impl RequestEntryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry id if one has been handed out already.
    pub fn entry_id(&self) -> Option<&EntryId> {
        self.entry.get()
    }
}

#[async_trait]
impl EntryProvider for RequestEntryProvider {
    async fn current_entry_id(&self) -> anyhow::Result<EntryId> {
        Ok(self.entry.get_or_init(EntryId::generate).clone())
    }
}

/// Context passed explicitly into every audit call.
#[derive(Clone, Default)]
pub struct AuditContext {
    user_id: Option<String>,
    occurred_at: Option<DateTime<Utc>>,
    entries: Option<Arc<dyn EntryProvider>>,
}

impl AuditContext {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    /// Context for work done outside an end-user request.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self::new(Some(user_id.into()))
    }

    pub fn from_identity(identity: &dyn IdentityProvider) -> Self {
        Self::new(identity.current_user_id())
    }

    pub fn with_entries(mut self, entries: Arc<dyn EntryProvider>) -> Self {
        self.entries = Some(entries);
        self
    }

    /// Pin the timestamp written to rows instead of reading the clock.
    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.occurred_at.unwrap_or_else(Utc::now)
    }

    /// Resolve the entry id, failing with `ConfigurationMissing` when no
    /// provider is attached or the provider fails.
    pub async fn resolve_entry(&self) -> Result<EntryId, TrailError> {
        let provider = self.entries.as_ref().ok_or_else(|| {
            TrailError::ConfigurationMissing("no entry provider configured".to_string())
        })?;
        provider
            .current_entry_id()
            .await
            .map_err(|e| TrailError::ConfigurationMissing(e.to_string()))
    }
}

impl fmt::Debug for AuditContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditContext")
            .field("user_id", &self.user_id)
            .field("occurred_at", &self.occurred_at)
            .field("has_entries", &self.entries.is_some())
            .finish()
    }
}
