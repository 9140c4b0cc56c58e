//! Storage capability used by the intake handler.
//!
//! The backing store is built once at startup and handed to the router as
//! `Arc<dyn LeadStore>`; tests substitute [`MemoryLeadStore`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::models::LeadRecord;

/// Outcome of an ensure-table call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Created,
    AlreadyExisted,
}

/// Errors raised by a lead store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A record with the same partition and row key already exists.
    EntityExists,
    /// The service answered with a non-success status.
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },
    /// The request never produced a response.
    Transport(String),
    /// The service answered with something that could not be understood.
    InvalidResponse(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::EntityExists => write!(f, "Entity already exists"),
            StoreError::Rejected {
                status,
                code,
                message,
            } => match code {
                Some(code) => write!(f, "Table service returned {} ({}): {}", status, code, message),
                None => write!(f, "Table service returned {}: {}", status, message),
            },
            StoreError::Transport(msg) => write!(f, "Table service request failed: {}", msg),
            StoreError::InvalidResponse(msg) => {
                write!(f, "Unexpected table service response: {}", msg)
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

/// Write-only access to the lead table.
///
/// Records are created once and never updated or deleted.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Creates the lead table if needed. An existing table is not an error.
    async fn ensure_table(&self) -> Result<TableStatus, StoreError>;

    /// Persists one record as a single create operation.
    async fn insert_lead(&self, lead: &LeadRecord) -> Result<(), StoreError>;
}

/// In-process lead store keyed by `(PartitionKey, RowKey)`.
#[derive(Default)]
pub struct MemoryLeadStore {
    records: RwLock<HashMap<(String, String), LeadRecord>>,
    table_created: RwLock<bool>,
    ensure_calls: AtomicUsize,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored records, ordered by row key.
    pub async fn records(&self) -> Vec<LeadRecord> {
        let mut records: Vec<LeadRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.row_key.cmp(&b.row_key));
        records
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Number of `ensure_table` calls seen so far.
    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn ensure_table(&self) -> Result<TableStatus, StoreError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        let mut created = self.table_created.write().await;
        if *created {
            Ok(TableStatus::AlreadyExisted)
        } else {
            *created = true;
            Ok(TableStatus::Created)
        }
    }

    async fn insert_lead(&self, lead: &LeadRecord) -> Result<(), StoreError> {
        let key = (lead.partition_key.clone(), lead.row_key.clone());
        let mut records = self.records.write().await;
        if records.contains_key(&key) {
            return Err(StoreError::EntityExists);
        }
        records.insert(key, lead.clone());
        Ok(())
    }
}
