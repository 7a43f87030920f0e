//! # Persistence Contract
//!
//! [`ProofRepository`] and [`JobRepository`] are the seam to durable
//! storage. [`MemoryStore`] implements both over an in-process map and backs
//! the tests and the CLI.
//!
//! ## Atomic updates
//!
//! `update` hands the caller a scratch copy of the record. The copy is
//! written back only if the closure returns `Ok`, and the whole
//! read-validate-write runs under one write lock. A rejected transition
//! therefore leaves the stored record untouched, and two workers racing on
//! the same job serialize on the lock with the lease rule deciding the
//! winner.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use attest_core::{JobId, OwnerId, ProofId, Timestamp};

use crate::job::Job;
use crate::proof::ProofRecord;
use crate::status::TransitionError;

/// Default and maximum page sizes for owner listings.
pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;

/// Persistence errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    /// The update closure rejected the transition.
    #[error(transparent)]
    Transition(#[from] TransitionError),
    /// The storage backend itself failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Offset pagination for owner listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    /// A page with `limit` clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
            offset,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_LIMIT, 0)
    }
}

/// Closure applied by `update`.
pub type Mutation<'a, T> = &'a mut dyn FnMut(&mut T) -> Result<(), TransitionError>;

pub trait ProofRepository: Send + Sync {
    fn create(&self, record: ProofRecord) -> Result<(), StoreError>;
    fn get(&self, id: &ProofId) -> Result<ProofRecord, StoreError>;
    fn update(&self, id: &ProofId, f: Mutation<'_, ProofRecord>)
        -> Result<ProofRecord, StoreError>;
    /// Newest first.
    fn list_by_owner(&self, owner: &OwnerId, page: Page) -> Result<Vec<ProofRecord>, StoreError>;
}

pub trait JobRepository: Send + Sync {
    fn create(&self, job: Job) -> Result<(), StoreError>;
    fn get(&self, id: &JobId) -> Result<Job, StoreError>;
    fn get_by_proof_id(&self, proof_id: &ProofId) -> Result<Job, StoreError>;
    fn update(&self, id: &JobId, f: Mutation<'_, Job>) -> Result<Job, StoreError>;
    /// Newest first.
    fn list_by_owner(&self, owner: &OwnerId, page: Page) -> Result<Vec<Job>, StoreError>;
}

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not
/// `tokio::sync`) because the lock is never held across `.await` points.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert only if the key is free. Returns `false` if it was taken.
    pub fn insert_new(&self, id: Uuid, value: T) -> bool {
        let mut guard = self.data.write();
        if guard.contains_key(&id) {
            return false;
        }
        guard.insert(id, value);
        true
    }

    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// All records matching `pred`.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data.read().values().filter(|v| pred(v)).cloned().collect()
    }

    /// Atomically read-validate-update a record.
    ///
    /// Returns `None` if the record doesn't exist, or `Some(result)` with
    /// the closure's `Result`.
    pub fn try_update<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `f` to a scratch copy and commit it only on success.
fn apply<T: Clone>(
    record: &mut T,
    f: &mut dyn FnMut(&mut T) -> Result<(), TransitionError>,
) -> Result<T, StoreError> {
    let mut next = record.clone();
    f(&mut next)?;
    *record = next.clone();
    Ok(next)
}

fn page_newest_first<T>(
    mut items: Vec<T>,
    key: impl Fn(&T) -> (Timestamp, Uuid),
    page: Page,
) -> Vec<T> {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
    items.into_iter().skip(page.offset).take(page.limit).collect()
}

// -- MemoryStore --------------------------------------------------------------

/// In-memory proof and job repositories.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    proofs: Store<ProofRecord>,
    jobs: Store<Job>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProofRepository for MemoryStore {
    fn create(&self, record: ProofRecord) -> Result<(), StoreError> {
        let id = record.id;
        if !self.proofs.insert_new(id.0, record) {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }
        Ok(())
    }

    fn get(&self, id: &ProofId) -> Result<ProofRecord, StoreError> {
        self.proofs
            .get(id.as_uuid())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn update(
        &self,
        id: &ProofId,
        f: Mutation<'_, ProofRecord>,
    ) -> Result<ProofRecord, StoreError> {
        self.proofs
            .try_update(id.as_uuid(), |r| apply(r, f))
            .unwrap_or_else(|| Err(StoreError::NotFound(id.to_string())))
    }

    fn list_by_owner(&self, owner: &OwnerId, page: Page) -> Result<Vec<ProofRecord>, StoreError> {
        let items = self.proofs.filter(|r| r.owner == *owner);
        Ok(page_newest_first(items, |r| (r.created_at, r.id.0), page))
    }
}

impl JobRepository for MemoryStore {
    fn create(&self, job: Job) -> Result<(), StoreError> {
        let id = job.id;
        if !self.jobs.insert_new(id.0, job) {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }
        Ok(())
    }

    fn get(&self, id: &JobId) -> Result<Job, StoreError> {
        self.jobs
            .get(id.as_uuid())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn get_by_proof_id(&self, proof_id: &ProofId) -> Result<Job, StoreError> {
        self.jobs
            .filter(|j| j.proof_id == *proof_id)
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("job for {proof_id}")))
    }

    fn update(&self, id: &JobId, f: Mutation<'_, Job>) -> Result<Job, StoreError> {
        self.jobs
            .try_update(id.as_uuid(), |j| apply(j, f))
            .unwrap_or_else(|| Err(StoreError::NotFound(id.to_string())))
    }

    fn list_by_owner(&self, owner: &OwnerId, page: Page) -> Result<Vec<Job>, StoreError> {
        let items = self.jobs.filter(|j| j.owner == *owner);
        Ok(page_newest_first(items, |j| (j.created_at, j.id.0), page))
    }
}
