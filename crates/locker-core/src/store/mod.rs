//! Store Adapter - abstraction boundary over the shared key-value store.
//!
//! The store holds hashes (key → field → value) and sets (key → members).
//! Compare-and-set is the only mutation primitive for a subject's record,
//! and every implementation must perform it atomically in a single round
//! trip: concurrent callers, possibly in different processes, share one
//! store and rely on it for per-subject linearizability.

use std::collections::BTreeSet;

use crate::{subject::SubjectKind, Result};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Hash field holding a subject's encoded [`crate::SubjectRecord`].
pub const RECORD_FIELD: &str = "record";

/// Trait defining the persistence boundary for lock state.
///
/// # Atomicity
///
/// `compare_and_set` and `compare_and_delete` must observe and mutate in one
/// step. A get-then-set pair is not an acceptable implementation.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // HASH OPERATIONS
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Read one field of a hash.
    async fn get(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Set `field` to `new` iff its current value equals `expected`.
    ///
    /// `expected = None` means the field must be absent.
    async fn compare_and_set(
        &self,
        key: &str,
        field: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool>;

    /// Delete the whole key iff `field` currently equals `expected`.
    async fn compare_and_delete(&self, key: &str, field: &str, expected: &str) -> Result<bool>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // SET OPERATIONS
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Add a member. Returns true if it was not already present.
    async fn add_to_set(&self, key: &str, member: &str) -> Result<bool>;

    /// Remove a member. Returns true if it was present.
    async fn remove_from_set(&self, key: &str, member: &str) -> Result<bool>;

    /// All members, sorted.
    async fn set_members(&self, key: &str) -> Result<BTreeSet<String>>;

    async fn is_member(&self, key: &str, member: &str) -> Result<bool>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // KEY OPERATIONS
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Remove a key (hash or set). Returns true if anything was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Builds the keys of one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    namespace: String,
}

impl Keyspace {
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Hash holding the record of the subject called `name`.
    #[must_use]
    pub fn subject(&self, name: &str) -> String {
        format!("{}:subject:{name}", self.namespace)
    }

    /// Set of all subject names of `kind`.
    #[must_use]
    pub fn index(&self, kind: SubjectKind) -> String {
        format!("{}:index:{kind}", self.namespace)
    }

    /// Set of resource names belonging to `label`.
    #[must_use]
    pub fn membership(&self, label: &str) -> String {
        format!("{}:membership:{label}", self.namespace)
    }
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new("locker")
    }
}
