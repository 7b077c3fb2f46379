//! Process-local store.
//!
//! One `tokio::sync::Mutex` guards the whole map, so each primitive is
//! trivially atomic. Locks are not shared across processes.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tokio::sync::Mutex;

use super::Store;
use crate::{Error, Result};

#[derive(Debug, Clone)]
enum Entry {
    Hash(BTreeMap<String, String>),
    Set(BTreeSet<String>),
}

/// In-memory [`Store`] for tests and single-process embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn wrong_type(key: &str, wanted: &str) -> Error {
    Error::Store(format!("key '{key}' does not hold a {wanted}"))
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str, field: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            None => Ok(None),
            Some(Entry::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(Entry::Set(_)) => Err(wrong_type(key, "hash")),
        }
    }

    async fn compare_and_set(
        &self,
        key: &str,
        field: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let hash = match entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(BTreeMap::new()))
        {
            Entry::Hash(hash) => hash,
            Entry::Set(_) => return Err(wrong_type(key, "hash")),
        };

        if hash.get(field).map(String::as_str) != expected {
            if hash.is_empty() {
                entries.remove(key);
            }
            return Ok(false);
        }

        hash.insert(field.to_string(), new.to_string());
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &str, field: &str, expected: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let matches = match entries.get(key) {
            None => false,
            Some(Entry::Hash(hash)) => hash.get(field).map(String::as_str) == Some(expected),
            Some(Entry::Set(_)) => return Err(wrong_type(key, "hash")),
        };
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(BTreeSet::new()))
        {
            Entry::Set(set) => Ok(set.insert(member.to_string())),
            Entry::Hash(_) => Err(wrong_type(key, "set")),
        }
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let (removed, now_empty) = match entries.get_mut(key) {
            None => return Ok(false),
            Some(Entry::Set(set)) => (set.remove(member), set.is_empty()),
            Some(Entry::Hash(_)) => return Err(wrong_type(key, "set")),
        };
        if now_empty {
            entries.remove(key);
        }
        Ok(removed)
    }

    async fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            None => Ok(BTreeSet::new()),
            Some(Entry::Set(set)) => Ok(set.clone()),
            Some(Entry::Hash(_)) => Err(wrong_type(key, "set")),
        }
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            None => Ok(false),
            Some(Entry::Set(set)) => Ok(set.contains(member)),
            Some(Entry::Hash(_)) => Err(wrong_type(key, "set")),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().await.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().await.contains_key(key))
    }
}
