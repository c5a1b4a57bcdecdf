use crate::error::StoreError;

use ahash::HashMap;
use core::fmt;

/// The flat key-value store behind the cache.
///
/// Keys are already tenant-qualified (`"{tenant}:{key}"`). Calls are made
/// synchronously while the client lock is held, hence `&mut self`.
pub trait BackingStore: Send {
  fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

  fn set(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

  /// Removes `key`. Deleting an absent key is not an error.
  fn delete(&mut self, key: &str) -> Result<(), StoreError>;
}

/// An in-process backing store.
#[derive(Default)]
pub struct MemoryStore {
  map: HashMap<String, Vec<u8>>,
  bytes: usize,
}

impl fmt::Debug for MemoryStore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MemoryStore")
      .field("len", &self.map.len())
      .field("bytes", &self.bytes)
      .finish()
  }
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }

  /// Total size of all stored values.
  pub fn bytes(&self) -> usize {
    self.bytes
  }

  pub fn contains(&self, key: &str) -> bool {
    self.map.contains_key(key)
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
    self.map.keys().map(String::as_str)
  }
}

impl BackingStore for MemoryStore {
  fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
    Ok(self.map.get(key).cloned())
  }

  fn set(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
    self.bytes += value.len();
    if let Some(old) = self.map.insert(key.to_string(), value) {
      self.bytes -= old.len();
    }
    Ok(())
  }

  fn delete(&mut self, key: &str) -> Result<(), StoreError> {
    if let Some(old) = self.map.remove(key) {
      self.bytes -= old.len();
    }
    Ok(())
  }
}
