use crate::entry::TenantId;

use ahash::HashMap;

/// Per-tenant state kept in the order tenants were first seen.
///
/// Iteration order is stable, which the victim searches rely on to break
/// ties deterministically.
#[derive(Debug)]
pub(crate) struct TenantTable<T> {
  slots: HashMap<TenantId, usize>,
  entries: Vec<(TenantId, T)>,
}

impl<T> Default for TenantTable<T> {
  fn default() -> Self {
    Self {
      slots: HashMap::default(),
      entries: Vec::new(),
    }
  }
}

impl<T> TenantTable<T> {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn get(&self, tenant: TenantId) -> Option<&T> {
    self.slots.get(&tenant).map(|&slot| &self.entries[slot].1)
  }

  pub(crate) fn get_mut(&mut self, tenant: TenantId) -> Option<&mut T> {
    let slot = *self.slots.get(&tenant)?;
    Some(&mut self.entries[slot].1)
  }

  pub(crate) fn get_or_insert_with(&mut self, tenant: TenantId, init: impl FnOnce() -> T) -> &mut T {
    let slot = match self.slots.get(&tenant) {
      Some(&slot) => slot,
      None => {
        let slot = self.entries.len();
        self.entries.push((tenant, init()));
        self.slots.insert(tenant, slot);
        slot
      }
    };
    &mut self.entries[slot].1
  }

  pub(crate) fn iter(&self) -> impl Iterator<Item = (TenantId, &T)> + '_ {
    self.entries.iter().map(|(tenant, state)| (*tenant, state))
  }
}
