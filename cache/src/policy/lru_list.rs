use crate::entry::{CacheEntry, EntryId};
use crate::time::Timestamp;

use ahash::HashMap;
use generational_arena::{Arena, Index};

#[derive(Debug)]
pub(crate) struct Node<M> {
  pub(crate) entry: CacheEntry<M>,
  pub(crate) next: Option<Index>,
  pub(crate) prev: Option<Index>,
}

// An ordered recency structure over cache entries.
// Nodes live in a generational arena, which recycles freed slots, and are
// chained by index. The lookup map gives O(1) access by (tenant, key).
#[derive(Debug)]
pub(crate) struct LruList<M = ()> {
  nodes: Arena<Node<M>>,
  lookup: HashMap<EntryId, Index>,
  // Head is the most-recently-used entry.
  head: Option<Index>,
  // Tail is the least-recently-used entry.
  tail: Option<Index>,
}

impl<M> Default for LruList<M> {
  fn default() -> Self {
    Self::new()
  }
}

impl<M> LruList<M> {
  pub fn new() -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::default(),
      head: None,
      tail: None,
    }
  }

  // Unlinks a node from the chain without removing it from the arena or map.
  fn unlink(&mut self, index: Index) {
    let node = &self.nodes[index];
    let prev_node_idx = node.prev;
    let next_node_idx = node.next;

    if let Some(prev_idx) = prev_node_idx {
      self.nodes[prev_idx].next = next_node_idx;
    } else {
      self.head = next_node_idx;
    }

    if let Some(next_idx) = next_node_idx {
      self.nodes[next_idx].prev = prev_node_idx;
    } else {
      self.tail = prev_node_idx;
    }
  }

  // Links an arena node in as the new head.
  fn link_front(&mut self, index: Index) {
    let old_head_idx = self.head;
    self.nodes[index].next = old_head_idx;
    self.nodes[index].prev = None;
    self.head = Some(index);

    if let Some(old_head) = old_head_idx {
      self.nodes[old_head].prev = Some(index);
    }

    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.lookup.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.lookup.is_empty()
  }

  #[inline]
  pub fn contains(&self, id: &EntryId) -> bool {
    self.lookup.contains_key(id)
  }

  #[cfg(test)]
  pub fn get(&self, id: &EntryId) -> Option<&CacheEntry<M>> {
    self.lookup.get(id).map(|&index| &self.nodes[index].entry)
  }

  /// Mutable access that leaves the entry's position untouched.
  pub fn get_mut(&mut self, id: &EntryId) -> Option<&mut CacheEntry<M>> {
    let index = *self.lookup.get(id)?;
    Some(&mut self.nodes[index].entry)
  }

  /// Inserts a new entry as the most recently used.
  ///
  /// Returns the entry back if its id is already present.
  pub fn push_front(&mut self, entry: CacheEntry<M>) -> Result<(), CacheEntry<M>> {
    if self.lookup.contains_key(&entry.id) {
      return Err(entry);
    }
    let id = entry.id.clone();
    let index = self.nodes.insert(Node {
      entry,
      next: None,
      prev: None,
    });
    self.lookup.insert(id, index);
    self.link_front(index);
    Ok(())
  }

  /// Marks an entry as used at `now` and moves it to the front.
  ///
  /// Returns `false` if the entry is not in the list.
  pub fn touch(&mut self, id: &EntryId, now: Timestamp) -> bool {
    let Some(&index) = self.lookup.get(id) else {
      return false;
    };
    self.nodes[index].entry.last_used = now;
    if self.head != Some(index) {
      self.unlink(index);
      self.link_front(index);
    }
    true
  }

  /// The least recently used entry, if any.
  pub fn peek_back(&self) -> Option<&CacheEntry<M>> {
    self.tail.map(|index| &self.nodes[index].entry)
  }

  /// Timestamp of the least recently used entry.
  pub fn oldest_time(&self) -> Option<Timestamp> {
    self.peek_back().map(|entry| entry.last_used)
  }

  pub fn pop_back(&mut self) -> Option<CacheEntry<M>> {
    let tail_index = self.tail?;
    let id = self.nodes[tail_index].entry.id.clone();
    self.remove(&id)
  }

  pub fn remove(&mut self, id: &EntryId) -> Option<CacheEntry<M>> {
    let index = self.lookup.remove(id)?;
    self.unlink(index);
    self.nodes.remove(index).map(|node| node.entry)
  }

  /// Iterates from most to least recently used.
  pub fn iter(&self) -> Iter<'_, M> {
    Iter {
      list: self,
      current: self.head,
    }
  }
}

pub(crate) struct Iter<'a, M> {
  list: &'a LruList<M>,
  current: Option<Index>,
}

impl<'a, M> Iterator for Iter<'a, M> {
  type Item = &'a CacheEntry<M>;

  fn next(&mut self) -> Option<Self::Item> {
    let index = self.current?;
    let node = &self.list.nodes[index];
    self.current = node.next;
    Some(&node.entry)
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::entry::TenantId;
  use crate::time::Clock;

  fn id(tenant: u32, key: &str) -> EntryId {
    EntryId::new(TenantId(tenant), key)
  }

  fn keys(list: &LruList) -> Vec<String> {
    list.iter().map(|e| e.id.to_string()).collect()
  }

  fn push(list: &mut LruList, clock: &mut Clock, tenant: u32, key: &str) {
    list
      .push_front(CacheEntry::new(id(tenant, key), clock.now(), ()))
      .unwrap();
  }

  #[test]
  fn new_list_is_empty() {
    let list = LruList::<()>::new();
    assert!(list.is_empty());
    assert_eq!(list.len(), 0);
    assert!(list.peek_back().is_none());
    assert!(!list.contains(&id(1, "a")));
  }

  #[test]
  fn push_front_orders_newest_first() {
    let mut clock = Clock::new();
    let mut list = LruList::new();
    push(&mut list, &mut clock, 1, "a");
    push(&mut list, &mut clock, 2, "a");
    push(&mut list, &mut clock, 1, "b");

    assert_eq!(keys(&list), vec!["1:b", "2:a", "1:a"]);
    assert_eq!(list.len(), 3);
    assert_eq!(list.peek_back().map(|e| e.id.clone()), Some(id(1, "a")));
  }

  #[test]
  fn push_front_rejects_duplicate_id() {
    let mut clock = Clock::new();
    let mut list = LruList::new();
    push(&mut list, &mut clock, 1, "a");

    let dup = CacheEntry::new(id(1, "a"), clock.now(), ());
    assert!(list.push_front(dup).is_err());
    assert_eq!(list.len(), 1);
  }

  #[test]
  fn same_key_different_tenants_are_distinct() {
    let mut clock = Clock::new();
    let mut list = LruList::new();
    push(&mut list, &mut clock, 1, "k");
    push(&mut list, &mut clock, 2, "k");
    assert!(list.contains(&id(1, "k")));
    assert!(list.contains(&id(2, "k")));
    assert!(!list.contains(&id(3, "k")));
  }

  #[test]
  fn touch_moves_to_front_and_refreshes_timestamp() {
    let mut clock = Clock::new();
    let mut list = LruList::new();
    push(&mut list, &mut clock, 1, "a");
    push(&mut list, &mut clock, 1, "b");
    push(&mut list, &mut clock, 1, "c");

    let before = list.get(&id(1, "a")).unwrap().last_used;
    let now = clock.now();
    assert!(list.touch(&id(1, "a"), now));

    assert_eq!(keys(&list), vec!["1:a", "1:c", "1:b"]);
    let after = list.get(&id(1, "a")).unwrap().last_used;
    assert!(after > before);
    assert_eq!(list.oldest_time(), list.get(&id(1, "b")).map(|e| e.last_used));
  }

  #[test]
  fn touch_missing_entry_reports_false() {
    let mut clock = Clock::new();
    let mut list = LruList::new();
    push(&mut list, &mut clock, 1, "a");
    assert!(!list.touch(&id(1, "zz"), clock.now()));
    assert_eq!(keys(&list), vec!["1:a"]);
  }

  #[test]
  fn pop_back_returns_least_recent() {
    let mut clock = Clock::new();
    let mut list = LruList::new();
    push(&mut list, &mut clock, 1, "a");
    push(&mut list, &mut clock, 1, "b");

    let popped = list.pop_back().unwrap();
    assert_eq!(popped.id, id(1, "a"));
    assert!(!list.contains(&id(1, "a")));
    assert_eq!(keys(&list), vec!["1:b"]);

    assert_eq!(list.pop_back().map(|e| e.id), Some(id(1, "b")));
    assert!(list.pop_back().is_none());
    assert!(list.is_empty());
  }

  #[test]
  fn remove_from_middle_keeps_chain_intact() {
    let mut clock = Clock::new();
    let mut list = LruList::new();
    push(&mut list, &mut clock, 1, "a");
    push(&mut list, &mut clock, 1, "b");
    push(&mut list, &mut clock, 1, "c");

    assert!(list.remove(&id(1, "b")).is_some());
    assert!(list.remove(&id(1, "b")).is_none());
    assert_eq!(keys(&list), vec!["1:c", "1:a"]);

    // Slots freed by removal are reused without disturbing order.
    push(&mut list, &mut clock, 1, "d");
    assert_eq!(keys(&list), vec!["1:d", "1:c", "1:a"]);
    assert_eq!(list.len(), 3);
  }

  #[test]
  fn get_mut_does_not_reorder() {
    let mut clock = Clock::new();
    let mut list: LruList<u32> = LruList::new();
    list.push_front(CacheEntry::new(id(1, "a"), clock.now(), 1)).unwrap();
    list.push_front(CacheEntry::new(id(1, "b"), clock.now(), 1)).unwrap();

    list.get_mut(&id(1, "a")).unwrap().meta += 1;

    assert_eq!(list.peek_back().map(|e| (e.id.clone(), e.meta)), Some((id(1, "a"), 2)));
  }
}
