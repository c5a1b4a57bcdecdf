use ahash::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

/// A bounded FIFO record of keys a tenant recently lost to eviction.
///
/// Once full, recording a new victim forgets the oldest one. A key evicted
/// twice within the window appears twice, so membership is reference counted.
#[derive(Debug)]
pub(crate) struct VictimQueue {
  order: VecDeque<Arc<str>>,
  members: HashMap<Arc<str>, u32>,
  capacity: usize,
}

impl VictimQueue {
  pub(crate) fn new(capacity: usize) -> Self {
    Self {
      order: VecDeque::with_capacity(capacity),
      members: HashMap::default(),
      capacity,
    }
  }

  pub(crate) fn contains(&self, key: &str) -> bool {
    self.members.contains_key(key)
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.order.len()
  }

  pub(crate) fn record(&mut self, key: Arc<str>) {
    *self.members.entry(key.clone()).or_insert(0) += 1;
    self.order.push_back(key);

    while self.order.len() > self.capacity {
      let Some(oldest) = self.order.pop_front() else {
        break;
      };
      if let Some(count) = self.members.get_mut(&oldest) {
        *count -= 1;
        if *count == 0 {
          self.members.remove(&oldest);
        }
      }
    }
  }
}
