// orderflow/src/workflow/locks.rs

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Per-order advisory locks.
///
/// Everything that reads an order, decides, and writes it back holds the
/// order's lock for the whole sequence, so two deliveries for the same order
/// in this process never interleave. Slots are created on demand and removed
/// once nobody holds or waits for them.
#[derive(Debug, Clone, Default)]
pub struct OrderLocks {
  slots: Slots,
}

impl OrderLocks {
  pub fn new() -> Self {
    Self::default()
  }

  /// Waits until `order_id` is free and returns its guard.
  pub async fn lock(&self, order_id: &str) -> OrderGuard {
    let slot = {
      let mut slots = self.slots.lock();
      slots.entry(order_id.to_string()).or_default().clone()
    };
    let guard = slot.lock_owned().await;
    OrderGuard {
      order_id: order_id.to_string(),
      slots: self.slots.clone(),
      guard: Some(guard),
    }
  }

  /// Number of orders currently locked or waited on.
  pub fn active(&self) -> usize {
    self.slots.lock().len()
  }
}

#[derive(Debug)]
pub struct OrderGuard {
  order_id: String,
  slots: Slots,
  guard: Option<OwnedMutexGuard<()>>,
}

impl OrderGuard {
  pub fn order_id(&self) -> &str {
    &self.order_id
  }
}

impl Drop for OrderGuard {
  fn drop(&mut self) {
    // Waiters clone the slot under the map lock, so holding it here makes the
    // count check exact.
    let mut slots = self.slots.lock();
    self.guard.take();
    let idle = slots
      .get(&self.order_id)
      .map_or(false, |slot| Arc::strong_count(slot) == 1);
    if idle {
      slots.remove(&self.order_id);
    }
  }
}
