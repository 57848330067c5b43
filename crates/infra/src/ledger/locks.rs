use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use stockledger_core::ProductId;

/// Keyed async mutex: one lock per product.
///
/// Writers of the same product queue up; writers of different products do not
/// contend. The guard releases on drop, on every exit path.
#[derive(Debug, Default)]
pub(crate) struct ProductLocks {
    locks: Mutex<HashMap<ProductId, Arc<AsyncMutex<()>>>>,
}

impl ProductLocks {
    pub(crate) async fn acquire(&self, product_id: ProductId) -> OwnedMutexGuard<()> {
        let lock = {
            // The map only holds lock handles, so a poisoned map is still usable.
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop handles nobody holds or waits on.
            locks.retain(|id, lock| *id == product_id || Arc::strong_count(lock) > 1);
            locks.entry(product_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
