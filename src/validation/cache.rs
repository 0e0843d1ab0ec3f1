use crate::crypto::Certificate;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

type Slot = Arc<OnceCell<Arc<Certificate>>>;

/// Enrollment certificates of other parties, keyed by party id
///
/// The map lock is only held to find, create or release a party's slot. The
/// slot itself is a `OnceCell`, so concurrent lookups for the same party wait
/// on a single fetch instead of each hitting the directory. Only resolved
/// certificates stay in the map: once every lookup waiting on a failed fetch
/// is done, the slot is removed and the next lookup starts over.
pub struct CertificateCache {
    slots: Mutex<HashMap<Vec<u8>, Slot>>,
}

impl CertificateCache {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, party_id: &[u8]) -> Option<Arc<Certificate>> {
        let slots = self.slots.lock().await;
        slots.get(party_id).and_then(|slot| slot.get().cloned())
    }

    pub async fn get_or_fetch<F, Fut, E>(&self, party_id: &[u8], fetch: F) -> Result<Arc<Certificate>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Certificate, E>>,
    {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(party_id.to_vec()).or_default().clone()
        };

        let fetched = slot
            .get_or_try_init(move || async move { fetch().await.map(Arc::new) })
            .await
            .cloned();
        if fetched.is_err() {
            self.release(party_id, slot).await;
        }
        fetched
    }

    /// Drop the slot of a failed fetch, unless another lookup still holds it.
    ///
    /// Every holder lets go of its handle under the map lock, so the last
    /// failing lookup is the one that sees the map as sole owner.
    async fn release(&self, party_id: &[u8], slot: Slot) {
        let mut slots = self.slots.lock().await;
        let Some(current) = slots.get(party_id) else {
            return;
        };
        let ours = Arc::ptr_eq(current, &slot);
        drop(slot);
        if ours && !current.initialized() && Arc::strong_count(current) == 1 {
            slots.remove(party_id);
        }
    }

    /// Number of resolved certificates
    pub async fn len(&self) -> usize {
        let slots = self.slots.lock().await;
        slots.values().filter(|slot| slot.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of parties with a slot, resolved or in flight
    pub async fn slot_count(&self) -> usize {
        self.slots.lock().await.len()
    }
}

impl Default for CertificateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, KeyPair, PKCS_ECDSA_P256_SHA256};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn certificate() -> Certificate {
        let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
        let cert = CertificateParams::default().self_signed(&key).unwrap();
        Certificate::from_der(cert.der()).unwrap()
    }

    #[tokio::test]
    async fn fetches_once_per_party() {
        let cache = CertificateCache::new();
        let fetches = AtomicUsize::new(0);
        let cert = certificate();

        for _ in 0..3 {
            let fetched = cache
                .get_or_fetch(b"alice", || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(cert.clone())
                })
                .await
                .unwrap();
            assert_eq!(*fetched, cert);
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get(b"alice").await.is_some());
        assert!(cache.get(b"bob").await.is_none());
    }

    #[tokio::test]
    async fn failed_fetch_is_retried() {
        let cache = CertificateCache::new();

        let failed = cache
            .get_or_fetch(b"alice", || async { Err::<Certificate, _>("directory down") })
            .await;
        assert_eq!(failed.unwrap_err(), "directory down");
        assert_eq!(cache.len().await, 0);
        assert_eq!(cache.slot_count().await, 0);

        let cert = certificate();
        let fetched = cache
            .get_or_fetch(b"alice", || async { Ok::<_, &str>(cert.clone()) })
            .await
            .unwrap();
        assert_eq!(*fetched, cert);
    }

    #[tokio::test]
    async fn failed_lookups_leave_no_slots() {
        let cache = CertificateCache::new();
        for i in 0u32..100 {
            let result = cache
                .get_or_fetch(&i.to_be_bytes(), || async { Err::<Certificate, _>("not found") })
                .await;
            assert!(result.is_err());
        }
        assert_eq!(cache.slot_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_failures_leave_no_slots() {
        let cache = Arc::new(CertificateCache::new());
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let cache = cache.clone();
            tasks.spawn(async move {
                cache
                    .get_or_fetch(b"ghost", || async {
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        Err::<Certificate, _>("not found")
                    })
                    .await
            });
        }
        while let Some(result) = tasks.join_next().await {
            assert!(result.unwrap().is_err());
        }
        assert_eq!(cache.slot_count().await, 0);
    }
}
