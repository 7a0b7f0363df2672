//! Nonce manager for concurrent transaction handling.
//!
//! Prevents nonce collisions when sending multiple transactions in parallel
//! by caching the next nonce per `(account, key)` and handing out values
//! under a lock. The first caller for a key starts a chain fetch; callers
//! arriving while it is in flight await the same shared future instead of
//! issuing their own request.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::debug;

use crate::error::RpcError;
use crate::types::{AccountId, PublicKey};

type NonceKey = (AccountId, PublicKey);
type PendingFetch = Shared<BoxFuture<'static, Result<u64, RpcError>>>;

enum Slot {
    /// Next nonce to hand out.
    Ready(u64),
    /// A chain fetch is in flight. `id` tells a settling waiter whether the
    /// slot still belongs to its fetch.
    Pending { id: u64, fetch: PendingFetch },
}

#[derive(Default)]
struct State {
    slots: HashMap<NonceKey, Slot>,
    next_fetch_id: u64,
}

impl State {
    /// Allocate from a fetched chain nonce, respecting anything already
    /// allocated since the fetch started.
    fn settle(&mut self, key: NonceKey, chain_nonce: u64) -> u64 {
        let candidate = chain_nonce + 1;
        match self.slots.get_mut(&key) {
            Some(Slot::Ready(next)) => {
                let nonce = (*next).max(candidate);
                *next = nonce + 1;
                nonce
            }
            _ => {
                debug!(account_id = %key.0, public_key = %key.1, chain_nonce, "nonce cache settled");
                self.slots.insert(key, Slot::Ready(candidate + 1));
                candidate
            }
        }
    }
}

/// Manages nonces for concurrent transactions.
///
/// Each [`Near`](crate::Near) client owns one, so separate clients never
/// share cached state.
#[derive(Default)]
pub struct NonceManager {
    state: Mutex<State>,
}

impl NonceManager {
    /// Create a new nonce manager.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // The critical sections never panic midway, so a poisoned lock still
        // holds consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the next nonce for an account and public key.
    ///
    /// The first call for a key runs `fetch_from_chain`, which must resolve
    /// to the access key's current on-chain nonce. Concurrent callers share
    /// that fetch. Afterwards values come from the cache, each one greater
    /// than the last.
    ///
    /// A failed fetch is returned to every waiter and the pending entry is
    /// removed, so the next call fetches again.
    pub async fn get_next_nonce<F, Fut>(
        &self,
        account_id: &AccountId,
        public_key: &PublicKey,
        fetch_from_chain: F,
    ) -> Result<u64, RpcError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u64, RpcError>> + Send + 'static,
    {
        let key = (account_id.clone(), public_key.clone());

        let (id, fetch) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            match state.slots.get_mut(&key) {
                Some(Slot::Ready(next)) => {
                    let nonce = *next;
                    *next += 1;
                    return Ok(nonce);
                }
                Some(Slot::Pending { id, fetch }) => (*id, fetch.clone()),
                None => {
                    let id = state.next_fetch_id;
                    state.next_fetch_id += 1;
                    debug!(%account_id, %public_key, "fetching nonce from chain");
                    let fetch = fetch_from_chain().boxed().shared();
                    state.slots.insert(
                        key.clone(),
                        Slot::Pending {
                            id,
                            fetch: fetch.clone(),
                        },
                    );
                    (id, fetch)
                }
            }
        };

        let result = fetch.await;

        let mut state = self.lock();
        match result {
            Ok(chain_nonce) => Ok(state.settle(key, chain_nonce)),
            Err(e) => {
                if matches!(state.slots.get(&key), Some(Slot::Pending { id: pending, .. }) if *pending == id)
                {
                    state.slots.remove(&key);
                }
                debug!(%account_id, %public_key, error = %e, "nonce fetch failed");
                Err(e)
            }
        }
    }

    /// Drop the cached nonce for an account and public key.
    ///
    /// The next [`get_next_nonce`](Self::get_next_nonce) fetches again.
    /// Nonces already handed out are not reclaimed.
    pub fn invalidate(&self, account_id: &AccountId, public_key: &PublicKey) {
        debug!(%account_id, %public_key, "nonce cache invalidated");
        self.lock()
            .slots
            .remove(&(account_id.clone(), public_key.clone()));
    }

    /// Reconcile with the access key nonce reported by an invalid-nonce
    /// error and allocate from it.
    ///
    /// Returns `max(current_nonce + 1, cached)` and advances the cache past
    /// it. On a tie the cached value is used.
    pub fn update_and_get_next(
        &self,
        account_id: &AccountId,
        public_key: &PublicKey,
        current_nonce: u64,
    ) -> u64 {
        let key = (account_id.clone(), public_key.clone());
        let candidate = current_nonce + 1;

        let mut state = self.lock();
        if let Some(Slot::Ready(next)) = state.slots.get_mut(&key) {
            let nonce = if candidate > *next { candidate } else { *next };
            *next = nonce + 1;
            return nonce;
        }

        // No usable entry. Waiters on an in-flight fetch will settle against
        // this value instead of resetting below it.
        state.slots.insert(key, Slot::Ready(candidate + 1));
        candidate
    }

    /// Forget every cached nonce.
    pub fn clear(&self) {
        self.lock().slots.clear();
    }
}

impl std::fmt::Debug for NonceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        let pending = state
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Pending { .. }))
            .count();
        f.debug_struct("NonceManager")
            .field("keys", &state.slots.len())
            .field("pending", &pending)
            .finish()
    }
}
