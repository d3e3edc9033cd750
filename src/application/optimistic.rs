use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::errors::DomainError;

use super::store::VoucherStore;

pub(crate) fn lock(state: &Mutex<VoucherStore>) -> MutexGuard<'_, VoucherStore> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs one optimistic mutation against the local store.
///
/// 1. Snapshot the store and run `apply` under the lock. `apply` checks its
///    preconditions, mutates, and returns whatever the remote step needs.
///    If it fails the snapshot is put back and nothing is sent.
/// 2. Await `remote` with that plan. The lock is not held here.
/// 3. If the remote step fails the snapshot is put back and the error is
///    returned unchanged.
///
/// The restore is a whole-store swap. Callers hold the service's writer lock
/// for the whole call, so no other mutation lands while `remote` is pending.
pub async fn optimistic<P, T, A, R, F>(
    state: &Mutex<VoucherStore>,
    label: &str,
    apply: A,
    remote: R,
) -> Result<T, DomainError>
where
    A: FnOnce(&mut VoucherStore) -> Result<P, DomainError>,
    R: FnOnce(P) -> F,
    F: Future<Output = Result<T, DomainError>>,
{
    let (snapshot, plan) = {
        let mut store = lock(state);
        let snapshot = store.clone();
        match apply(&mut store) {
            Ok(plan) => (snapshot, plan),
            Err(e) => {
                *store = snapshot;
                return Err(e);
            }
        }
    };

    match remote(plan).await {
        Ok(value) => Ok(value),
        Err(e) => {
            log::warn!("{label}: remote call failed, restoring local state: {e}");
            *lock(state) = snapshot;
            Err(e)
        }
    }
}
