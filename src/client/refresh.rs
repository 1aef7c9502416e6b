//! Single-flight token refresh.
//!
//! Every caller that sees a 401 goes through [`RefreshCoordinator::refresh`].
//! The first one starts the refresh and parks it in the slot; the others
//! await the same shared future. The slot is emptied once it settles.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    #[error("refresh rejected by server")]
    Rejected,
    #[error("refresh timed out")]
    TimedOut,
    #[error("refresh transport failure")]
    Transport,
}

pub type RefreshOutcome = Result<(), RefreshFailure>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Default)]
pub struct RefreshCoordinator {
    slot: Mutex<Option<SharedRefresh>>,
    /// Bumped after every successful refresh.
    generation: AtomicU64,
    started: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation to remember before sending a request.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Number of refreshes actually started.
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Acquire)
    }

    pub fn in_flight(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Join the in-flight refresh or start one with `start`.
    ///
    /// `seen` is the generation observed when the failed request was sent.
    /// If a refresh already succeeded since then and none is running, the
    /// caller's credentials are fresh and it can retry straight away.
    pub async fn refresh<F>(&self, seen: u64, start: F) -> RefreshOutcome
    where
        F: FnOnce() -> BoxFuture<'static, RefreshOutcome>,
    {
        let shared = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                // A settled future left behind by a cancelled waiter is stale.
                Some(running) if running.peek().is_none() => running.clone(),
                _ => {
                    if self.generation() != seen {
                        *slot = None;
                        return Ok(());
                    }
                    let fresh = start().shared();
                    *slot = Some(fresh.clone());
                    self.started.fetch_add(1, Ordering::AcqRel);
                    fresh
                }
            }
        };

        let outcome = shared.clone().await;

        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&shared)) {
            if outcome.is_ok() {
                self.generation.fetch_add(1, Ordering::AcqRel);
            }
            *slot = None;
        }
        outcome
    }
}
