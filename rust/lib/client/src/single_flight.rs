use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

type Flight<T> = Shared<BoxFuture<'static, T>>;

/// Collapses concurrent runs of the same operation into one.
///
/// While a flight is pending, every caller of [`run`](Self::run) awaits the
/// same future and receives a clone of its output. The slot is emptied by
/// the flight itself as it completes, so a call made after completion starts
/// a new flight instead of reusing the old result.
pub struct SingleFlight<T: Clone> {
    slot: Arc<Mutex<Option<(u64, Flight<T>)>>>,
    next_id: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Join the pending flight, or start one from `start`.
    ///
    /// `start` is only invoked when no flight is pending.
    pub async fn run<F, Fut>(&self, start: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some((_, pending)) => pending.clone(),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let work = start();
                    let slot_ref = Arc::clone(&self.slot);
                    let flight = async move {
                        let out = work.await;
                        let mut slot = slot_ref.lock().unwrap_or_else(PoisonError::into_inner);
                        if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
                            *slot = None;
                        }
                        out
                    }
                    .boxed()
                    .shared();
                    *slot = Some((id, flight.clone()));
                    flight
                }
            }
        };
        flight.await
    }

    /// Whether a flight is pending.
    pub fn in_flight(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}
