//! Request order: serialized, rate-limited access to the sheet API.
//!
//! Design:
//! - FIFO queue of waiters + a single active slot.
//! - `reserve()` enqueues synchronously, so call order == grant order.
//! - A slot is granted no earlier than `interval` after the previous grant
//!   (measured from grant time, not from release).
//! - Releasing (dropping) the slot hands the turn to the next waiter.
//! - With no waiters the order goes idle: no timer, no polling.
//!
//! Invariant: at most one `Slot` is alive at any time (`active` is true
//! from the moment a grant is scheduled until the last waiter releases).

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

/// 100 requests per 100 seconds per user.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Shared FIFO rate limiter. Cloning shares the same queue.
#[derive(Clone)]
pub struct RequestOrder {
    shared: Arc<Shared>,
}

struct Shared {
    interval: Duration,
    state: Mutex<OrderState>,
}

#[derive(Default)]
struct OrderState {
    waiters: VecDeque<oneshot::Sender<Slot>>,
    active: bool,
    last_grant: Option<Instant>,
}

impl RequestOrder {
    pub fn new(interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                interval,
                state: Mutex::new(OrderState::default()),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// Take a place in the queue. The returned ticket resolves to a `Slot`
    /// once it is this caller's turn.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn reserve(&self) -> Ticket {
        let (tx, rx) = oneshot::channel();
        let mut state = self.shared.lock();
        state.waiters.push_back(tx);
        if !state.active {
            state.active = true;
            self.shared.grant_next(&mut state);
        }
        Ticket { rx }
    }

    /// Number of callers waiting for a slot (excluding the active one).
    pub fn queued(&self) -> usize {
        self.shared.lock().waiters.len()
    }
}

impl Default for RequestOrder {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, OrderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedule the grant for the next waiter, or go idle.
    fn grant_next(self: &Arc<Self>, state: &mut OrderState) {
        let Some(tx) = state.waiters.pop_front() else {
            state.active = false;
            return;
        };
        let not_before = state.last_grant.map(|at| at + self.interval);
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(at) = not_before {
                tokio::time::sleep_until(at).await;
            }
            let granted_at = Instant::now();
            shared.lock().last_grant = Some(granted_at);
            let slot = Slot {
                shared: Some(Arc::clone(&shared)),
                granted_at,
            };
            // The waiter gave up: the returned slot is dropped right here and
            // passes the turn on.
            let _ = tx.send(slot);
        });
    }

    fn release(self: &Arc<Self>) {
        let mut state = self.lock();
        self.grant_next(&mut state);
    }
}

/// A place in the queue. Resolves to the `Slot` when it is this caller's turn.
pub struct Ticket {
    rx: oneshot::Receiver<Slot>,
}

impl Future for Ticket {
    type Output = Slot;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(slot)) => Poll::Ready(slot),
            // Grant task was torn down with the runtime; nothing left to order against.
            Poll::Ready(Err(_)) => Poll::Ready(Slot::detached()),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// The right to issue one sheet request. Dropping it releases the turn.
#[must_use = "the turn is released as soon as the slot is dropped"]
pub struct Slot {
    shared: Option<Arc<Shared>>,
    granted_at: Instant,
}

impl Slot {
    fn detached() -> Self {
        Self {
            shared: None,
            granted_at: Instant::now(),
        }
    }

    pub fn granted_at(&self) -> Instant {
        self.granted_at
    }

    /// Explicit release, same as dropping.
    pub fn release(self) {}
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.release();
        }
    }
}
