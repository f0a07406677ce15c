use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::observability::sanitize_payment_hash;

/// Registry of tasks waiting for a payment hash to settle.
///
/// Whoever learns of a payment's completion calls [`resolve_payment`]; every
/// live [`PaymentWaiter`] registered for that hash receives its own copy of
/// the preimage. Registration never blocks and resolution never waits on a
/// receiver.
///
/// [`resolve_payment`]: PaymentBroker::resolve_payment
#[derive(Debug, Default)]
pub struct PaymentBroker {
    waiters: Mutex<HashMap<String, Vec<oneshot::Sender<String>>>>,
}

/// Single-use receive handle returned by [`PaymentBroker::wait_for_payment`]
#[derive(Debug)]
pub struct PaymentWaiter {
    payment_hash: String,
    rx: oneshot::Receiver<String>,
}

impl PaymentWaiter {
    pub fn payment_hash(&self) -> &str {
        &self.payment_hash
    }

    /// Suspend until the preimage is delivered
    pub async fn wait(self) -> Result<String, AppError> {
        self.rx.await.map_err(|_| {
            AppError::internal_error(format!(
                "waiter for {} was discarded without a result",
                self.payment_hash
            ))
        })
    }

    pub async fn wait_timeout(self, timeout: Duration) -> Result<String, AppError> {
        let payment_hash = self.payment_hash.clone();
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::payment_failed(format!(
                "no confirmation for payment {} after {}s",
                payment_hash,
                timeout.as_secs()
            ))),
        }
    }
}

impl PaymentBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<oneshot::Sender<String>>>> {
        // The map stays consistent across a panicking holder, every mutation
        // is a single insert/remove/push
        self.waiters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new waiter for `payment_hash`
    pub fn wait_for_payment(&self, payment_hash: &str) -> PaymentWaiter {
        let (tx, rx) = oneshot::channel();

        let mut waiters = self.lock();
        let entry = waiters.entry(payment_hash.to_string()).or_default();
        // Handles dropped before resolution would otherwise pile up
        entry.retain(|tx| !tx.is_closed());
        entry.push(tx);

        debug!(
            payment_hash = %sanitize_payment_hash(payment_hash),
            waiters = entry.len(),
            "Registered payment waiter"
        );

        PaymentWaiter {
            payment_hash: payment_hash.to_string(),
            rx,
        }
    }

    /// Deliver `preimage` to every live waiter of `payment_hash` and forget
    /// the hash. Returns how many waiters received it; resolving a hash
    /// nobody waits for is a no-op.
    pub fn resolve_payment(&self, payment_hash: &str, preimage: &str) -> usize {
        let Some(senders) = self.lock().remove(payment_hash) else {
            debug!(
                payment_hash = %sanitize_payment_hash(payment_hash),
                "No waiters for resolved payment"
            );
            return 0;
        };

        let registered = senders.len();
        let delivered = senders
            .into_iter()
            .filter(|tx| !tx.is_closed())
            .filter_map(|tx| tx.send(preimage.to_string()).ok())
            .count();

        if delivered < registered {
            warn!(
                payment_hash = %sanitize_payment_hash(payment_hash),
                registered,
                delivered,
                "Some payment waiters were gone before resolution"
            );
        } else {
            debug!(
                payment_hash = %sanitize_payment_hash(payment_hash),
                delivered,
                "Payment resolved"
            );
        }

        delivered
    }

    /// Give up on a waiter, e.g. because its payment was never submitted.
    /// Other waiters of the same hash are untouched.
    pub fn discard(&self, waiter: PaymentWaiter) {
        let PaymentWaiter { payment_hash, rx } = waiter;
        drop(rx);

        let mut waiters = self.lock();
        if let Some(entry) = waiters.get_mut(&payment_hash) {
            entry.retain(|tx| !tx.is_closed());
            if entry.is_empty() {
                waiters.remove(&payment_hash);
            }
        }
    }

    /// Number of hashes with at least one registered waiter
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }
}
