use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

/// Shared stop flag for one worker set.
///
/// Workers poll [`is_cancelled`](Self::is_cancelled) between bounded waits, and
/// can also `select!` on [`cancelled`](Self::cancelled) around a send that may
/// block on a full channel. The first fault recorded through
/// [`trip`](Self::trip) is kept for diagnostics.
#[derive(Debug, Clone)]
pub struct Cancellation {
    flag: Arc<watch::Sender<bool>>,
    fault: Arc<Mutex<Option<String>>>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
            fault: Arc::new(Mutex::new(None)),
        }
    }

    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }

    /// Record `reason` (if it is the first fault) and cancel.
    pub fn trip(&self, reason: impl Into<String>) {
        {
            let mut fault = self.fault.lock().unwrap_or_else(PoisonError::into_inner);
            if fault.is_none() {
                *fault = Some(reason.into());
            }
        }
        self.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    pub fn fault(&self) -> Option<String> {
        self.fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolves once the flag is raised.
    pub async fn cancelled(&self) {
        let mut rx = self.flag.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let cancel = Cancellation::new();
        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { cancel.cancelled().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }

    #[test]
    fn first_fault_wins() {
        let cancel = Cancellation::new();
        cancel.trip("link lost");
        cancel.trip("second");
        assert!(cancel.is_cancelled());
        assert_eq!(cancel.fault().as_deref(), Some("link lost"));
    }
}
