//! Single-shot completion signal.
//!
//! A [`Completion`] is resolved exactly once, either explicitly via [`Completion::complete`] or
//! implicitly when it is dropped. Any number of [`CompletionListener`]s may observe it, and a
//! listener created or polled after resolution returns immediately.
//!
//! Used for both the read loop's "done" signal and the external interrupt.

use tokio::sync::watch;

/// Construct a linked [`Completion`] and [`CompletionListener`] pair.
pub fn completion() -> (Completion, CompletionListener) {
    let (tx, rx) = watch::channel(false);
    (Completion { tx }, CompletionListener { rx })
}

/// Resolving half of a completion signal. Resolves on drop.
#[derive(Debug)]
pub struct Completion {
    tx: watch::Sender<bool>,
}

impl Completion {
    /// Resolve the signal. Subsequent calls are no-ops.
    pub fn complete(&self) {
        self.tx.send_if_modified(|completed| !std::mem::replace(completed, true));
    }

    /// Construct an additional [`CompletionListener`] for this signal.
    pub fn listener(&self) -> CompletionListener {
        CompletionListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.complete();
    }
}

/// Observing half of a completion signal.
#[derive(Debug, Clone)]
pub struct CompletionListener {
    rx: watch::Receiver<bool>,
}

impl CompletionListener {
    /// Non-blocking check of whether the signal has resolved.
    pub fn is_complete(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait until the signal resolves.
    pub async fn completed(&mut self) {
        // Err means the Completion was dropped, which also resolves the signal
        let _ = self.rx.wait_for(|completed| *completed).await;
    }
}
