//! Lifecycle control shared by the long-running workers.
//!
//! Each worker owns a [`WorkerControl`]; clones of it are handed to whoever
//! needs to pause, resume or stop the worker. Control is cooperative: the
//! worker calls [`WorkerControl::checkpoint`] at each iteration boundary and
//! waits through [`WorkerControl::sleep`], so requests take effect within one
//! iteration.
//!
//! # State Machine
//!
//! ```text
//! Idle --[first checkpoint]--> Running
//! Running --[pause]--> Paused
//! Paused --[resume]--> Running
//! Running | Paused --[stop / finish / failure]--> Stopped (terminal)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Period at which a paused worker re-checks its control flags.
pub const CONTROL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    /// Created, not yet started.
    Idle,
    /// Doing work.
    Running,
    /// Suspended at an iteration boundary.
    Paused,
    /// Finished, stopped or failed. Terminal.
    Stopped,
}

impl WorkerState {
    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Running => "running",
            WorkerState::Paused => "paused",
            WorkerState::Stopped => "stopped",
        }
    }
}

#[derive(Debug)]
struct ControlInner {
    cancel: CancellationToken,
    paused: AtomicBool,
    state: watch::Sender<WorkerState>,
}

/// Handle for controlling one worker.
///
/// Cheap to clone; all clones refer to the same worker.
#[derive(Debug, Clone)]
pub struct WorkerControl {
    inner: Arc<ControlInner>,
}

impl Default for WorkerControl {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerControl {
    /// Creates a control handle in the `Idle` state.
    pub fn new() -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            inner: Arc::new(ControlInner {
                cancel: CancellationToken::new(),
                paused: AtomicBool::new(false),
                state,
            }),
        }
    }

    /// Requests a pause at the next iteration boundary.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    /// Clears a pending or active pause.
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    /// Requests the worker to stop.
    pub fn stop(&self) {
        self.inner.cancel.cancel();
    }

    /// Returns `true` if a pause is requested.
    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Returns `true` once stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Current state.
    pub fn state(&self) -> WorkerState {
        *self.inner.state.borrow()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.inner.state.subscribe()
    }

    /// Moves to `next` unless already `Stopped`.
    pub(crate) fn set_state(&self, next: WorkerState) {
        self.inner.state.send_if_modified(|current| {
            if *current == WorkerState::Stopped || *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Marks the worker as terminated.
    pub(crate) fn mark_stopped(&self) {
        self.set_state(WorkerState::Stopped);
    }

    /// Iteration boundary: honours pause and stop.
    ///
    /// Blocks while paused. Returns `false` if the worker should exit.
    pub async fn checkpoint(&self) -> bool {
        loop {
            if self.is_stop_requested() {
                return false;
            }
            if !self.is_paused() {
                self.set_state(WorkerState::Running);
                return true;
            }

            self.set_state(WorkerState::Paused);
            tokio::select! {
                biased;
                _ = self.inner.cancel.cancelled() => return false,
                _ = tokio::time::sleep(CONTROL_POLL_INTERVAL) => {}
            }
        }
    }

    /// Waits for `duration` unless stop is requested first.
    ///
    /// Returns `false` if interrupted by stop.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            tokio::task::yield_now().await;
            return !self.is_stop_requested();
        }
        tokio::select! {
            biased;
            _ = self.inner.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Waits up to `timeout` for the worker to reach `Stopped`.
    ///
    /// Returns `true` if it did.
    pub async fn wait_stopped(&self, timeout: Duration) -> bool {
        let mut rx = self.subscribe();
        let reached = tokio::time::timeout(timeout, rx.wait_for(|s| *s == WorkerState::Stopped))
            .await
            .map(|waited| waited.is_ok());
        match reached {
            Ok(true) => true,
            Ok(false) => self.state() == WorkerState::Stopped,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_state_is_idle() {
        let control = WorkerControl::new();
        assert_eq!(control.state(), WorkerState::Idle);
        assert!(!control.is_paused());
        assert!(!control.is_stop_requested());
    }

    #[tokio::test]
    async fn test_checkpoint_enters_running() {
        let control = WorkerControl::new();
        assert!(control.checkpoint().await);
        assert_eq!(control.state(), WorkerState::Running);
    }

    #[tokio::test]
    async fn test_checkpoint_after_stop() {
        let control = WorkerControl::new();
        control.stop();
        assert!(!control.checkpoint().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_blocks_until_resume() {
        let control = WorkerControl::new();
        control.pause();

        let worker = control.clone();
        let handle = tokio::spawn(async move { worker.checkpoint().await });

        let mut rx = control.subscribe();
        rx.wait_for(|s| *s == WorkerState::Paused).await.unwrap();
        assert!(!handle.is_finished());

        control.resume();
        assert!(handle.await.unwrap());
        assert_eq!(control.state(), WorkerState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_paused() {
        let control = WorkerControl::new();
        control.pause();

        let worker = control.clone();
        let handle = tokio::spawn(async move { worker.checkpoint().await });
        tokio::time::sleep(Duration::from_millis(250)).await;

        control.stop();
        assert!(!handle.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_stop() {
        let control = WorkerControl::new();
        let worker = control.clone();
        let handle = tokio::spawn(async move { worker.sleep(Duration::from_secs(3600)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        control.stop();
        assert!(!handle.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes() {
        let control = WorkerControl::new();
        assert!(control.sleep(Duration::from_millis(50)).await);
        assert!(control.sleep(Duration::ZERO).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_stopped() {
        let control = WorkerControl::new();
        assert!(!control.wait_stopped(Duration::from_millis(200)).await);

        control.mark_stopped();
        assert!(control.wait_stopped(Duration::from_millis(200)).await);
    }

    #[tokio::test]
    async fn test_stopped_is_terminal() {
        let control = WorkerControl::new();
        control.mark_stopped();
        control.set_state(WorkerState::Running);
        assert_eq!(control.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(WorkerState::Paused.label(), "paused");
        assert_eq!(WorkerState::Stopped.label(), "stopped");
    }
}
