//! Server lifecycle state, in-flight request tracking and drain.
//!
//! The health state only ever moves forward (Starting, Ready, Draining,
//! Stopped) and is published on a `watch` channel so the serve loop can
//! wait for shutdown. A fatal store fault triggers the same shutdown but
//! also records a reason the process reports on exit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::sync::{watch, Notify};
use tracing::error;

/// Server health state, ordered by lifecycle position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthState {
    /// Listener not yet serving.
    Starting,
    /// Accepting requests.
    Ready,
    /// Refusing new requests while in-flight ones finish.
    Draining,
    /// Every in-flight request has finished.
    Stopped,
}

impl HealthState {
    /// Lowercase name used in health responses.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Default)]
struct InFlight {
    count: AtomicU64,
    idle: Notify,
}

/// Shared lifecycle controller for the HTTP server.
#[derive(Debug)]
pub struct ShutdownController {
    state: watch::Sender<HealthState>,
    in_flight: Arc<InFlight>,
    fatal_reason: ArcSwapOption<String>,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    /// Creates a controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(HealthState::Starting);
        Self {
            state,
            in_flight: Arc::default(),
            fatal_reason: ArcSwapOption::empty(),
        }
    }

    /// Moves the state forward to `to`. Returns `false` if the state is
    /// already at or past it.
    fn advance(&self, to: HealthState) -> bool {
        self.state.send_if_modified(|state| {
            if *state < to {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Marks the server ready. No effect once shutdown has begun.
    pub fn set_ready(&self) {
        self.advance(HealthState::Ready);
    }

    /// Starts draining: new requests are refused from here on.
    pub fn trigger_shutdown(&self) {
        self.advance(HealthState::Draining);
    }

    /// Shuts down because the store can no longer be trusted.
    ///
    /// The first reason is kept; later calls only log.
    pub fn trigger_fatal(&self, reason: impl Into<String>) {
        let reason = reason.into();
        error!(%reason, "fatal fault, shutting down");
        let _previous = self
            .fatal_reason
            .compare_and_swap(&None::<Arc<String>>, Some(Arc::new(reason)));
        self.trigger_shutdown();
    }

    /// Reason given to the first `trigger_fatal()` call, if any.
    #[must_use]
    pub fn fatal_reason(&self) -> Option<String> {
        self.fatal_reason.load_full().map(|r| (*r).clone())
    }

    /// Resolves once the server is draining or stopped.
    pub async fn shutdown_signalled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|state| *state >= HealthState::Draining).await;
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        *self.state.borrow()
    }

    /// Counts a request as in flight until the returned guard drops.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.count.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.count.load(Ordering::Acquire)
    }

    /// Waits up to `timeout` for the in-flight count to reach zero, then
    /// moves to `Stopped`. Returns `false` (state unchanged) on timeout.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let idle = async {
            loop {
                // Registered before the check so a guard dropped in between
                // still wakes us.
                let notified = self.in_flight.idle.notified();
                if self.in_flight_count() == 0 {
                    return;
                }
                notified.await;
            }
        };

        let drained = tokio::time::timeout(timeout, idle).await.is_ok();
        if drained {
            self.advance(HealthState::Stopped);
        }
        drained
    }
}

/// Releases one in-flight slot on drop, panics included.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.in_flight.idle.notify_waiters();
        }
    }
}
