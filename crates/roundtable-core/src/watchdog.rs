//! Wall-clock bound around a whole conversation.
//!
//! Callers arm a [`Watchdog`] and race the returned [`Deadline`] against the
//! work they want bounded. Two backends exist:
//!
//! - [`SignalWatchdog`] (unix): an `alarm(2)` timer delivering `SIGALRM`,
//!   received through tokio's signal driver.
//! - [`ThreadWatchdog`]: a background thread waiting on a channel with a
//!   timeout.
//!
//! A deadline fires at most once. Disarming twice, or after expiry, is a no-op.

use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Errors from arming a watchdog.
#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    #[error("failed to listen for SIGALRM: {0}")]
    Signal(#[source] std::io::Error),

    #[error("failed to spawn watchdog thread: {0}")]
    Thread(#[source] std::io::Error),

    #[error("{0} watchdog is already armed")]
    AlreadyArmed(&'static str),

    #[error("signal watchdog is not supported on this platform")]
    Unsupported,
}

/// Which backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchdogKind {
    /// Signal-based where supported, thread-based elsewhere.
    #[default]
    Auto,
    Signal,
    Thread,
}

/// Receiving side of a wall-clock bound.
#[derive(Debug, Clone)]
pub struct Deadline {
    rx: watch::Receiver<bool>,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_expired(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the deadline has fired. Pending forever otherwise.
    pub async fn expired(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Trigger dropped without firing.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Sending side; fires the deadline at most once.
#[derive(Debug)]
struct Trigger {
    tx: watch::Sender<bool>,
    backend: &'static str,
}

impl Trigger {
    fn fire(&self) {
        let first = self.tx.send_if_modified(|expired| {
            if *expired {
                false
            } else {
                *expired = true;
                true
            }
        });
        if first {
            warn!(backend = self.backend, "Wall-clock limit reached");
        }
    }
}

fn deadline_pair(backend: &'static str) -> (Trigger, Deadline) {
    let (tx, rx) = watch::channel(false);
    (Trigger { tx, backend }, Deadline { rx })
}

/// A wall-clock bound that can be armed and disarmed.
pub trait Watchdog: Send {
    /// Starts the timer and returns the deadline it will fire.
    fn arm(&mut self, limit: Duration) -> Result<Deadline, WatchdogError>;

    /// Stops the timer. Safe to call repeatedly.
    fn disarm(&mut self);

    fn name(&self) -> &'static str;
}

/// Whole seconds for `alarm(2)`: rounded up, at least one.
fn alarm_seconds(limit: Duration) -> u32 {
    let secs = limit.as_secs() + u64::from(limit.subsec_nanos() > 0);
    u32::try_from(secs.max(1)).unwrap_or(u32::MAX)
}

/// `SIGALRM`-based watchdog. Must be armed inside a tokio runtime.
#[cfg(unix)]
#[derive(Debug, Default)]
pub struct SignalWatchdog {
    listener: Option<tokio::task::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalWatchdog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(unix)]
impl Watchdog for SignalWatchdog {
    fn arm(&mut self, limit: Duration) -> Result<Deadline, WatchdogError> {
        use tokio::signal::unix::{SignalKind, signal};

        if self.listener.is_some() {
            return Err(WatchdogError::AlreadyArmed(self.name()));
        }

        // The listener must exist before the alarm can be delivered.
        let mut alarms = signal(SignalKind::alarm()).map_err(WatchdogError::Signal)?;
        let (trigger, deadline) = deadline_pair(self.name());
        self.listener = Some(tokio::spawn(async move {
            if alarms.recv().await.is_some() {
                trigger.fire();
            }
        }));

        let secs = alarm_seconds(limit);
        nix::unistd::alarm::set(secs);
        debug!(secs, "Signal watchdog armed");
        Ok(deadline)
    }

    fn disarm(&mut self) {
        if let Some(listener) = self.listener.take() {
            nix::unistd::alarm::cancel();
            listener.abort();
            debug!("Signal watchdog disarmed");
        }
    }

    fn name(&self) -> &'static str {
        "signal"
    }
}

#[cfg(unix)]
impl Drop for SignalWatchdog {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Thread-based watchdog, available everywhere.
#[derive(Debug, Default)]
pub struct ThreadWatchdog {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadWatchdog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Watchdog for ThreadWatchdog {
    fn arm(&mut self, limit: Duration) -> Result<Deadline, WatchdogError> {
        if self.handle.is_some() {
            return Err(WatchdogError::AlreadyArmed(self.name()));
        }

        let (trigger, deadline) = deadline_pair(self.name());
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name("roundtable-watchdog".to_string())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = stop_rx.recv_timeout(limit) {
                    trigger.fire();
                }
            })
            .map_err(WatchdogError::Thread)?;

        self.stop = Some(stop_tx);
        self.handle = Some(handle);
        debug!(limit_ms = limit.as_millis() as u64, "Thread watchdog armed");
        Ok(deadline)
    }

    fn disarm(&mut self) {
        // Dropping the sender wakes the thread with a disconnect.
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Watchdog thread panicked");
            }
            debug!("Thread watchdog disarmed");
        }
    }

    fn name(&self) -> &'static str {
        "thread"
    }
}

impl Drop for ThreadWatchdog {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Returns the backend for a preference on this platform.
pub fn select_watchdog(kind: WatchdogKind) -> Box<dyn Watchdog> {
    match kind {
        #[cfg(unix)]
        WatchdogKind::Auto | WatchdogKind::Signal => Box::new(SignalWatchdog::new()),
        #[cfg(not(unix))]
        WatchdogKind::Auto | WatchdogKind::Signal => {
            if kind == WatchdogKind::Signal {
                warn!("Signal watchdog unavailable on this platform, using thread watchdog");
            }
            Box::new(ThreadWatchdog::new())
        }
        WatchdogKind::Thread => Box::new(ThreadWatchdog::new()),
    }
}

/// Selects and arms a watchdog, falling back to the thread backend if the
/// preferred one cannot be armed.
pub fn arm_watchdog(
    kind: WatchdogKind,
    limit: Duration,
) -> Result<(Box<dyn Watchdog>, Deadline), WatchdogError> {
    let mut watchdog = select_watchdog(kind);
    match watchdog.arm(limit) {
        Ok(deadline) => Ok((watchdog, deadline)),
        Err(e) if watchdog.name() != "thread" => {
            warn!(backend = watchdog.name(), error = %e, "Falling back to thread watchdog");
            let mut fallback: Box<dyn Watchdog> = Box::new(ThreadWatchdog::new());
            let deadline = fallback.arm(limit)?;
            Ok((fallback, deadline))
        }
        Err(e) => Err(e),
    }
}
