/// Termination: graceful-then-forced process shutdown.
///
/// Each kill runs a small state machine:
///
/// ```text
/// Running ──SIGTERM──▶ WaitingGraceful ──exited──▶ Exited
///                            │
///                         timeout
///                            │
///                         SIGKILL
///                            ▼
///                      WaitingForced ──exited──▶ Exited
///                            │
///                       grace elapsed
///                            ▼
///                       StillRunning (error)
/// ```
///
/// Liveness checks and signal delivery go through the [`LivenessProbe`] and
/// [`SignalSender`] traits so the timing can be driven by fakes in tests.
pub mod signals;

pub use signals::SystemSignals;
pub use sysinfo::Signal;

use crate::cancel::CancelToken;
use crate::error::TerminationError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Timing knobs for [`TerminationController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminationPolicy {
    /// How long the process gets to exit after SIGTERM.
    pub graceful_timeout: Duration,
    /// Sleep between liveness checks.
    pub poll_interval: Duration,
    /// How long after SIGKILL before the process is declared stuck.
    pub force_grace: Duration,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            graceful_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            force_grace: Duration::from_millis(500),
        }
    }
}

impl TerminationPolicy {
    pub fn with_graceful_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_timeout = timeout;
        self
    }
}

/// Non-destructive existence check.
pub trait LivenessProbe: Send + Sync {
    /// `false` once the process has exited, including zombies.
    fn is_alive(&self, pid: u32) -> bool;
}

/// What happened when a signal was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The process was already gone.
    NoSuchProcess,
}

/// Signal delivery.
pub trait SignalSender: Send + Sync {
    /// `Err` only when the signal could not be sent to an existing process.
    fn send(&self, pid: u32, signal: Signal) -> Result<Delivery, TerminationError>;
}

/// How a successful kill ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// The process was not running when the kill started.
    AlreadyGone,
    /// It exited within the graceful timeout.
    ExitedGracefully,
    /// It needed SIGKILL.
    ExitedAfterForce,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Running,
    WaitingGraceful { deadline: Instant },
    WaitingForced { deadline: Instant },
}

/// Drives the graceful-then-forced termination sequence.
pub struct TerminationController {
    policy: TerminationPolicy,
    probe: Arc<dyn LivenessProbe>,
    sender: Arc<dyn SignalSender>,
}

impl Default for TerminationController {
    fn default() -> Self {
        Self::new(TerminationPolicy::default())
    }
}

impl TerminationController {
    /// Controller backed by real process control.
    pub fn new(policy: TerminationPolicy) -> Self {
        let system = Arc::new(SystemSignals::new());
        Self::with_capabilities(policy, system.clone(), system)
    }

    pub fn with_capabilities(
        policy: TerminationPolicy,
        probe: Arc<dyn LivenessProbe>,
        sender: Arc<dyn SignalSender>,
    ) -> Self {
        Self {
            policy,
            probe,
            sender,
        }
    }

    pub fn policy(&self) -> &TerminationPolicy {
        &self.policy
    }

    /// Terminate `pid`, escalating to SIGKILL after the graceful timeout.
    ///
    /// A process that is already gone, or disappears at any point, counts
    /// as success. The only failures are an undeliverable signal and a
    /// process that survives SIGKILL.
    pub fn kill(&self, pid: u32) -> Result<KillOutcome, TerminationError> {
        self.kill_with_cancel(pid, &CancelToken::new())
    }

    /// [`kill`](Self::kill) that gives up waiting when `cancel` fires.
    pub fn kill_with_cancel(
        &self,
        pid: u32,
        cancel: &CancelToken,
    ) -> Result<KillOutcome, TerminationError> {
        let mut state = State::Running;
        loop {
            state = match state {
                State::Running => {
                    if !self.probe.is_alive(pid) {
                        debug!("PID {pid} already exited");
                        return Ok(KillOutcome::AlreadyGone);
                    }
                    info!("Sending SIGTERM to {pid}");
                    match self.sender.send(pid, Signal::Term)? {
                        Delivery::NoSuchProcess => return Ok(KillOutcome::AlreadyGone),
                        Delivery::Delivered => State::WaitingGraceful {
                            deadline: Instant::now() + self.policy.graceful_timeout,
                        },
                    }
                }

                State::WaitingGraceful { deadline } => {
                    if !self.probe.is_alive(pid) {
                        info!("PID {pid} exited after SIGTERM");
                        return Ok(KillOutcome::ExitedGracefully);
                    }
                    if Instant::now() >= deadline {
                        warn!(
                            "PID {pid} still alive after {:?}, sending SIGKILL",
                            self.policy.graceful_timeout
                        );
                        match self.sender.send(pid, Signal::Kill)? {
                            Delivery::NoSuchProcess => {
                                debug!("PID {pid} exited before SIGKILL landed");
                                return Ok(KillOutcome::ExitedGracefully);
                            }
                            Delivery::Delivered => State::WaitingForced {
                                deadline: Instant::now() + self.policy.force_grace,
                            },
                        }
                    } else {
                        self.wait(pid, deadline, cancel)?;
                        state
                    }
                }

                State::WaitingForced { deadline } => {
                    if !self.probe.is_alive(pid) {
                        info!("PID {pid} exited after SIGKILL");
                        return Ok(KillOutcome::ExitedAfterForce);
                    }
                    if Instant::now() >= deadline {
                        return Err(TerminationError::StillRunning { pid });
                    }
                    self.wait(pid, deadline, cancel)?;
                    state
                }
            };
        }
    }

    /// Sleep one poll interval, or less if `deadline` is closer.
    fn wait(&self, pid: u32, deadline: Instant, cancel: &CancelToken) -> Result<(), TerminationError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if cancel.sleep(self.policy.poll_interval.min(remaining)) {
            Ok(())
        } else {
            Err(TerminationError::Cancelled { pid })
        }
    }

    /// Send one signal with no follow-up, e.g. SIGHUP to reopen logs.
    pub fn send_signal(&self, pid: u32, signal: Signal) -> Result<(), TerminationError> {
        match self.sender.send(pid, signal)? {
            Delivery::Delivered => {
                info!("Sent {signal:?} to {pid}");
                Ok(())
            }
            Delivery::NoSuchProcess => Err(TerminationError::NotFound { pid }),
        }
    }
}
