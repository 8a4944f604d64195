// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskq_types::{metrics, Timeouts};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{error, warn};

/// Cadence at which the watch loop samples elapsed time. Kept well under a
/// second so `disarm_and_reset()` issued shortly after `arm()` reliably
/// prevents a tier from firing.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
enum KillerState {
    Idle = 0,
    Armed = 1,
    SoftFired = 2,
    HardFired = 3,
    CriticalFired = 4,
    Dead = 5,
}

impl From<u8> for KillerState {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Armed,
            2 => Self::SoftFired,
            3 => Self::HardFired,
            4 => Self::CriticalFired,
            _ => Self::Dead,
        }
    }
}

/// Cooperative handle given to `work()` so it can check whether the soft
/// tier has fired at its own checkpoints. Cloning is cheap; every clone
/// observes the same underlying flag.
#[derive(Clone, Default)]
pub struct CancellationToken {
    soft_cancelled: Arc<std::sync::atomic::AtomicBool>,
}

impl CancellationToken {
    pub fn is_soft_cancelled(&self) -> bool {
        self.soft_cancelled.load(Ordering::SeqCst)
    }

    /// A cooperative checkpoint: returns `Err(())` once the soft tier has
    /// fired, so `work()` can bail out of a loop or await point cleanly.
    pub fn checkpoint(&self) -> std::result::Result<(), ()> {
        if self.is_soft_cancelled() {
            Err(())
        } else {
            Ok(())
        }
    }
}

/// Escalating timeout supervisor (§4.E). One `Killer` is created per
/// executor frame (one per task in the threaded executor, one shared
/// instance reused across tasks in the serial executor) and targets a
/// single task's execution.
///
/// Soft fires a cooperative [`CancellationToken`]; hard aborts the tokio
/// task running `work()` via its [`AbortHandle`]; critical exits the process
/// unconditionally, because by definition nothing else can be trusted to
/// recover from it.
///
/// `AbortHandle::abort()` only takes effect the next time the target task
/// reaches an `.await` point — it cancels the *next* poll, not the one in
/// progress. A `work()` that yields periodically (an I/O call, a `sleep`, a
/// cooperative checkpoint) is reliably stopped within one poll cycle of the
/// hard tier firing. A `work()` that runs a genuinely non-yielding compute
/// loop is not preemptible by this mechanism at all and will run to
/// completion regardless of the hard deadline; the only way to bound that
/// case is for `work()` itself to poll [`CancellationToken::checkpoint`] at
/// bounded intervals. This is the accepted cooperative-scheduling trade-off
/// of running on an async runtime rather than spawning `work()` onto its own
/// preemptible OS thread.
pub struct Killer {
    timeouts: Timeouts,
    state: AtomicU8,
    token: CancellationToken,
    watch: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Killer {
    pub fn new(timeouts: Timeouts) -> Self {
        Self {
            timeouts,
            state: AtomicU8::new(KillerState::Idle as u8),
            token: CancellationToken::default(),
            watch: tokio::sync::Mutex::new(None),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    fn state(&self) -> KillerState {
        KillerState::from(self.state.load(Ordering::SeqCst))
    }

    pub fn soft_fired(&self) -> bool {
        matches!(
            self.state(),
            KillerState::SoftFired | KillerState::HardFired | KillerState::CriticalFired
        )
    }

    pub fn hard_fired(&self) -> bool {
        matches!(self.state(), KillerState::HardFired | KillerState::CriticalFired)
    }

    /// Starts the clock against `abort_handle`, the handle of the tokio task
    /// currently running `work()`. Calling `arm()` twice without an
    /// intervening `disarm_and_reset()` is a usage error; the second call is
    /// a no-op.
    pub fn arm(self: &Arc<Self>, abort_handle: AbortHandle) {
        if self.state() != KillerState::Idle {
            warn!("killer armed while already armed; ignoring");
            return;
        }
        self.state.store(KillerState::Armed as u8, Ordering::SeqCst);

        let this = Arc::clone(self);
        let timeouts = self.timeouts;
        let token = self.token.clone();
        let handle = tokio::spawn(async move {
            let start = Instant::now();
            let mut soft_fired = timeouts.soft == 0;
            let mut hard_fired = timeouts.hard == 0;
            let critical_fired = timeouts.critical == 0;
            if critical_fired && hard_fired && soft_fired {
                // every tier disabled: nothing to watch.
                return;
            }
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;
                if this.state() == KillerState::Idle || this.state() == KillerState::Dead {
                    return; // disarmed or torn down.
                }
                let elapsed = start.elapsed();
                if !soft_fired && elapsed >= Duration::from_secs(timeouts.soft) {
                    soft_fired = true;
                    token.soft_cancelled.store(true, Ordering::SeqCst);
                    this.state.store(KillerState::SoftFired as u8, Ordering::SeqCst);
                    metrics::record_killer_tier_fired("soft");
                }
                if !hard_fired && elapsed >= Duration::from_secs(timeouts.hard) {
                    hard_fired = true;
                    this.state.store(KillerState::HardFired as u8, Ordering::SeqCst);
                    metrics::record_killer_tier_fired("hard");
                    abort_handle.abort();
                }
                if !critical_fired && elapsed >= Duration::from_secs(timeouts.critical) {
                    this.state
                        .store(KillerState::CriticalFired as u8, Ordering::SeqCst);
                    metrics::record_killer_tier_fired("critical");
                    error!(
                        elapsed_secs = elapsed.as_secs(),
                        "critical timeout exceeded; terminating process"
                    );
                    std::process::exit(134); // SIGABRT-equivalent exit code.
                }
                if soft_fired && hard_fired && critical_fired {
                    return;
                }
            }
        });
        // `try_lock` is safe here: arm()/disarm_and_reset() are only ever
        // called from the single executor frame that owns this Killer.
        *self.watch.try_lock().expect("killer watch lock contended") = Some(handle);
    }

    /// Stops the clock and returns to idle without firing, discarding the
    /// watch task. Reliable against a tier firing concurrently because the
    /// watch task is aborted outright rather than asked to stop.
    pub async fn disarm_and_reset(&self) {
        if let Some(handle) = self.watch.lock().await.take() {
            handle.abort();
        }
        self.token.soft_cancelled.store(false, Ordering::SeqCst);
        self.state.store(KillerState::Idle as u8, Ordering::SeqCst);
    }

    /// Permanent teardown; the Killer may not be armed again afterward.
    pub async fn terminate(&self) {
        if let Some(handle) = self.watch.lock().await.take() {
            handle.abort();
        }
        self.state.store(KillerState::Dead as u8, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn disarm_shortly_after_arm_prevents_any_tier_from_firing() {
        let killer = Arc::new(Killer::new(Timeouts {
            soft: 1,
            hard: 2,
            critical: 3,
        }));
        let task = tokio::spawn(async { tokio::time::sleep(Duration::from_secs(10)).await });
        killer.arm(task.abort_handle());
        tokio::time::advance(Duration::from_millis(10)).await;
        killer.disarm_and_reset().await;
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!killer.soft_fired());
        assert!(!killer.hard_fired());
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn soft_tier_sets_the_cooperative_token_without_aborting() {
        let killer = Arc::new(Killer::new(Timeouts {
            soft: 1,
            hard: 5,
            critical: 10,
        }));
        let task = tokio::spawn(async { tokio::time::sleep(Duration::from_secs(60)).await });
        let token = killer.token();
        killer.arm(task.abort_handle());
        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(killer.soft_fired());
        assert!(!killer.hard_fired());
        assert!(token.is_soft_cancelled());
        killer.disarm_and_reset().await;
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn hard_tier_aborts_the_target_task() {
        let killer = Arc::new(Killer::new(Timeouts {
            soft: 1,
            hard: 2,
            critical: 10,
        }));
        let task = tokio::spawn(async { tokio::time::sleep(Duration::from_secs(60)).await });
        killer.arm(task.abort_handle());
        tokio::time::advance(Duration::from_millis(2100)).await;
        assert!(killer.hard_fired());
        let result = task.await;
        assert!(result.unwrap_err().is_cancelled());
        killer.disarm_and_reset().await;
    }

    #[tokio::test(start_paused = true)]
    async fn zero_tier_is_skipped_but_later_tiers_still_fire() {
        let killer = Arc::new(Killer::new(Timeouts {
            soft: 0,
            hard: 1,
            critical: 10,
        }));
        let task = tokio::spawn(async { tokio::time::sleep(Duration::from_secs(60)).await });
        killer.arm(task.abort_handle());
        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(!killer.soft_fired());
        assert!(killer.hard_fired());
        killer.disarm_and_reset().await;
    }

    #[tokio::test]
    async fn rearming_without_reset_is_a_noop() {
        let killer = Arc::new(Killer::new(Timeouts {
            soft: 10,
            hard: 20,
            critical: 30,
        }));
        let task_a = tokio::spawn(async { tokio::time::sleep(Duration::from_secs(60)).await });
        let task_b = tokio::spawn(async { tokio::time::sleep(Duration::from_secs(60)).await });
        killer.arm(task_a.abort_handle());
        killer.arm(task_b.abort_handle()); // should be ignored
        assert_eq!(killer.state(), KillerState::Armed);
        killer.disarm_and_reset().await;
        task_a.abort();
        task_b.abort();
    }
}
