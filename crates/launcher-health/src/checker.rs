//! Bounded probe state machine.
//!
//! Every bounded wait in the launcher (startup health gate, leadership
//! check, dead-member poll, quorum write) is the same loop: observe, decide,
//! sleep, repeat until a verdict or the budget runs out. Budgets are
//! wall-clock: a slow observation eats into the same deadline as the sleeps.
//! The decision is the pure [`advance`] function; [`run_probe`] only adds
//! the timers.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Outcome of a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The condition holds.
    Confirmed,
    /// The condition definitively does not hold; stop probing.
    Refuted,
    /// No answer yet (error, timeout, no leader).
    Pending,
}

/// Where a bounded probe currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Probing { attempts: u32 },
    ConfirmedHealthy,
    ConfirmedUnhealthy,
    TimedOut,
}

impl ProbeState {
    pub fn initial() -> Self {
        ProbeState::Probing { attempts: 0 }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProbeState::Probing { .. })
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, ProbeState::ConfirmedHealthy)
    }
}

/// Attempt budget, wall-clock deadline and spacing of a bounded probe.
///
/// A probe ends at whichever bound it hits first. The deadline covers the
/// observations themselves, not only the sleeps between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub deadline: Duration,
}

impl ProbePolicy {
    /// `max_attempts` observations `interval` apart; the deadline is the
    /// span those attempts would take if each answered at once.
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            deadline: Duration::from_secs(interval.as_secs() * max_attempts as u64),
        }
    }

    /// Observe every `interval` until `deadline` has elapsed.
    pub const fn polling(interval: Duration, deadline: Duration) -> Self {
        Self {
            interval,
            max_attempts: u32::MAX,
            deadline,
        }
    }

    /// Startup health gate: 60s at 1s intervals.
    pub const fn health_gate() -> Self {
        Self::polling(Duration::from_secs(1), Duration::from_secs(60))
    }

    /// Leadership check: 10 status probes, 2s apart.
    pub const fn leadership() -> Self {
        Self::new(Duration::from_secs(2), 10)
    }

    /// Dead-member confirmation: 15s at 1s intervals.
    pub const fn dead_member() -> Self {
        Self::polling(Duration::from_secs(1), Duration::from_secs(15))
    }
}

/// Pure transition over (state, observation, time spent so far, budget).
///
/// A pending probe times out once its attempts are used up or once the
/// next observation would start at or past the deadline. Terminal states
/// absorb further observations.
pub fn advance(state: ProbeState, observation: Verdict, elapsed: Duration, policy: &ProbePolicy) -> ProbeState {
    let ProbeState::Probing { attempts } = state else {
        return state;
    };
    match observation {
        Verdict::Confirmed => ProbeState::ConfirmedHealthy,
        Verdict::Refuted => ProbeState::ConfirmedUnhealthy,
        Verdict::Pending => {
            let attempts = attempts.saturating_add(1);
            if attempts >= policy.max_attempts || elapsed + policy.interval >= policy.deadline {
                ProbeState::TimedOut
            } else {
                ProbeState::Probing { attempts }
            }
        }
    }
}

/// Drive `observe` until the state machine reaches a terminal state.
///
/// `observe` receives the zero-based attempt number. An observation still
/// running at the deadline is dropped and the probe times out.
pub async fn run_probe<F, Fut>(policy: ProbePolicy, mut observe: F) -> ProbeState
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Verdict>,
{
    let started = Instant::now();
    let deadline = started + policy.deadline;
    let mut state = ProbeState::initial();
    let mut attempt = 0;
    loop {
        let verdict = match tokio::time::timeout_at(deadline, observe(attempt)).await {
            Ok(verdict) => verdict,
            Err(_) => {
                debug!(attempts = attempt + 1, deadline_secs = policy.deadline.as_secs(), "probe deadline reached");
                return ProbeState::TimedOut;
            }
        };
        state = advance(state, verdict, started.elapsed(), &policy);
        if state.is_terminal() {
            debug!(?state, attempts = attempt + 1, "probe finished");
            return state;
        }
        attempt += 1;
        tokio::time::sleep(policy.interval).await;
    }
}
