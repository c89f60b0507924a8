//! launcher-health — liveness, leadership, and bounded waits.
//!
//! # Architecture
//!
//! ```text
//! run_probe(policy, observe)
//!   ├── observe(attempt) → Verdict { Confirmed | Refuted | Pending }
//!   │     cut off at policy.deadline
//!   ├── advance(state, verdict, elapsed, policy)   pure, no timers
//!   └── sleep(policy.interval) while Probing
//!
//! is_healthy()          read "healthy"; permission denied counts as alive
//! is_leader()           status ×10, 2s apart; other leader ⇒ false at once
//! wait_until_healthy()  1s polls, 60s wall-clock startup gate
//! ```

pub mod checker;
pub mod probe;

pub use checker::{ProbePolicy, ProbeState, Verdict, advance, run_probe};
pub use probe::{HEALTH_KEY, is_healthy, is_leader, leadership_verdict, wait_until_healthy};
