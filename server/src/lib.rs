//! # Firework Race Server
//!
//! Authoritative engine for the firework race: every connected browser sees
//! the same race because the race only happens here. Each round a roster of
//! token holders becomes a set of firework racers climbing a shared sky;
//! racers detonate at their own hidden thresholds, the last survivor or the
//! first across the finish line wins, and the round's claimed fee pot is
//! sent to the winner's wallet.
//!
//! ## Core Responsibilities
//!
//! ### Round Lifecycle
//! The [`round::RoundEngine`] owns the `racing -> celebrating -> ended`
//! state machine: racer generation, per-tick physics, win condition
//! detection and the winner record. Exactly one winner per round, declared
//! exactly once.
//!
//! ### Scheduling
//! The [`scheduler::GameScheduler`] drives the engine from three timers
//! (physics, broadcast, countdown) multiplexed onto a single `select!`
//! loop. Ticks are non-preemptible callbacks on one control flow, so engine
//! state needs no locking.
//!
//! ### State Broadcasting
//! The [`broadcast::Hub`] fans authoritative snapshots out to observers.
//! The transport fronting the browsers is external; it subscribes and
//! forwards JSON.
//!
//! ### External Collaborators
//! [`holders::HolderSource`] supplies round rosters and
//! [`payout::PaymentService`] claims and distributes rewards. Both can fail
//! without touching the state machine: a round without a roster doesn't
//! start, a round without a claim runs for zero reward, and a failed
//! distribution is logged against an otherwise finished round.
//!
//! ## Persistence
//! Round numbering, the lifetime distributed total and the recent winner
//! history survive restarts through [`stats::PersistentStats`], a small
//! JSON file rewritten at round boundaries.

pub mod broadcast;
pub mod config;
pub mod holders;
pub mod payout;
pub mod racer;
pub mod round;
pub mod scheduler;
pub mod stats;
