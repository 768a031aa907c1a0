//! Timer-driven behaviors that act on the active session.
//!
//! Each behavior is a small tick function (or long-running listener) started
//! through the [`TimerRegistry`](crate::timers::TimerRegistry) under a
//! stable name, so the single-slot invariant and `cancel_all` apply
//! uniformly. Behaviors read the gateway's view snapshot and use only the
//! narrow write paths they are granted (chat send, movement goal); none
//! depends on another behavior's output.

pub(crate) mod autopay;
pub(crate) mod clicker;
pub(crate) mod follow;
pub(crate) mod reactions;
pub(crate) mod restart;
pub(crate) mod roster;
