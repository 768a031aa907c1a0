//! Runtime events and the broadcast bus that routes them.
//!
//! The bus doubles as the chat event router: every inbound chat line is
//! published as an [`EventKind::ChatLine`] event, and each live receiver
//! observes lines in arrival order. Dropping a receiver deregisters it.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
