//! # botvisor
//!
//! **botvisor** keeps one long-running bot session alive against a remote
//! world server, relays session chat to a notification channel, exposes a
//! live web control surface, and runs a set of independent timer-driven
//! behaviors against the session.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!            console ──┐                    ┌── control surface (ws/http)
//!                      ▼                    ▼
//!              ┌───────────────────────────────────┐
//!              │  SessionManager (lifecycle root)  │
//!              │  - owns the Gateway handle        │
//!              │  - TimerRegistry (named tasks)    │
//!              │  - Teardown (aux servers)         │
//!              │  - manually_ended / reconnect     │
//!              └──────┬──────────────┬─────────────┘
//!                     │ publishes    │ starts on spawn
//!                     ▼              ▼
//!              ┌───────────┐   ┌──────────────────────────────┐
//!              │    Bus    │   │ behaviors: follow, clicker,  │
//!              │ (chat +   │   │ roster, reactions, restart,  │
//!              │ lifecycle │   │ autopay                      │
//!              │  events)  │   └──────────────────────────────┘
//!              └─────┬─────┘
//!          ┌─────────┼──────────────┐
//!          ▼         ▼              ▼
//!      notifier   viewer       autopay listener
//!      relay      broadcast    (one per transaction)
//! ```
//!
//! ### Lifecycle
//! ```text
//! Disconnected ──connect──► Connecting ──spawn──► Active
//!      ▲                                            │
//!      │          cancel_all() ─► close_all() ─► quit()
//!      └──────────────── Ending ◄───────────────────┘
//!
//! auto-reconnect after 20s unless the end was operator-initiated;
//! a scheduled restart re-enters the same path, then reconnects after 8 min.
//! ```
//!
//! ## Rules
//! - At most one session exists at any instant; a replacement session is not
//!   created until the previous teardown has completed.
//! - `TimerRegistry::cancel_all` runs before any session handle is discarded.
//! - Auxiliary servers sever their clients and close (bounded by a force
//!   timeout) before a replacement session may bind the same ports.
//! - Chat lines reach every live bus receiver in arrival order.

mod behaviors;
mod config;
mod console;
mod control;
mod error;
mod events;
mod gateway;
mod notify;
mod session;
mod teardown;
mod timers;

// ---- Public re-exports ----

pub use config::Config;
pub use console::run_console;
pub use control::{AssetServer, ControlServer, ViewerRegistry};
pub use error::{GatewayError, SessionError};
pub use events::{Bus, Event, EventKind};
pub use gateway::{
    Connector, Controls, Gateway, GatewayEvent, GatewayRef, Identity, InteractPhase, LineConnector,
    Vec3, ViewState,
};
pub use notify::{Notify, NullNotifier, WebhookNotifier, from_url as notifier_from_url};
pub use session::{AdminAction, Command, SessionManager, StatusReport};
pub use teardown::{AuxServer, Teardown};
pub use timers::TimerRegistry;
