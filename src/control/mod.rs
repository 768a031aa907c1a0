//! Auxiliary servers started alongside an active session.
//!
//! - [`ControlServer`] — the live control surface: a page, a viewer
//!   websocket (chat/controls/look in, chat broadcast out), and the admin
//!   endpoint.
//! - [`AssetServer`] — static viewer assets on a separate port.
//! - [`ViewerRegistry`] — live viewer connections with per-viewer send
//!   queues; severed as a unit during teardown.
//!
//! Both servers implement [`AuxServer`](crate::teardown::AuxServer) and are
//! closed through the teardown coordinator before a replacement session may
//! bind the same ports.

mod assets;
mod server;
mod viewers;

pub use assets::AssetServer;
pub use server::ControlServer;
pub use viewers::ViewerRegistry;
