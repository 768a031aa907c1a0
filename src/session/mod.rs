//! Session lifecycle: the manager that owns the one logical connection and
//! the command surface everything else talks to it through.

mod command;
mod manager;

pub use command::{AdminAction, Command, StatusReport};
pub use manager::SessionManager;
