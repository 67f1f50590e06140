//! Session Management Module
//!
//! Session records, the session table abstraction and the liveness monitor.

pub mod monitor;
pub mod store;
pub mod types;

pub use monitor::{MonitorStatus, SessionMonitor};
pub use store::{LocalSessionStore, SessionStore};
pub use types::*;
