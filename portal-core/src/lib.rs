//! Portal Core - shared configuration, error and logging infrastructure
//!
//! Used by the auth crate and the command-line front end

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;
