//! CLI command implementations.

pub mod catalog;
pub mod notifications;
pub mod orders;
pub mod watch;
