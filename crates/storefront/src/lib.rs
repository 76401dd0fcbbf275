//! Storeline synchronization layer.
//!
//! Keeps a locally cached, multi-view snapshot of a remote catalog fresh
//! without blocking readers, ranks it, caches a seller's order queue, and
//! polls for notifications with at-most-once alerts.
//!
//! # Modules
//!
//! - [`catalog`] - snapshot builder, ranking, filters, cache manager, reconciler
//! - [`orders`] - per-seller order queue cache with collapsing refreshes
//! - [`notifications`] - notification poller and the persisted shown-set
//! - [`api`] - HTTP clients for the Catalog, Order and Notification services
//! - [`cache`], [`storage`], [`clock`] - TTL entries, durable storage, time

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod notifications;
pub mod orders;
pub mod state;
pub mod storage;

#[cfg(test)]
mod testing;

pub use error::{Result, SyncError};
