//! Storeline Core - Shared domain types.
//!
//! This crate provides the records the catalog synchronization layer works with:
//! - `storefront` - Cache, reconciler, ranking and filter engines
//! - `cli` - Headless driver for the synchronization layer
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no HTTP
//! clients, no clocks. Wire payloads are converted into these records at the
//! client boundary, so everything past the fetch layer is strongly typed.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, catalog items, orders, notifications, statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
