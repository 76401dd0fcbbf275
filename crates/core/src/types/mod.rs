//! Core types for Storeline.
//!
//! This module provides type-safe wrappers for the marketplace domain.

pub mod id;
pub mod item;
pub mod notification;
pub mod order;
pub mod price;
pub mod status;

pub use id::*;
pub use item::{Category, Item, RATING_MAX, RATING_MIN};
pub use notification::Notification;
pub use order::{Order, OrderStats};
pub use price::PriceRange;
pub use status::*;
