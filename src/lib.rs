//! Countdown timer promotions for Shopify storefronts.
//!
//! This crate provides the timer document model, pluggable timer stores,
//! a REST façade over them, typed API clients, and the storefront side:
//! a pure selection engine plus the countdown render loop that drives a
//! widget surface.

extern crate alloc;

#[cfg(any(feature = "async", feature = "blocking"))]
pub mod client;
#[cfg(feature = "server")]
pub mod config;
pub mod countdown;
pub mod error;
pub mod form;
pub mod models;
pub mod selection;
#[cfg(feature = "server")]
pub mod server;
pub mod storage;
