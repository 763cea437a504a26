//! Spindle Core - Shared types library.
//!
//! This crate provides common types used across all Spindle Records components:
//! - `storefront` - Public record-store site and checkout pipeline
//! - `integration-tests` - HTTP-level tests against the storefront router
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, cart ownership, and status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
