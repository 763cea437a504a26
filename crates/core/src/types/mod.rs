//! Core types for Spindle Records.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod owner;
pub mod price;
pub mod status;

pub use id::*;
pub use owner::{Owner, SessionKey};
pub use price::Price;
pub use status::*;
