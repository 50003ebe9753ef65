//! # rw-observability
//!
//! Shared logging setup for registry-warden.

pub mod logging;
