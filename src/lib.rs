//! Windowgate - Fixed-Window Admission Service
//!
//! This crate decides whether a caller may proceed based on a per-identifier
//! quota that resets at fixed window boundaries. Counters are kept in memory,
//! one per identifier, and each check-and-increment is atomic per identifier
//! without a global lock. The limit and window length can be changed at
//! runtime and take effect on the next check.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
