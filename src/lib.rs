//! Ride tracker library
//!
//! Real-time vehicle location sharing between a publishing driver and any
//! number of observing parents. Exposes modules for integration testing and
//! binary reuse.

pub mod domain;
pub mod error;
pub mod infra;
pub mod io;
pub mod services;
