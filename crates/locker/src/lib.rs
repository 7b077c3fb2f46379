//! Locker CLI library
//!
//! The command surface over [`locker_core::Locker`]. Holds no lock
//! invariants of its own: every decision is made by the core and reported
//! here as text or JSON.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![forbid(unsafe_code)]

pub mod cli;
pub mod output;

pub use output::{OutputFormat, Refused};
