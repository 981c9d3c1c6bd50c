//! Berth Test Kit - mock capabilities and fixtures for store tests
//!
//! This crate provides the pieces a directory test needs to stand up a
//! complete store in memory:
//!
//! - [`TestAllocator`] - a capacity-bounded, free-list segment allocator
//! - [`MemoryExternalStore`] - an in-memory external tier with failure
//!   injection
//! - [`RecordingSink`] - a notification sink that records every batch
//! - [`fixtures`] - deterministic object and client ids
//! - [`init_test_tracing`] - opt-in tracing output for test debugging

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod allocator;
mod external;
pub mod fixtures;
mod sink;
mod tracing_config;

pub use allocator::*;
pub use external::*;
pub use sink::*;
pub use tracing_config::*;
