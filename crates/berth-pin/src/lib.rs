//! Berth Pin - caller-side strong references into the object store.
//!
//! Upstream systems that hand objects to downstream consumers need those
//! objects to stay resident until the hand-off completes. This crate
//! provides the adapter they use: a non-blocking multi-get that retains the
//! returned buffers until explicitly released, plus synthesis of failure
//! sentinel objects.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod adapter;

pub use adapter::{ObjectPinner, PinError, PinnedObject};
