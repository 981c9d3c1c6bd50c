//! Berth Core - shared types for the berth object store
//!
//! This crate provides the identifiers and records that cross the boundary
//! between the store directory, the transport layer, and caller-side
//! adapters: object ids, the object lifecycle state, notification records,
//! client ids, and the mapping handle returned to clients.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod object;

pub use client::*;
pub use object::*;
