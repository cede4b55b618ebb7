//! Backends shipped with the core crate.

pub mod mock;
