//! Adapter implementations of the backup ports.

pub mod memory;
pub mod postgres;
