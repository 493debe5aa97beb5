//! Step definitions for backup scheduling scenarios.

pub mod world;
mod given;
mod when;
mod then;
