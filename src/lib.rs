//! Backup policy core: validated definitions, timezone-aware cron
//! scheduling, destination resolution and retention.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: Pure policy logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for persistence, destinations and
//!   dump storage
//! - **Adapters**: In-memory and `PostgreSQL` implementations of ports
//! - **Services**: Definition management, run dispatch and the timer loop
//!
//! # Modules
//!
//! - [`backup`]: Definitions, schedules, runs and retention
//! - [`config`]: Settings file and environment overrides
//! - [`telemetry`]: Tracing subscriber setup
//! - [`clock`]: Settable clock for tests and simulations

pub mod backup;
pub mod clock;
pub mod config;
pub mod telemetry;
