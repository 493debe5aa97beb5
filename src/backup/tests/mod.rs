//! Unit tests for backup validation and service orchestration.

pub(crate) mod support;
