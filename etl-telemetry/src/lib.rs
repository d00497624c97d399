//! Telemetry setup shared by the syncer binary and tests.

pub mod tracing;
