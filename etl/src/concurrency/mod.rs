//! Concurrency utilities used by the sync pipeline.

pub mod deadline;
