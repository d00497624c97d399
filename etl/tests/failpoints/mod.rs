#![cfg(all(feature = "failpoints", feature = "test-utils"))]

mod pipeline_test;
