//! Common test utilities for probe-runner integration tests

#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod probes;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use probes::*;
