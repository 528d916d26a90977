//! Common test utilities for jobpulse integration tests

#[allow(dead_code)]
pub mod config;
#[allow(dead_code)]
pub mod provider;

#[allow(unused_imports)]
pub use config::*;
#[allow(unused_imports)]
pub use provider::*;
