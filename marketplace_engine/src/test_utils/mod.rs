//! Helpers for integration tests, here and in downstream crates.
pub mod fake_provider;
pub mod prepare_env;
pub mod seed;
