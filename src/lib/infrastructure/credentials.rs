//! Credential providers

pub mod env;
