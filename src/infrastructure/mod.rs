//! Infrastructure: configuration loading and validation.

pub mod config;
