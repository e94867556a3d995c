//! This crate contains the code required to make the deployment tooling
//! observable: initialization of the tracing subscriber and the panic hook
//! that routes panics through it.
mod config;
pub mod tracing;

pub use config::Config;
