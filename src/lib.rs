// Library root: exposes the host and services for integration tests.
// The binary entry point is src/main.rs.

pub mod config;
pub mod error;
pub mod logger;
pub mod server;
pub mod services;
pub mod settings;
