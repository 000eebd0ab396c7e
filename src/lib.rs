// Public API for the service binary, integration tests, and client embedders

pub mod api;
pub mod config;
pub mod lobby;
pub mod rules;
pub mod session;
pub mod store;
pub mod types;
