//! Infrastructure layer: adapters behind the application ports.

pub mod persistence;
