//! Application layer: ports to the outside world and the services that
//! orchestrate the domain through them.

pub mod ports;
pub mod services;
