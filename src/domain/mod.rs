// Domain layer: registry and certificate types plus the ports the adapters implement.

pub mod model;
pub mod ports;
