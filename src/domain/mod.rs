// Domain layer: records, run results and the ports the adapters implement.

pub mod model;
pub mod ports;
