// Domain layer: models and ports. Only std/serde, no I/O.

pub mod model;
pub mod ports;
