// Domain layer: unified resource model, the driver port and the pieces
// drivers share (filtering, capabilities, instance lifecycle).

pub mod capability;
pub mod filter;
pub mod model;
pub mod ports;
pub mod state;
