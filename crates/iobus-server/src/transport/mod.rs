//! Transport layer: the TCP control plane and the UDP data plane.

pub mod control;
pub mod data;
