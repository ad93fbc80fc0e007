//! Testing utilities and mock implementations
//!
//! Lets the actuator be exercised without GPIO hardware, a broker or a
//! managed network link.

pub mod mocks;

pub use mocks::*;
