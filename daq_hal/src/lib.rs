//! DAQ Hardware Capabilities
//!
//! Narrow trait seams between the firmware core and its hardware: the
//! real-time clock, the non-volatile byte store, the two sensor classes
//! and the periodic tick timer with its suppression gate. Each seam ships
//! with a simulation driver so the core runs and tests on a host.
//!
//! # Module Structure
//!
//! - [`clock`] - Wall-clock source and burst pacing
//! - [`store`] - Byte-addressable non-volatile storage
//! - [`sensor`] - Temperature/light sensor capabilities and fault bits
//! - [`timer`] - Periodic tick timer and the tick suppression gate

pub mod clock;
pub mod sensor;
pub mod store;
pub mod timer;
