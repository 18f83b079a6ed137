//! Hardware seam: capability traits, the serialized evaluation channel, and
//! simulated devices.
//!
//! Vendor SDK adapters live outside this crate; everything here talks to
//! [`Modulator`] and [`Camera`] only.

pub mod channel;
pub mod error;
pub mod sim;
pub mod types;

pub use self::channel::EvaluationChannel;
pub use self::error::HardwareError;
pub use self::sim::{SimCamera, SimHandle, SimModulator, SimRig};
pub use self::types::{BoardShape, Camera, Frame, Modulator};
