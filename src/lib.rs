//! Closed-loop wavefront optimization for spatial light modulators.
//!
//! Drives an SLM/camera feedback loop that searches for the phase mask
//! concentrating the most light on a circular camera target:
//!
//! - **Population strategies**: a roulette-selected genetic algorithm with
//!   elitism, a micro GA with fixed elite pairings, convergence restarts,
//!   and peak retention, and an exhaustive per-bin phase sweep.
//! - **Bin scaling**: genomes carry one value per spatial bin; a scaler
//!   replicates them into full-resolution device images, centered on the
//!   board, with optional lookup-table and wavefront-correction mapping
//!   for 16-bit boards.
//! - **Hardware evaluation**: a channel that owns the modulator and camera
//!   behind [`Modulator`](hardware::Modulator) and
//!   [`Camera`](hardware::Camera) traits and serializes every
//!   write-and-acquire section, so individuals can be evaluated from as
//!   many threads as the caller likes.
//! - **The engine**: a generation loop that evaluates every individual,
//!   feeds fitness back into one population per board, halves the camera
//!   exposure when readings near saturation, and stops on a multi-criteria
//!   policy.
//!
//! # Architecture
//!
//! The crate is hardware-agnostic: vendor SDK adapters implement the two
//! device traits on one side, and [`hardware::SimRig`] provides simulated
//! devices for tests and dry runs on the other. Nothing here depends on a
//! particular SLM or camera.

pub mod engine;
pub mod fitness;
pub mod hardware;
pub mod population;
pub mod scaler;
