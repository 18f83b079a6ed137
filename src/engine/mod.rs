//! Closed-loop optimization over a modulator and camera pair.
//!
//! The engine repeatedly displays candidate phase masks, measures how much
//! light each one concentrates on the camera target, and feeds the readings
//! back into the configured search strategy until the stop rule fires.
//!
//! # Key Types
//!
//! - [`EngineConfig`]: strategy, bin geometry, stop rule, artifacts
//! - [`OptimizationEngine`]: owns the devices and drives the run
//! - [`RunReport`]: stop reason, best snapshot, fitness history
//! - [`AbortHandle`]: stops a run from another thread
//!
//! # Example
//!
//! ```no_run
//! use wavefront_ga::engine::{EngineConfig, OptimizationEngine};
//! use wavefront_ga::hardware::{BoardShape, SimRig};
//!
//! let rig = SimRig::new(
//!     1,
//!     BoardShape { width: 512, height: 512, depth: 1 },
//!     640,
//!     480,
//! );
//! let config = EngineConfig::micro_ga().with_seed(42);
//! let mut engine = OptimizationEngine::new(rig.modulator, rig.camera, config);
//! let report = engine.run()?;
//! println!("stopped: {} at fitness {:?}", report.stop_reason, report.best.map(|b| b.fitness));
//! # Ok::<(), wavefront_ga::engine::EngineError>(())
//! ```

mod artifacts;
mod brute;
mod config;
mod error;
mod runner;
mod state;
mod stop;

pub use config::{Algorithm, EngineConfig};
pub use error::EngineError;
pub use runner::{AbortHandle, OptimizationEngine, RunReport};
pub use state::{BestSnapshot, RunPhase};
pub use stop::{StopConditions, StopReason};
