//! Shared state for a run in progress.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::hardware::Frame;
use crate::population::UNEVALUATED_FITNESS;

/// Lifecycle phase of an [`super::OptimizationEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// No run has been started yet.
    NotStarted,
    /// Validating configuration and preparing populations.
    Preparing,
    /// The generation loop is active.
    Running,
    /// The stop rule fired and artifacts are being finalized.
    ShuttingDown,
    /// The run finished.
    Done,
}

/// The best evaluation seen during a run.
#[derive(Debug, Clone)]
pub struct BestSnapshot {
    /// Normalized fitness of this evaluation.
    pub fitness: f64,
    /// Generation the evaluation happened in.
    pub generation: u64,
    /// Population slot of the individual.
    pub index: usize,
    /// Camera frame captured for it.
    pub frame: Frame,
    /// Full-resolution image written to each board, in board order.
    pub device_images: Vec<Vec<u8>>,
}

/// State shared between the run loop and its evaluation threads.
///
/// Workers never hold more than one of these locks at a time, and never
/// hold any of them across a hardware call.
pub(crate) struct RunState {
    shorten_exposure: AtomicBool,
    best: Mutex<Option<BestSnapshot>>,
    measured: Mutex<Vec<f64>>,
}

impl RunState {
    pub(crate) fn new() -> Self {
        Self {
            shorten_exposure: AtomicBool::new(false),
            best: Mutex::new(None),
            measured: Mutex::new(Vec::new()),
        }
    }

    /// Clears the measurement board to sentinels before a generation.
    pub(crate) fn reset_measurements(&self, size: usize) {
        let mut measured = self.measured.lock();
        measured.clear();
        measured.resize(size, UNEVALUATED_FITNESS);
    }

    /// Records one individual's fitness. Out-of-range slots are ignored.
    pub(crate) fn record_measurement(&self, index: usize, fitness: f64) {
        let mut measured = self.measured.lock();
        if let Some(slot) = measured.get_mut(index) {
            *slot = fitness;
        }
    }

    /// Takes the measurement board, leaving it empty.
    pub(crate) fn take_measurements(&self) -> Vec<f64> {
        std::mem::take(&mut *self.measured.lock())
    }

    /// Keeps `candidate` if it beats the best snapshot so far.
    pub(crate) fn offer_best(&self, candidate: BestSnapshot) {
        let mut best = self.best.lock();
        let improves = best
            .as_ref()
            .map(|b| candidate.fitness > b.fitness)
            .unwrap_or(true);
        if improves {
            *best = Some(candidate);
        }
    }

    /// Best fitness so far, or the unevaluated sentinel before any result.
    pub(crate) fn best_fitness(&self) -> f64 {
        self.best
            .lock()
            .as_ref()
            .map(|b| b.fitness)
            .unwrap_or(UNEVALUATED_FITNESS)
    }

    /// Takes the best snapshot out of the run state.
    pub(crate) fn take_best(&self) -> Option<BestSnapshot> {
        self.best.lock().take()
    }

    /// Flags that the camera exposure should be halved.
    pub(crate) fn request_shorter_exposure(&self) {
        self.shorten_exposure.store(true, Ordering::Relaxed);
    }

    /// Consumes a pending exposure request, if any.
    pub(crate) fn take_exposure_request(&self) -> bool {
        self.shorten_exposure.swap(false, Ordering::Relaxed)
    }
}
