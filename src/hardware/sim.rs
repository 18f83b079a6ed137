//! Deterministic in-memory devices for tests, benches, and rehearsals.
//!
//! [`SimRig`] builds a coupled modulator/camera pair: the camera synthesizes
//! frames from whatever the modulator currently displays, so a closed loop
//! works end to end without hardware. The rig also hands out a [`SimHandle`]
//! with counters and a [`SectionMonitor`] that detects write+acquire
//! sections interleaving across threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use super::error::HardwareError;
use super::types::{BoardShape, Camera, Frame, Modulator};

/// Synthesizes frame bytes from the displayed images and the exposure scale
/// (current exposure divided by initial exposure).
pub type ResponseFn = dyn Fn(&[Vec<u8>], f64) -> Vec<u8> + Send + Sync;

/// Tracks write+acquire sections across threads.
///
/// A section opens at the first modulator write by a thread and closes at
/// that thread's camera acquisition. Any device call from another thread in
/// between counts as a violation.
#[derive(Debug, Default)]
pub struct SectionMonitor {
    owner: Mutex<Option<ThreadId>>,
    violations: AtomicUsize,
}

impl SectionMonitor {
    /// Number of cross-thread section overlaps seen so far.
    pub fn violations(&self) -> usize {
        self.violations.load(Ordering::Relaxed)
    }

    fn begin_write(&self) {
        let mut owner = self.owner.lock();
        match *owner {
            Some(id) if id != thread::current().id() => {
                self.violations.fetch_add(1, Ordering::Relaxed);
            }
            Some(_) => {}
            None => *owner = Some(thread::current().id()),
        }
    }

    fn end_acquire(&self) {
        let mut owner = self.owner.lock();
        match *owner {
            Some(id) if id == thread::current().id() => *owner = None,
            Some(_) => {
                self.violations.fetch_add(1, Ordering::Relaxed);
            }
            // standalone acquisitions open no section
            None => {}
        }
    }

    /// Closes this thread's section after a failed device call.
    fn abandon(&self) {
        let mut owner = self.owner.lock();
        if *owner == Some(thread::current().id()) {
            *owner = None;
        }
    }
}

/// Shared observation and fault-injection handle for one [`SimRig`].
///
/// The handle stays valid after the devices move into an evaluation channel
/// or engine.
#[derive(Clone)]
pub struct SimHandle {
    monitor: Arc<SectionMonitor>,
    displayed: Arc<Mutex<Vec<Vec<u8>>>>,
    writes: Arc<AtomicUsize>,
    acquisitions: Arc<AtomicUsize>,
    write_failures: Arc<AtomicUsize>,
}

impl SimHandle {
    /// Copy of the image currently displayed on `board`.
    pub fn displayed(&self, board: usize) -> Vec<u8> {
        self.displayed.lock()[board].clone()
    }

    /// Successful modulator writes so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Camera acquisitions so far.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// Makes the next `count` modulator writes fail.
    pub fn inject_write_failures(&self, count: usize) {
        self.write_failures.fetch_add(count, Ordering::SeqCst);
    }

    /// Cross-thread section overlaps seen so far.
    pub fn overlap_violations(&self) -> usize {
        self.monitor.violations()
    }
}

/// Simulated multi-board modulator.
pub struct SimModulator {
    shapes: Vec<BoardShape>,
    displayed: Arc<Mutex<Vec<Vec<u8>>>>,
    monitor: Arc<SectionMonitor>,
    writes: Arc<AtomicUsize>,
    write_failures: Arc<AtomicUsize>,
}

impl Modulator for SimModulator {
    fn board_count(&self) -> usize {
        self.shapes.len()
    }

    fn board_shape(&self, board: usize) -> BoardShape {
        self.shapes[board]
    }

    fn write_image(&mut self, board: usize, image: &[u8]) -> Result<(), HardwareError> {
        self.monitor.begin_write();
        if board >= self.shapes.len() {
            self.monitor.abandon();
            return Err(HardwareError::UnknownBoard {
                board,
                count: self.shapes.len(),
            });
        }
        let injected = self
            .write_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected || image.len() != self.shapes[board].image_len() {
            self.monitor.abandon();
            return Err(HardwareError::WriteRejected {
                board,
                len: image.len(),
            });
        }
        self.displayed.lock()[board] = image.to_vec();
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Simulated camera coupled to the rig's modulator.
pub struct SimCamera {
    width: usize,
    height: usize,
    initial_exposure_ms: f64,
    exposure_ms: f64,
    min_exposure_ms: f64,
    displayed: Arc<Mutex<Vec<Vec<u8>>>>,
    monitor: Arc<SectionMonitor>,
    acquisitions: Arc<AtomicUsize>,
    response: Arc<ResponseFn>,
}

impl Camera for SimCamera {
    fn frame_width(&self) -> usize {
        self.width
    }

    fn frame_height(&self) -> usize {
        self.height
    }

    fn acquire(&mut self) -> Result<Frame, HardwareError> {
        let data = {
            let displayed = self.displayed.lock();
            (self.response)(&displayed, self.exposure_ms / self.initial_exposure_ms)
        };
        self.monitor.end_acquire();
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        Ok(Frame::new(data, self.width, self.height))
    }

    fn exposure_ms(&self) -> f64 {
        self.exposure_ms
    }

    fn exposure_ratio(&self) -> f64 {
        self.initial_exposure_ms / self.exposure_ms
    }

    fn halve_exposure(&mut self) -> Result<(), HardwareError> {
        let next = self.exposure_ms / 2.0;
        if next < self.min_exposure_ms {
            return Err(HardwareError::ExposureRejected { requested_ms: next });
        }
        self.exposure_ms = next;
        Ok(())
    }
}

/// A coupled simulated modulator and camera plus their observation handle.
pub struct SimRig {
    /// Modulator to hand to the evaluation channel or engine.
    pub modulator: SimModulator,
    /// Camera to hand to the evaluation channel or engine.
    pub camera: SimCamera,
    /// Observation and fault-injection handle; clone freely.
    pub handle: SimHandle,
}

impl SimRig {
    /// Builds a rig of `boards` identical boards and the given camera
    /// geometry. Exposure starts at 10 ms with a 0.001 ms floor; the default
    /// camera response is a uniform frame at the exposure-scaled mean of all
    /// displayed bytes.
    pub fn new(boards: usize, shape: BoardShape, frame_width: usize, frame_height: usize) -> Self {
        let monitor = Arc::new(SectionMonitor::default());
        let displayed = Arc::new(Mutex::new(vec![vec![0u8; shape.image_len()]; boards]));
        let writes = Arc::new(AtomicUsize::new(0));
        let acquisitions = Arc::new(AtomicUsize::new(0));
        let write_failures = Arc::new(AtomicUsize::new(0));

        let frame_len = frame_width * frame_height;
        let response: Arc<ResponseFn> =
            Arc::new(move |displayed, scale| mean_level_response(displayed, scale, frame_len));

        let modulator = SimModulator {
            shapes: vec![shape; boards],
            displayed: Arc::clone(&displayed),
            monitor: Arc::clone(&monitor),
            writes: Arc::clone(&writes),
            write_failures: Arc::clone(&write_failures),
        };
        let camera = SimCamera {
            width: frame_width,
            height: frame_height,
            initial_exposure_ms: 10.0,
            exposure_ms: 10.0,
            min_exposure_ms: 0.001,
            displayed: Arc::clone(&displayed),
            monitor: Arc::clone(&monitor),
            acquisitions: Arc::clone(&acquisitions),
            response,
        };
        let handle = SimHandle {
            monitor,
            displayed,
            writes,
            acquisitions,
            write_failures,
        };
        Self {
            modulator,
            camera,
            handle,
        }
    }

    /// Replaces the camera response.
    pub fn with_response<F>(mut self, response: F) -> Self
    where
        F: Fn(&[Vec<u8>], f64) -> Vec<u8> + Send + Sync + 'static,
    {
        self.camera.response = Arc::new(response);
        self
    }

    /// Sets the initial exposure and the floor below which halving fails.
    pub fn with_exposure(mut self, initial_ms: f64, min_ms: f64) -> Self {
        self.camera.initial_exposure_ms = initial_ms;
        self.camera.exposure_ms = initial_ms;
        self.camera.min_exposure_ms = min_ms;
        self
    }
}

/// Uniform frame at the exposure-scaled mean of every displayed byte.
fn mean_level_response(displayed: &[Vec<u8>], scale: f64, frame_len: usize) -> Vec<u8> {
    let total: u64 = displayed
        .iter()
        .flat_map(|image| image.iter())
        .map(|&b| u64::from(b))
        .sum();
    let count: usize = displayed.iter().map(|image| image.len()).sum();
    let mean = if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    };
    let level = (mean * scale).round().clamp(0.0, 255.0) as u8;
    vec![level; frame_len]
}
