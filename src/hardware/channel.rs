//! Mutual-exclusion boundary around the modulator and camera pair.
//!
//! Every evaluation runs a write-then-acquire section against the devices;
//! [`EvaluationChannel`] owns both devices behind one lock so those sections
//! can never interleave, no matter how many evaluation threads are in
//! flight. A busy flag inside the lock additionally trips if an evaluation
//! ever reaches the devices while another one is mid-section, turning a
//! broken caller into a per-individual error instead of corrupted readings.

use log::error;
use parking_lot::Mutex;

use super::error::HardwareError;
use super::types::{BoardShape, Camera, Frame, Modulator};

/// Serialized access to one modulator plus one camera.
pub struct EvaluationChannel<M: Modulator, C: Camera> {
    inner: Mutex<Inner<M, C>>,
}

struct Inner<M, C> {
    modulator: M,
    camera: C,
    busy: bool,
}

impl<M: Modulator, C: Camera> EvaluationChannel<M, C> {
    /// Takes ownership of the devices.
    pub fn new(modulator: M, camera: C) -> Self {
        Self {
            inner: Mutex::new(Inner {
                modulator,
                camera,
                busy: false,
            }),
        }
    }

    /// Number of modulator boards behind this channel.
    pub fn board_count(&self) -> usize {
        self.inner.lock().modulator.board_count()
    }

    /// Geometry of every modulator board, in board order.
    pub fn board_shapes(&self) -> Vec<BoardShape> {
        let inner = self.inner.lock();
        (0..inner.modulator.board_count())
            .map(|board| inner.modulator.board_shape(board))
            .collect()
    }

    /// Camera frame geometry, `(width, height)`.
    pub fn frame_shape(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.camera.frame_width(), inner.camera.frame_height())
    }

    /// Current camera exposure in milliseconds.
    pub fn exposure_ms(&self) -> f64 {
        self.inner.lock().camera.exposure_ms()
    }

    /// Initial exposure divided by current exposure.
    pub fn exposure_ratio(&self) -> f64 {
        self.inner.lock().camera.exposure_ratio()
    }

    /// Halves the camera exposure.
    pub fn halve_exposure(&self) -> Result<(), HardwareError> {
        self.inner.lock().camera.halve_exposure()
    }

    /// Writes one image per board, then acquires one frame, all inside the
    /// channel's exclusive section.
    ///
    /// `images` carries one device image per board, in board order. The
    /// acquired frame is validated against the camera geometry before it is
    /// returned.
    pub fn write_and_acquire(&self, images: &[Vec<u8>]) -> Result<Frame, HardwareError> {
        let mut inner = self.inner.lock();
        if inner.busy {
            error!("hardware channel entered while an evaluation is mid-section");
            return Err(HardwareError::ChannelBusy);
        }
        inner.busy = true;
        let result = Self::run_section(&mut inner, images);
        inner.busy = false;
        result
    }

    fn run_section(inner: &mut Inner<M, C>, images: &[Vec<u8>]) -> Result<Frame, HardwareError> {
        debug_assert_eq!(images.len(), inner.modulator.board_count());
        for (board, image) in images.iter().enumerate() {
            inner.modulator.write_image(board, image)?;
        }
        let frame = inner.camera.acquire()?;
        let expected = inner.camera.frame_width() * inner.camera.frame_height();
        if frame.data().len() < expected {
            return Err(HardwareError::IncompleteFrame {
                expected,
                actual: frame.data().len(),
            });
        }
        Ok(frame)
    }

    /// Releases the devices.
    pub fn into_parts(self) -> (M, C) {
        let inner = self.inner.into_inner();
        (inner.modulator, inner.camera)
    }

    #[cfg(test)]
    pub(crate) fn set_busy(&self, busy: bool) {
        self.inner.lock().busy = busy;
    }
}
