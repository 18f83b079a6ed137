//! Device capability traits and the acquired-frame type.
//!
//! The engine talks to hardware through [`Modulator`] and [`Camera`] only;
//! vendor SDK adapters implement these on one side, the simulated devices in
//! [`crate::hardware::sim`] on the other. Both traits use `&mut self` for
//! mutating operations because the evaluation channel owns the devices and
//! serializes every access.

use super::error::HardwareError;

/// Pixel geometry of one modulator board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoardShape {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Bytes per pixel: 1 for 8-bit boards, 2 for 16-bit boards.
    pub depth: usize,
}

impl BoardShape {
    /// Byte length of one device image for this board.
    pub fn image_len(&self) -> usize {
        self.width * self.height * self.depth
    }
}

/// A spatial light modulator with one or more boards.
pub trait Modulator: Send {
    /// Number of addressable boards.
    fn board_count(&self) -> usize;

    /// Geometry of the given board.
    fn board_shape(&self, board: usize) -> BoardShape;

    /// Displays a full-resolution image on the given board.
    ///
    /// `image` must be exactly
    /// [`board_shape(board).image_len()`](BoardShape::image_len) bytes.
    fn write_image(&mut self, board: usize, image: &[u8]) -> Result<(), HardwareError>;
}

/// An intensity camera observing the optimization target.
pub trait Camera: Send {
    /// Frame width in pixels.
    fn frame_width(&self) -> usize;

    /// Frame height in pixels.
    fn frame_height(&self) -> usize;

    /// Captures one frame at the current exposure.
    fn acquire(&mut self) -> Result<Frame, HardwareError>;

    /// Current exposure in milliseconds.
    fn exposure_ms(&self) -> f64;

    /// Initial exposure divided by current exposure.
    ///
    /// Fitness readings are multiplied by this ratio so they stay comparable
    /// across exposure changes; halving the exposure doubles the ratio.
    fn exposure_ratio(&self) -> f64;

    /// Halves the exposure time.
    fn halve_exposure(&mut self) -> Result<(), HardwareError>;
}

/// One acquired 8-bit grayscale frame, rows flattened top to bottom.
#[derive(Debug, Clone)]
pub struct Frame {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl Frame {
    /// Wraps raw frame bytes with their geometry. Completeness is checked at
    /// the evaluation channel, not here, so partial transfers can still be
    /// represented and reported.
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Frame bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Consumes the frame, returning its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
