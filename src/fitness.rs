//! Fitness measurement over acquired camera frames.
//!
//! Fitness is the mean pixel intensity inside a circular target centered on
//! the frame. The divisor is the analytic circle area `pi * r^2` rather than
//! the rasterized pixel count, so a uniform frame can read slightly above or
//! below its raw pixel value; what matters is that the measure is monotone in
//! the light concentrated on the target.

use std::f64::consts::PI;

/// Circular integration region centered on the acquired frame.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CircularTarget {
    radius: f64,
}

impl CircularTarget {
    /// Creates a target of the given pixel radius.
    pub fn new(radius: f64) -> Self {
        Self { radius }
    }

    /// Target radius in pixels.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Mean intensity of the frame pixels inside the target.
    ///
    /// The circle is rasterized scanline by scanline, keeping every pixel
    /// whose offset `(dx, dy)` from the frame center satisfies
    /// `dx^2 + dy^2 <= r^2` (bounds inclusive). Pixels falling outside the
    /// frame are skipped. Returns 0.0 for a non-positive radius.
    pub fn mean_intensity(&self, data: &[u8], width: usize, height: usize) -> f64 {
        if self.radius <= 0.0 || width == 0 || height == 0 {
            return 0.0;
        }
        let cx = (width / 2) as i64;
        let cy = (height / 2) as i64;
        let r = self.radius;
        let reach = r.floor() as i64;

        let mut sum = 0u64;
        for dy in -reach..=reach {
            let y = cy + dy;
            if y < 0 || y >= height as i64 {
                continue;
            }
            let half = (r * r - (dy * dy) as f64).sqrt().floor() as i64;
            let x_from = (cx - half).max(0);
            let x_to = (cx + half).min(width as i64 - 1);
            let row = y as usize * width;
            for x in x_from..=x_to {
                sum += u64::from(data[row + x as usize]);
            }
        }
        sum as f64 / (PI * r * r)
    }
}

/// Scales a raw intensity reading back to the run's initial exposure so
/// fitness stays comparable after the camera exposure is shortened.
///
/// `exposure_ratio` is initial exposure divided by current exposure; halving
/// the exposure doubles the ratio.
pub fn exposure_normalized(raw: f64, exposure_ratio: f64) -> f64 {
    raw * exposure_ratio
}
