//! Genome-to-device-image translation.
//!
//! A phase mask genome carries one value per spatial bin; the modulator wants
//! a full-resolution image. [`BinScaler`] replicates each bin value over a
//! `bin_width x bin_height` pixel block, centering the used bin grid on the
//! device when fewer than the maximum number of bins are in play.
//!
//! Setup is a three-step sequence: construct with the device geometry, pick a
//! bin size, pick how many bins to use. Calls made out of sequence or with
//! invalid arguments are silent no-ops; sequencing is the caller's job. All
//! three steps must have completed before any translation call does work.

/// Entry count of a device lookup table: one slot per 16-bit pixel value.
pub const LUT_LEN: usize = 1 << 16;

/// Maps bin-value genomes onto full-resolution modulator images.
///
/// One scaler is configured per modulator board and holds that board's
/// geometry, the derived bin grid, and optionally the board's lookup table
/// and wavefront correction image.
#[derive(Debug, Clone)]
pub struct BinScaler {
    width: usize,
    height: usize,
    depth: usize,
    bin_width: usize,
    bin_height: usize,
    max_bins_x: usize,
    max_bins_y: usize,
    used_bins_x: usize,
    used_bins_y: usize,
    origin_x: usize,
    origin_y: usize,
    bin_size_set: bool,
    used_bins_set: bool,
    lut: Option<Vec<u16>>,
    correction: Option<Vec<u16>>,
}

impl BinScaler {
    /// Creates a scaler for a board of `width x height` pixels with `depth`
    /// bytes per pixel (1 for 8-bit boards, 2 for 16-bit boards).
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
            bin_width: 0,
            bin_height: 0,
            max_bins_x: 0,
            max_bins_y: 0,
            used_bins_x: 0,
            used_bins_y: 0,
            origin_x: 0,
            origin_y: 0,
            bin_size_set: false,
            used_bins_set: false,
            lut: None,
            correction: None,
        }
    }

    /// Sets the pixel size of one bin and derives the maximum bin grid that
    /// fits the board. No-op if either dimension is zero or exceeds the
    /// board.
    ///
    /// Previously chosen used-bin counts are re-clamped against the new
    /// maximum; if none were chosen yet the scaler stays incomplete until
    /// [`set_used_bins`](Self::set_used_bins) is called.
    pub fn set_bin_size(&mut self, bin_width: usize, bin_height: usize) {
        if bin_width == 0
            || bin_height == 0
            || bin_width > self.width
            || bin_height > self.height
        {
            return;
        }
        self.bin_width = bin_width;
        self.bin_height = bin_height;
        self.max_bins_x = self.width / bin_width;
        self.max_bins_y = self.height / bin_height;
        self.bin_size_set = true;
        if self.used_bins_set {
            let (ux, uy) = (self.used_bins_x, self.used_bins_y);
            self.set_used_bins(ux, uy);
        }
    }

    /// Chooses how many bins of the grid to drive, clamped to the maximum,
    /// and centers that region on the board with the leftover pixels split
    /// before and after. No-op until a bin size has been set.
    pub fn set_used_bins(&mut self, used_x: usize, used_y: usize) {
        if !self.bin_size_set {
            return;
        }
        self.used_bins_x = used_x.min(self.max_bins_x);
        self.used_bins_y = used_y.min(self.max_bins_y);
        self.origin_x = (self.width - self.used_bins_x * self.bin_width) / 2;
        self.origin_y = (self.height - self.used_bins_y * self.bin_height) / 2;
        self.used_bins_set = true;
    }

    /// Whether the full setup sequence has completed.
    pub fn is_ready(&self) -> bool {
        self.bin_size_set && self.used_bins_set
    }

    /// Board width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Board height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Bytes per pixel.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Byte length of one device image for this board.
    pub fn image_len(&self) -> usize {
        self.width * self.height * self.depth
    }

    /// Largest bin grid that fits the board, `(x, y)`.
    pub fn max_bins(&self) -> (usize, usize) {
        (self.max_bins_x, self.max_bins_y)
    }

    /// Bin counts currently driven, `(x, y)`.
    pub fn used_bins(&self) -> (usize, usize) {
        (self.used_bins_x, self.used_bins_y)
    }

    /// Number of driven bins.
    pub fn bin_count(&self) -> usize {
        self.used_bins_x * self.used_bins_y
    }

    /// Genome bytes needed to drive this board: one byte per bin on 8-bit
    /// boards, two on 16-bit boards.
    pub fn genome_length(&self) -> usize {
        self.bin_count() * self.depth
    }

    /// Pixel size of one bin, `(width, height)`.
    pub fn bin_size(&self) -> (usize, usize) {
        (self.bin_width, self.bin_height)
    }

    /// Top-left pixel of the driven region.
    pub fn origin(&self) -> (usize, usize) {
        (self.origin_x, self.origin_y)
    }

    /// Installs a device lookup table. No-op unless it has exactly
    /// [`LUT_LEN`] entries.
    pub fn set_lut(&mut self, lut: Vec<u16>) {
        if lut.len() == LUT_LEN {
            self.lut = Some(lut);
        }
    }

    /// Installs a per-pixel wavefront correction image. No-op unless it has
    /// exactly one entry per board pixel.
    pub fn set_wavefront_correction(&mut self, correction: Vec<u16>) {
        if correction.len() == self.width * self.height {
            self.correction = Some(correction);
        }
    }

    /// Whether a lookup table is installed.
    pub fn has_lut(&self) -> bool {
        self.lut.is_some()
    }

    /// Whether a wavefront correction image is installed.
    pub fn has_correction(&self) -> bool {
        self.correction.is_some()
    }

    /// Zeroes a device image buffer.
    ///
    /// Translation never clears pixels outside the driven region, so callers
    /// reusing buffers across reconfigurations zero them explicitly.
    pub fn zero_image(&self, out: &mut [u8]) {
        out.fill(0);
    }

    /// Expands a genome into a device image, one replicated block per bin.
    ///
    /// Bin values are consumed row-major, one genome byte per bin on 8-bit
    /// boards and two little-endian bytes on 16-bit boards. Each pixel gets
    /// the bin value low byte first, with the high byte appended on 16-bit
    /// boards. Pixels outside the driven region are left untouched. No-op if
    /// setup is incomplete or either buffer has the wrong length.
    pub fn translate_image(&self, bins: &[u8], out: &mut [u8]) {
        if !self.is_ready()
            || bins.len() < self.genome_length()
            || out.len() != self.image_len()
        {
            return;
        }
        for by in 0..self.used_bins_y {
            for bx in 0..self.used_bins_x {
                let at = (by * self.used_bins_x + bx) * self.depth;
                let value = if self.depth > 1 {
                    u16::from_le_bytes([bins[at], bins[at + 1]])
                } else {
                    u16::from(bins[at])
                };
                self.write_bin_block(out, bx, by, value);
            }
        }
    }

    /// Rewrites a single bin's block in an already translated image.
    /// No-op if setup is incomplete, the bin is out of range, or the buffer
    /// has the wrong length.
    pub fn update_single_bin(&self, out: &mut [u8], bin_x: usize, bin_y: usize, value: u8) {
        if !self.is_ready()
            || bin_x >= self.used_bins_x
            || bin_y >= self.used_bins_y
            || out.len() != self.image_len()
        {
            return;
        }
        self.write_bin_block(out, bin_x, bin_y, u16::from(value));
    }

    /// [`update_single_bin`](Self::update_single_bin) addressed by flat
    /// row-major bin index.
    pub fn update_single_bin_index(&self, out: &mut [u8], index: usize, value: u8) {
        if self.used_bins_x == 0 {
            return;
        }
        let bin_x = index % self.used_bins_x;
        let bin_y = index / self.used_bins_x;
        self.update_single_bin(out, bin_x, bin_y, value);
    }

    /// Remaps a 16-bit device image through the installed lookup table.
    ///
    /// Pixels are little-endian byte pairs, matching what
    /// [`translate_image`](Self::translate_image) writes. No-op unless the
    /// board is 16-bit, a table is installed, and the buffer length matches.
    pub fn apply_lut(&self, image: &mut [u8]) {
        let Some(lut) = &self.lut else {
            return;
        };
        if self.depth != 2 || image.len() != self.image_len() {
            return;
        }
        for px in image.chunks_exact_mut(2) {
            let mapped = lut[u16::from_le_bytes([px[0], px[1]]) as usize];
            let [lo, hi] = mapped.to_le_bytes();
            px[0] = lo;
            px[1] = hi;
        }
    }

    /// Adds the wavefront correction to each pixel (wrapping at 16 bits)
    /// before remapping through the lookup table. No-op under the same
    /// conditions as [`apply_lut`](Self::apply_lut), or when no correction
    /// image is installed.
    pub fn apply_lut_with_correction(&self, image: &mut [u8]) {
        let (Some(lut), Some(correction)) = (&self.lut, &self.correction) else {
            return;
        };
        if self.depth != 2 || image.len() != self.image_len() {
            return;
        }
        for (px, corr) in image.chunks_exact_mut(2).zip(correction.iter()) {
            let raw = u16::from_le_bytes([px[0], px[1]]);
            let mapped = lut[raw.wrapping_add(*corr) as usize];
            let [lo, hi] = mapped.to_le_bytes();
            px[0] = lo;
            px[1] = hi;
        }
    }

    fn write_bin_block(&self, out: &mut [u8], bin_x: usize, bin_y: usize, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        let left = self.origin_x + bin_x * self.bin_width;
        let top = self.origin_y + bin_y * self.bin_height;
        for row in top..top + self.bin_height {
            let row_base = (row * self.width + left) * self.depth;
            for col in 0..self.bin_width {
                let px = row_base + col * self.depth;
                out[px] = lo;
                if self.depth > 1 {
                    out[px + 1] = hi;
                }
            }
        }
    }
}
