//! Run artifacts: CSV logs, parameter dumps, and best-result images.
//!
//! All files are written under the configured output directory with fixed
//! working names, then renamed with a UTC timestamp prefix when the run
//! finalizes. A crashed run therefore leaves its partial files behind under
//! the working names, where the next run overwrites them.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use chrono::Utc;
use image::{GrayImage, ImageBuffer, Luma};
use log::warn;
use parking_lot::Mutex;

use crate::hardware::BoardShape;

use super::config::EngineConfig;
use super::error::EngineError;
use super::state::BestSnapshot;

const GENERATION_LOG: &str = "generation_fitness.csv";
const TIMELINE_LOG: &str = "fitness_timeline.csv";
const PARAMETER_DUMP: &str = "parameters.txt";
const FRAME_IMAGE: &str = "best_frame.png";

/// Streams run artifacts to disk.
///
/// Generation and timeline rows are appended through shared references so
/// evaluation threads can log without blocking each other on the run loop.
/// Append failures are logged and swallowed: a full disk should not bring
/// down a running optimization.
pub(crate) struct RunLogger {
    dir: PathBuf,
    generation_log: Option<Mutex<BufWriter<File>>>,
    timeline_log: Option<Mutex<BufWriter<File>>>,
    save_images: bool,
    written: Vec<String>,
}

impl RunLogger {
    /// Opens the working files enabled by `config`.
    ///
    /// When every artifact toggle is off this creates nothing, not even the
    /// output directory.
    pub(crate) fn create(config: &EngineConfig) -> io::Result<Self> {
        let mut logger = Self {
            dir: config.output_dir.clone(),
            generation_log: None,
            timeline_log: None,
            save_images: config.save_best_images,
            written: Vec::new(),
        };

        let any_enabled = config.write_generation_log
            || config.write_timeline_log
            || config.write_parameter_dump
            || config.save_best_images;
        if !any_enabled {
            return Ok(logger);
        }
        fs::create_dir_all(&logger.dir)?;

        if config.write_generation_log {
            let mut writer = BufWriter::new(File::create(logger.dir.join(GENERATION_LOG))?);
            writeln!(writer, "generation,best_fitness")?;
            logger.generation_log = Some(Mutex::new(writer));
            logger.written.push(GENERATION_LOG.to_string());
        }
        if config.write_timeline_log {
            let mut writer = BufWriter::new(File::create(logger.dir.join(TIMELINE_LOG))?);
            writeln!(writer, "timestamp_ms,fitness,exposure_ms,exposure_ratio")?;
            logger.timeline_log = Some(Mutex::new(writer));
            logger.written.push(TIMELINE_LOG.to_string());
        }
        if config.write_parameter_dump {
            let mut writer = BufWriter::new(File::create(logger.dir.join(PARAMETER_DUMP))?);
            writeln!(writer, "{config:#?}")?;
            writer.flush()?;
            logger.written.push(PARAMETER_DUMP.to_string());
        }
        Ok(logger)
    }

    /// Appends one generation's best fitness.
    pub(crate) fn log_generation(&self, generation: u64, best_fitness: f64) {
        if let Some(log) = &self.generation_log {
            if let Err(e) = writeln!(log.lock(), "{generation},{best_fitness}") {
                warn!("could not append to the generation log: {e}");
            }
        }
    }

    /// Appends one evaluation to the fitness timeline, stamped with the
    /// current wall-clock time in milliseconds.
    pub(crate) fn log_sample(&self, fitness: f64, exposure_ms: f64, exposure_ratio: f64) {
        if let Some(log) = &self.timeline_log {
            let stamp = Utc::now().timestamp_millis();
            if let Err(e) = writeln!(
                log.lock(),
                "{stamp},{fitness},{exposure_ms},{exposure_ratio}"
            ) {
                warn!("could not append to the timeline log: {e}");
            }
        }
    }

    /// Saves the best camera frame and the device image of each board as PNG.
    ///
    /// 16-bit boards are decoded from little-endian byte pairs and saved as
    /// 16-bit grayscale.
    pub(crate) fn save_best_images(
        &mut self,
        best: &BestSnapshot,
        shapes: &[BoardShape],
    ) -> Result<(), EngineError> {
        if !self.save_images {
            return Ok(());
        }

        let frame = &best.frame;
        let frame_image = GrayImage::from_raw(
            frame.width() as u32,
            frame.height() as u32,
            frame.data().to_vec(),
        );
        match frame_image {
            Some(img) => {
                img.save(self.dir.join(FRAME_IMAGE))?;
                self.written.push(FRAME_IMAGE.to_string());
            }
            None => warn!("camera frame bytes do not match its dimensions, skipping save"),
        }

        for (board, (image, shape)) in best.device_images.iter().zip(shapes).enumerate() {
            let name = format!("best_board{board}.png");
            let path = self.dir.join(&name);
            if shape.depth > 1 {
                let words: Vec<u16> = image
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                match ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(
                    shape.width as u32,
                    shape.height as u32,
                    words,
                ) {
                    Some(img) => {
                        img.save(&path)?;
                        self.written.push(name);
                    }
                    None => warn!("board {board} image does not match its shape, skipping save"),
                }
            } else {
                match GrayImage::from_raw(shape.width as u32, shape.height as u32, image.clone()) {
                    Some(img) => {
                        img.save(&path)?;
                        self.written.push(name);
                    }
                    None => warn!("board {board} image does not match its shape, skipping save"),
                }
            }
        }
        Ok(())
    }

    /// Flushes every stream and stamps the working files with the finish
    /// time, returning the final paths.
    pub(crate) fn finalize(self) -> io::Result<Vec<PathBuf>> {
        if let Some(log) = self.generation_log {
            log.into_inner().flush()?;
        }
        if let Some(log) = self.timeline_log {
            log.into_inner().flush()?;
        }

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let mut finalized = Vec::with_capacity(self.written.len());
        for name in &self.written {
            let to = self.dir.join(format!("{stamp}_{name}"));
            fs::rename(self.dir.join(name), &to)?;
            finalized.push(to);
        }
        Ok(finalized)
    }
}
