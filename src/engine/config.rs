//! Engine configuration.
//!
//! [`EngineConfig`] holds all parameters that control a closed-loop
//! optimization run.

use std::path::PathBuf;

use super::stop::StopConditions;

/// Optimization strategy driven by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Algorithm {
    /// Roulette-selected genetic algorithm with elitism.
    #[default]
    SimpleGa,
    /// Small-population GA with fixed elite pairings and restarts.
    MicroGa,
    /// Exhaustive per-bin phase sweep.
    BruteForce,
}

/// Configuration for [`super::OptimizationEngine`].
///
/// Controls the strategy, population shaping, modulator binning, the
/// fitness target, stop conditions, and run artifacts.
///
/// # Defaults
///
/// ```
/// use wavefront_ga::engine::{Algorithm, EngineConfig};
///
/// let config = EngineConfig::default();
/// assert_eq!(config.algorithm, Algorithm::SimpleGa);
/// assert_eq!(config.population_size, 30);
/// assert_eq!(config.bin_width, 16);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use wavefront_ga::engine::EngineConfig;
///
/// let config = EngineConfig::micro_ga()
///     .with_bin_size(32, 32)
///     .with_target_radius(12.0)
///     .with_seed(42);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Optimization strategy.
    pub algorithm: Algorithm,

    /// Number of individuals per board population.
    ///
    /// The micro GA needs at least 3; the simple GA at least 2.
    pub population_size: usize,

    /// Number of best individuals copied unchanged into the next generation.
    ///
    /// Only used by the simple GA.
    pub elite_size: usize,

    /// Fraction of genes two parents must share for a child to count as
    /// converged, in `0.0..=1.0`.
    pub accepted_similarity: f64,

    /// Whether to breed offspring in parallel using rayon.
    ///
    /// Hardware evaluation is always serialized by the channel regardless.
    pub parallel: bool,

    /// Bin width on the modulator in pixels.
    pub bin_width: u32,

    /// Bin height on the modulator in pixels.
    pub bin_height: u32,

    /// Number of bin columns; 0 uses as many as fit the board.
    pub bins_x: u32,

    /// Number of bin rows; 0 uses as many as fit the board.
    pub bins_y: u32,

    /// Radius in pixels of the circular target region on the camera frame.
    pub target_radius: f64,

    /// Fitness above which a shorter camera exposure is requested.
    ///
    /// Keeps the detector out of saturation as the focus brightens.
    /// Non-positive disables exposure adaptation.
    pub fitness_ceiling: f64,

    /// Phase increment for the brute-force sweep.
    ///
    /// Each bin is tried at `0, step, 2*step, ...` up to 255.
    pub phase_step: u8,

    /// Stop rule checked once per generation.
    pub stop: StopConditions,

    /// Random seed for reproducibility.
    ///
    /// `None` uses a random seed. Each board population derives its own
    /// stream from this seed.
    pub seed: Option<u64>,

    /// Directory run artifacts are written into.
    pub output_dir: PathBuf,

    /// Whether to write the per-generation best-fitness CSV.
    pub write_generation_log: bool,

    /// Whether to write the per-evaluation fitness timeline CSV.
    pub write_timeline_log: bool,

    /// Whether to dump the effective parameters alongside the run.
    pub write_parameter_dump: bool,

    /// Whether to save the best camera frame and device images as PNG.
    pub save_best_images: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::SimpleGa,
            population_size: 30,
            elite_size: 5,
            accepted_similarity: 0.9,
            parallel: true,
            bin_width: 16,
            bin_height: 16,
            bins_x: 0,
            bins_y: 0,
            target_radius: 25.0,
            fitness_ceiling: 250.0,
            phase_step: 16,
            stop: StopConditions::default(),
            seed: None,
            output_dir: PathBuf::from("runs"),
            write_generation_log: true,
            write_timeline_log: true,
            write_parameter_dump: true,
            save_best_images: true,
        }
    }
}

impl EngineConfig {
    /// Preset for the simple GA with its stock population shape.
    pub fn simple_ga() -> Self {
        Self::default()
    }

    /// Preset for the micro GA: 5 individuals, single elite.
    pub fn micro_ga() -> Self {
        Self {
            algorithm: Algorithm::MicroGa,
            population_size: 5,
            elite_size: 1,
            ..Self::default()
        }
    }

    /// Preset for the exhaustive per-bin sweep.
    pub fn brute_force() -> Self {
        Self {
            algorithm: Algorithm::BruteForce,
            ..Self::default()
        }
    }

    /// Sets the optimization strategy.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the population size.
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the elite count.
    pub fn with_elite_size(mut self, n: usize) -> Self {
        self.elite_size = n;
        self
    }

    /// Sets the convergence similarity threshold.
    pub fn with_accepted_similarity(mut self, similarity: f64) -> Self {
        self.accepted_similarity = similarity.clamp(0.0, 1.0);
        self
    }

    /// Enables or disables parallel breeding.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the bin size in modulator pixels.
    pub fn with_bin_size(mut self, width: u32, height: u32) -> Self {
        self.bin_width = width;
        self.bin_height = height;
        self
    }

    /// Sets the bin grid; 0 in either axis uses as many bins as fit.
    pub fn with_bins(mut self, bins_x: u32, bins_y: u32) -> Self {
        self.bins_x = bins_x;
        self.bins_y = bins_y;
        self
    }

    /// Sets the target region radius in camera pixels.
    pub fn with_target_radius(mut self, radius: f64) -> Self {
        self.target_radius = radius;
        self
    }

    /// Sets the exposure adaptation ceiling; non-positive disables it.
    pub fn with_fitness_ceiling(mut self, ceiling: f64) -> Self {
        self.fitness_ceiling = ceiling;
        self
    }

    /// Sets the brute-force phase increment.
    pub fn with_phase_step(mut self, step: u8) -> Self {
        self.phase_step = step;
        self
    }

    /// Sets the stop conditions.
    pub fn with_stop(mut self, stop: StopConditions) -> Self {
        self.stop = stop;
        self
    }

    /// Sets the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the artifact output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Enables or disables every run artifact at once.
    pub fn with_artifacts(mut self, enabled: bool) -> Self {
        self.write_generation_log = enabled;
        self.write_timeline_log = enabled;
        self.write_parameter_dump = enabled;
        self.save_best_images = enabled;
        self
    }

    /// Validates the configuration.
    ///
    /// Returns `Err` with a description if any parameter is invalid.
    pub fn validate(&self) -> Result<(), String> {
        match self.algorithm {
            Algorithm::SimpleGa => {
                if self.population_size < 2 {
                    return Err("population_size must be at least 2 for the simple GA".into());
                }
            }
            Algorithm::MicroGa => {
                if self.population_size < 3 {
                    return Err("population_size must be at least 3 for the micro GA".into());
                }
            }
            Algorithm::BruteForce => {
                if self.phase_step == 0 {
                    return Err("phase_step must be at least 1".into());
                }
            }
        }
        if !(0.0..=1.0).contains(&self.accepted_similarity) {
            return Err("accepted_similarity must be within 0.0..=1.0".into());
        }
        if self.bin_width == 0 || self.bin_height == 0 {
            return Err("bin dimensions must be at least 1 pixel".into());
        }
        if self.target_radius <= 0.0 {
            return Err("target_radius must be positive".into());
        }
        if self.stop.min_seconds < 0.0 {
            return Err("min_seconds must be non-negative".into());
        }
        Ok(())
    }
}
