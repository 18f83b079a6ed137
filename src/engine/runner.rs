//! The closed-loop optimization driver.
//!
//! [`OptimizationEngine`] wires the population strategies, the bin scalers,
//! and the hardware evaluation channel into one generation loop. Each
//! generation evaluates every individual (one thread per individual when
//! parallel), feeds the measured fitness back into the per-board populations,
//! advances them, services the adaptive-exposure flag, and consults the stop
//! rule.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::fitness::{exposure_normalized, CircularTarget};
use crate::hardware::{Camera, EvaluationChannel, Modulator};
use crate::population::{
    MicroGaPopulation, Population, PopulationSettings, SimpleGaPopulation, UNEVALUATED_FITNESS,
};
use crate::scaler::BinScaler;

use super::artifacts::RunLogger;
use super::brute;
use super::config::{Algorithm, EngineConfig};
use super::error::EngineError;
use super::state::{BestSnapshot, RunPhase, RunState};
use super::stop::StopReason;

/// Requests that a running optimization stop.
///
/// Handles are cheap to clone and safe to trigger from any thread. The
/// request is observed at the top of each generation and at evaluation
/// entry; an in-flight hardware operation is never interrupted. A request
/// raised before [`OptimizationEngine::run`] stops the run on its first
/// check, and it stays in force for later runs of the same engine.
#[derive(Debug, Clone)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    /// Raises the stop request.
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether a stop has been requested.
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of one optimization run.
#[derive(Debug)]
pub struct RunReport {
    /// Why the run stopped.
    pub stop_reason: StopReason,
    /// Completed generations (committed bins for the brute-force sweep).
    pub generations: u64,
    /// Hardware evaluations that produced a fitness reading.
    pub evaluations: u64,
    /// Wall-clock duration of the loop.
    pub elapsed: Duration,
    /// Best evaluation seen, if any succeeded.
    pub best: Option<BestSnapshot>,
    /// Best fitness of each generation in order.
    pub fitness_history: Vec<f64>,
    /// Initial exposure divided by final exposure.
    pub final_exposure_ratio: f64,
    /// Finalized artifact paths.
    pub artifacts: Vec<PathBuf>,
}

/// Everything an evaluation needs, shared by reference across the worker
/// threads of one generation.
pub(crate) struct EvalContext<'a, M: Modulator, C: Camera> {
    pub(crate) channel: &'a EvaluationChannel<M, C>,
    pub(crate) scalers: &'a [BinScaler],
    pub(crate) target: &'a CircularTarget,
    pub(crate) state: &'a RunState,
    pub(crate) logger: &'a RunLogger,
    pub(crate) abort: &'a AtomicBool,
    pub(crate) fitness_ceiling: f64,
}

/// Closed-loop optimizer over a modulator and camera pair.
///
/// The engine owns the devices through an [`EvaluationChannel`] and one
/// [`BinScaler`] per board. Populations are rebuilt for every
/// [`run`](Self::run), so an engine can run repeatedly; device state such
/// as the camera exposure carries across runs.
pub struct OptimizationEngine<M: Modulator, C: Camera> {
    config: EngineConfig,
    channel: EvaluationChannel<M, C>,
    scalers: Vec<BinScaler>,
    target: CircularTarget,
    abort: Arc<AtomicBool>,
    phase: RunPhase,
}

impl<M: Modulator, C: Camera> OptimizationEngine<M, C> {
    /// Builds an engine over the given devices.
    ///
    /// One scaler is configured per modulator board from the config's bin
    /// geometry; a zero bin count in either axis uses as many bins as fit
    /// that board. Geometry that does not fit is caught by
    /// [`run`](Self::run), not here.
    pub fn new(modulator: M, camera: C, config: EngineConfig) -> Self {
        let channel = EvaluationChannel::new(modulator, camera);
        let scalers = channel
            .board_shapes()
            .iter()
            .map(|shape| {
                let mut scaler = BinScaler::new(shape.width, shape.height, shape.depth);
                scaler.set_bin_size(config.bin_width as usize, config.bin_height as usize);
                let (max_x, max_y) = scaler.max_bins();
                let used_x = if config.bins_x == 0 { max_x } else { config.bins_x as usize };
                let used_y = if config.bins_y == 0 { max_y } else { config.bins_y as usize };
                scaler.set_used_bins(used_x, used_y);
                scaler
            })
            .collect();
        let target = CircularTarget::new(config.target_radius);
        Self {
            config,
            channel,
            scalers,
            target,
            abort: Arc::new(AtomicBool::new(false)),
            phase: RunPhase::NotStarted,
        }
    }

    /// Handle for stopping a run from another thread.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle(Arc::clone(&self.abort))
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// The per-board scalers, in board order.
    pub fn scalers(&self) -> &[BinScaler] {
        &self.scalers
    }

    /// Installs a device lookup table for one board.
    ///
    /// Tables with the wrong entry count are ignored by the scaler.
    pub fn set_lut(&mut self, board: usize, lut: Vec<u16>) {
        match self.scalers.get_mut(board) {
            Some(scaler) => scaler.set_lut(lut),
            None => warn!("ignoring lookup table for unknown board {board}"),
        }
    }

    /// Installs a wavefront correction image for one board.
    ///
    /// Images with the wrong pixel count are ignored by the scaler.
    pub fn set_wavefront_correction(&mut self, board: usize, correction: Vec<u16>) {
        match self.scalers.get_mut(board) {
            Some(scaler) => scaler.set_wavefront_correction(correction),
            None => warn!("ignoring wavefront correction for unknown board {board}"),
        }
    }

    /// Consumes the engine, returning the devices.
    pub fn into_devices(self) -> (M, C) {
        self.channel.into_parts()
    }

    /// Runs one optimization to completion.
    ///
    /// Validates the configuration against the hardware, drives the
    /// configured strategy until the stop rule fires, then saves artifacts
    /// and returns the report.
    pub fn run(&mut self) -> Result<RunReport, EngineError> {
        self.phase = RunPhase::Preparing;
        let result = self.run_inner();
        self.phase = RunPhase::Done;
        result
    }

    fn run_inner(&mut self) -> Result<RunReport, EngineError> {
        self.config.validate().map_err(EngineError::Config)?;
        if self.scalers.is_empty() {
            return Err(EngineError::Config("modulator reports no boards".into()));
        }
        for (board, scaler) in self.scalers.iter().enumerate() {
            if !scaler.is_ready() || scaler.bin_count() == 0 {
                return Err(EngineError::Config(format!(
                    "bin size {}x{} does not fit board {board} ({}x{} px)",
                    self.config.bin_width,
                    self.config.bin_height,
                    scaler.width(),
                    scaler.height()
                )));
            }
        }

        let mut logger = RunLogger::create(&self.config)?;
        let state = RunState::new();
        let started = Instant::now();
        let base_seed = self.config.seed.unwrap_or_else(rand::random);
        info!(
            "starting {:?} run on {} board(s), seed {base_seed}",
            self.config.algorithm,
            self.scalers.len()
        );

        self.phase = RunPhase::Running;
        let ctx = EvalContext {
            channel: &self.channel,
            scalers: &self.scalers,
            target: &self.target,
            state: &state,
            logger: &logger,
            abort: &self.abort,
            fitness_ceiling: self.config.fitness_ceiling,
        };
        let (stop_reason, generations, evaluations, history) = match self.config.algorithm {
            Algorithm::BruteForce => brute::drive_sweep(&ctx, &self.config, started),
            Algorithm::SimpleGa | Algorithm::MicroGa => {
                let mut populations: Vec<Population> = self
                    .scalers
                    .iter()
                    .enumerate()
                    .map(|(board, scaler)| {
                        self.population_for(scaler, base_seed.wrapping_add(board as u64))
                    })
                    .collect();
                drive_generations(&ctx, &self.config, &mut populations, started)
            }
        };
        let elapsed = started.elapsed();

        self.phase = RunPhase::ShuttingDown;
        info!(
            "run stopped ({stop_reason}) after {generations} generation(s), \
             {evaluations} evaluation(s), best fitness {:.3}",
            state.best_fitness()
        );

        let best = state.take_best();
        if let Some(best) = &best {
            logger.save_best_images(best, &self.channel.board_shapes())?;
        }
        let artifacts = logger.finalize()?;

        Ok(RunReport {
            stop_reason,
            generations,
            evaluations,
            elapsed,
            best,
            fitness_history: history,
            final_exposure_ratio: self.channel.exposure_ratio(),
            artifacts,
        })
    }

    fn population_for(&self, scaler: &BinScaler, seed: u64) -> Population {
        let settings = PopulationSettings::new(scaler.genome_length())
            .with_population_size(self.config.population_size)
            .with_elite_size(self.config.elite_size)
            .with_accepted_similarity(self.config.accepted_similarity);
        let rng = StdRng::seed_from_u64(seed);
        match self.config.algorithm {
            Algorithm::MicroGa => Population::Micro(MicroGaPopulation::new(settings, rng)),
            _ => Population::Simple(
                SimpleGaPopulation::new(settings, rng).with_parallel(self.config.parallel),
            ),
        }
    }
}

/// Generation loop shared by both GA strategies.
///
/// Returns the stop reason, completed generations, successful evaluations,
/// and the per-generation best fitness history.
fn drive_generations<M: Modulator, C: Camera>(
    ctx: &EvalContext<'_, M, C>,
    config: &EngineConfig,
    populations: &mut [Population],
    started: Instant,
) -> (StopReason, u64, u64, Vec<f64>) {
    let size = populations.first().map(|p| p.size()).unwrap_or(0);
    let mut generation: u64 = 0;
    let mut evaluations: u64 = 0;
    let mut history = Vec::new();

    loop {
        if ctx.abort.load(Ordering::Relaxed) {
            return (StopReason::Aborted, generation, evaluations, history);
        }

        ctx.state.reset_measurements(size);
        {
            // One genome set per individual, spanning every board.
            let jobs: Vec<Vec<&[u8]>> = (0..size)
                .map(|index| populations.iter().map(|p| p.genome(index)).collect())
                .collect();
            if config.parallel {
                thread::scope(|scope| {
                    for (index, genomes) in jobs.iter().enumerate() {
                        scope.spawn(move || evaluate_individual(ctx, index, generation, genomes));
                    }
                });
            } else {
                for (index, genomes) in jobs.iter().enumerate() {
                    evaluate_individual(ctx, index, generation, genomes);
                }
            }
        }

        let measured = ctx.state.take_measurements();
        for population in populations.iter_mut() {
            for (index, &fitness) in measured.iter().enumerate() {
                // A failed evaluation keeps its slot unevaluated.
                if fitness != UNEVALUATED_FITNESS {
                    population.set_fitness(index, fitness);
                }
            }
        }
        evaluations += measured.iter().filter(|&&f| f != UNEVALUATED_FITNESS).count() as u64;

        let generation_best = measured.iter().copied().fold(UNEVALUATED_FITNESS, f64::max);
        history.push(generation_best);
        ctx.logger.log_generation(generation, generation_best);
        debug!("generation {generation}: best fitness {generation_best:.3}");
        generation += 1;

        for population in populations.iter_mut() {
            population.next_generation();
        }

        if ctx.state.take_exposure_request() {
            match ctx.channel.halve_exposure() {
                Ok(()) => info!(
                    "halved camera exposure to {:.3} ms",
                    ctx.channel.exposure_ms()
                ),
                Err(e) => warn!("exposure halving rejected: {e}"),
            }
        }

        let stop = config.stop.check(
            ctx.state.best_fitness(),
            started.elapsed().as_secs_f64(),
            generation,
            ctx.abort.load(Ordering::Relaxed),
        );
        if let Some(reason) = stop {
            return (reason, generation, evaluations, history);
        }
    }
}

/// Evaluates one individual: translate its genomes, display them, acquire a
/// frame, and record the exposure-normalized target intensity.
///
/// Hardware failures cost this individual its measurement and nothing else;
/// the slot stays unevaluated and the run continues.
fn evaluate_individual<M: Modulator, C: Camera>(
    ctx: &EvalContext<'_, M, C>,
    index: usize,
    generation: u64,
    genomes: &[&[u8]],
) {
    if ctx.abort.load(Ordering::Relaxed) {
        return;
    }

    let mut images = Vec::with_capacity(ctx.scalers.len());
    for (scaler, genome) in ctx.scalers.iter().zip(genomes) {
        let mut image = vec![0u8; scaler.image_len()];
        scaler.translate_image(genome, &mut image);
        if scaler.has_correction() {
            scaler.apply_lut_with_correction(&mut image);
        } else {
            scaler.apply_lut(&mut image);
        }
        images.push(image);
    }

    let frame = match ctx.channel.write_and_acquire(&images) {
        Ok(frame) => frame,
        Err(e) => {
            error!("evaluation of individual {index} failed: {e}");
            return;
        }
    };

    let raw = ctx
        .target
        .mean_intensity(frame.data(), frame.width(), frame.height());
    let ratio = ctx.channel.exposure_ratio();
    let fitness = exposure_normalized(raw, ratio);

    ctx.state.record_measurement(index, fitness);
    ctx.logger.log_sample(fitness, ctx.channel.exposure_ms(), ratio);

    if ctx.fitness_ceiling > 0.0 && fitness > ctx.fitness_ceiling {
        ctx.state.request_shorter_exposure();
    }

    if fitness > ctx.state.best_fitness() {
        ctx.state.offer_best(BestSnapshot {
            fitness,
            generation,
            index,
            frame,
            device_images: images,
        });
    }
}
