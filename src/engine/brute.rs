//! Exhaustive per-bin phase sweep.
//!
//! Instead of evolving genomes, the sweep walks every bin of every board in
//! row-major order and tries each phase level `0, step, 2*step, ...`,
//! keeping the level that measured best before moving on. Each committed bin
//! counts as one generation for logging and stop-condition cadence, so the
//! same stop rule and exposure adaptation drive all strategies.

use std::sync::atomic::Ordering;
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::fitness::exposure_normalized;
use crate::hardware::{Camera, Modulator};
use crate::population::UNEVALUATED_FITNESS;

use super::config::EngineConfig;
use super::runner::EvalContext;
use super::state::BestSnapshot;
use super::stop::StopReason;

/// Drives the sweep until the stop rule fires or every bin is committed.
///
/// Returns the stop reason, committed bins, successful evaluations, and the
/// per-bin best fitness history.
pub(crate) fn drive_sweep<M: Modulator, C: Camera>(
    ctx: &EvalContext<'_, M, C>,
    config: &EngineConfig,
    started: Instant,
) -> (StopReason, u64, u64, Vec<f64>) {
    let mut images: Vec<Vec<u8>> = ctx
        .scalers
        .iter()
        .map(|scaler| vec![0u8; scaler.image_len()])
        .collect();
    let mut bins_done: u64 = 0;
    let mut evaluations: u64 = 0;
    let mut history = Vec::new();

    for (board, scaler) in ctx.scalers.iter().enumerate() {
        for bin in 0..scaler.bin_count() {
            let mut best_level = 0u8;
            let mut best_fitness = UNEVALUATED_FITNESS;

            for level in (0..=255u8).step_by(config.phase_step as usize) {
                if ctx.abort.load(Ordering::Relaxed) {
                    return (StopReason::Aborted, bins_done, evaluations, history);
                }
                scaler.update_single_bin_index(&mut images[board], bin, level);
                let Some(fitness) = measure_once(ctx, &images, bins_done) else {
                    // A failed level is skipped, not retried.
                    continue;
                };
                evaluations += 1;
                if fitness > best_fitness {
                    best_fitness = fitness;
                    best_level = level;
                }
            }

            // Commit the winner; if every level failed this leaves the bin
            // at phase zero.
            scaler.update_single_bin_index(&mut images[board], bin, best_level);
            debug!("board {board} bin {bin}: committed level {best_level} at {best_fitness:.3}");
            history.push(best_fitness);
            ctx.logger.log_generation(bins_done, best_fitness);
            bins_done += 1;

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
                bins_done,
                ctx.abort.load(Ordering::Relaxed),
            );
            if let Some(reason) = stop {
                return (reason, bins_done, evaluations, history);
            }
        }
    }

    // Leave the fully committed pattern on the modulator.
    if measure_once(ctx, &images, bins_done).is_some() {
        evaluations += 1;
    }
    (StopReason::Completed, bins_done, evaluations, history)
}

/// Displays `images` on every board, acquires one frame, and records the
/// exposure-normalized target intensity. Returns `None` when the hardware
/// section failed.
fn measure_once<M: Modulator, C: Camera>(
    ctx: &EvalContext<'_, M, C>,
    images: &[Vec<u8>],
    generation: u64,
) -> Option<f64> {
    let wire: Vec<Vec<u8>> = ctx
        .scalers
        .iter()
        .zip(images)
        .map(|(scaler, image)| {
            let mut copy = image.clone();
            if scaler.has_correction() {
                scaler.apply_lut_with_correction(&mut copy);
            } else {
                scaler.apply_lut(&mut copy);
            }
            copy
        })
        .collect();

    let frame = match ctx.channel.write_and_acquire(&wire) {
        Ok(frame) => frame,
        Err(e) => {
            error!("sweep evaluation failed: {e}");
            return None;
        }
    };

    let raw = ctx
        .target
        .mean_intensity(frame.data(), frame.width(), frame.height());
    let ratio = ctx.channel.exposure_ratio();
    let fitness = exposure_normalized(raw, ratio);

    ctx.logger.log_sample(fitness, ctx.channel.exposure_ms(), ratio);
    if ctx.fitness_ceiling > 0.0 && fitness > ctx.fitness_ceiling {
        ctx.state.request_shorter_exposure();
    }
    if fitness > ctx.state.best_fitness() {
        ctx.state.offer_best(BestSnapshot {
            fitness,
            generation,
            index: 0,
            frame,
            device_images: wire,
        });
    }
    Some(fitness)
}
