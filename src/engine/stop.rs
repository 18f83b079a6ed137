//! Multi-criteria stop policy for optimization runs.

use std::fmt;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopReason {
    /// Fitness floor, minimum runtime, and minimum generations all cleared.
    ConditionsMet,
    /// An external abort was requested.
    Aborted,
    /// The wall-clock ceiling was reached.
    TimeCeiling,
    /// The generation ceiling was reached.
    GenerationCeiling,
    /// The work itself ran out (exhaustive sweeps only).
    Completed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::ConditionsMet => "stop conditions met",
            StopReason::Aborted => "aborted",
            StopReason::TimeCeiling => "time ceiling reached",
            StopReason::GenerationCeiling => "generation ceiling reached",
            StopReason::Completed => "sweep completed",
        };
        f.write_str(text)
    }
}

/// Combined stop rule checked once per generation.
///
/// A run stops when all three floors are cleared together (fitness strictly
/// above `fitness_floor`, elapsed time strictly above `min_seconds`,
/// completed generations strictly above `min_generations`), or when an abort
/// is requested, or when an enabled ceiling is reached. A ceiling of zero
/// (or below, for seconds) means no ceiling, so a run with floors that are
/// never cleared can be indefinite.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StopConditions {
    /// Fitness a run must strictly exceed before the floors clear.
    pub fitness_floor: f64,
    /// Seconds a run must strictly exceed before the floors clear.
    pub min_seconds: f64,
    /// Generations a run must strictly exceed before the floors clear.
    pub min_generations: u64,
    /// Hard wall-clock ceiling in seconds; non-positive disables it.
    pub max_seconds: f64,
    /// Hard generation ceiling; zero disables it.
    pub max_generations: u64,
}

impl Default for StopConditions {
    fn default() -> Self {
        Self {
            fitness_floor: 0.0,
            min_seconds: 0.0,
            min_generations: 0,
            max_seconds: 0.0,
            max_generations: 0,
        }
    }
}

impl StopConditions {
    /// Sets the fitness floor.
    pub fn with_fitness_floor(mut self, fitness_floor: f64) -> Self {
        self.fitness_floor = fitness_floor;
        self
    }

    /// Sets the minimum runtime in seconds.
    pub fn with_min_seconds(mut self, min_seconds: f64) -> Self {
        self.min_seconds = min_seconds;
        self
    }

    /// Sets the minimum number of generations.
    pub fn with_min_generations(mut self, min_generations: u64) -> Self {
        self.min_generations = min_generations;
        self
    }

    /// Sets the wall-clock ceiling in seconds; non-positive disables it.
    pub fn with_max_seconds(mut self, max_seconds: f64) -> Self {
        self.max_seconds = max_seconds;
        self
    }

    /// Sets the generation ceiling; zero disables it.
    pub fn with_max_generations(mut self, max_generations: u64) -> Self {
        self.max_generations = max_generations;
        self
    }

    /// Evaluates the rule against the run's current progress.
    ///
    /// `fitness` is the best fitness seen so far and `generations` the
    /// number of completed generations.
    pub fn check(
        &self,
        fitness: f64,
        elapsed_secs: f64,
        generations: u64,
        abort_requested: bool,
    ) -> Option<StopReason> {
        if fitness > self.fitness_floor
            && elapsed_secs > self.min_seconds
            && generations > self.min_generations
        {
            return Some(StopReason::ConditionsMet);
        }
        if abort_requested {
            return Some(StopReason::Aborted);
        }
        if self.max_seconds > 0.0 && elapsed_secs >= self.max_seconds {
            return Some(StopReason::TimeCeiling);
        }
        if self.max_generations > 0 && generations >= self.max_generations {
            return Some(StopReason::GenerationCeiling);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floors() -> StopConditions {
        StopConditions::default()
            .with_fitness_floor(5.0)
            .with_min_seconds(2.0)
            .with_min_generations(5)
    }

    // ---- floors ----

    #[test]
    fn test_all_floors_cleared_stops() {
        assert_eq!(
            floors().check(10.0, 3.0, 7, false),
            Some(StopReason::ConditionsMet)
        );
    }

    #[test]
    fn test_any_unmet_floor_keeps_running() {
        let stop = floors();
        assert_eq!(stop.check(4.0, 3.0, 7, false), None, "fitness floor unmet");
        assert_eq!(stop.check(10.0, 1.0, 7, false), None, "time floor unmet");
        assert_eq!(stop.check(10.0, 3.0, 4, false), None, "generation floor unmet");
    }

    #[test]
    fn test_floors_are_strict() {
        let stop = floors();
        assert_eq!(stop.check(5.0, 3.0, 7, false), None, "fitness must exceed the floor");
        assert_eq!(stop.check(10.0, 2.0, 7, false), None);
        assert_eq!(stop.check(10.0, 3.0, 5, false), None);
        assert_eq!(
            stop.check(5.000001, 2.000001, 6, false),
            Some(StopReason::ConditionsMet)
        );
    }

    // ---- abort ----

    #[test]
    fn test_abort_overrides_unmet_floors() {
        assert_eq!(
            floors().check(-1.0, 0.0, 0, true),
            Some(StopReason::Aborted)
        );
    }

    // ---- ceilings ----

    #[test]
    fn test_time_ceiling_is_inclusive() {
        let stop = StopConditions::default()
            .with_fitness_floor(f64::MAX)
            .with_max_seconds(5.0);
        assert_eq!(stop.check(0.0, 4.9, 100, false), None);
        assert_eq!(stop.check(0.0, 5.0, 100, false), Some(StopReason::TimeCeiling));
    }

    #[test]
    fn test_generation_ceiling_is_inclusive() {
        let stop = StopConditions::default()
            .with_fitness_floor(f64::MAX)
            .with_max_generations(5);
        assert_eq!(stop.check(0.0, 1.0, 4, false), None);
        assert_eq!(
            stop.check(0.0, 1.0, 5, false),
            Some(StopReason::GenerationCeiling)
        );
    }

    #[test]
    fn test_zero_ceilings_allow_indefinite_runs() {
        let stop = StopConditions::default().with_fitness_floor(f64::MAX);
        assert_eq!(
            stop.check(1e300, 1e9, u64::MAX - 1, false),
            None,
            "no ceiling and an uncleared floor never stop"
        );
    }

    #[test]
    fn test_default_floors_stop_on_first_positive_fitness() {
        let stop = StopConditions::default();
        assert_eq!(stop.check(0.1, 0.001, 1, false), Some(StopReason::ConditionsMet));
        assert_eq!(stop.check(-1.0, 0.001, 1, false), None, "sentinel fitness never clears");
    }
}
