//! Individual representation shared by all population strategies.
//!
//! An [`Individual`] couples a phase-mask genome with the fitness measured
//! for it on hardware. Genomes are plain byte vectors: one value per spatial
//! bin, flattened row-major, so the full `0..=255` phase range is exactly the
//! range of the element type.

/// Fitness value carried by an individual that has not been measured yet.
///
/// Real measurements are mean intensities and therefore non-negative, so a
/// negative sentinel can never collide with a genuine reading.
pub const UNEVALUATED_FITNESS: f64 = -1.0;

/// A phase mask candidate: one byte per spatial bin, flattened row-major.
pub type Genome = Vec<u8>;

/// A candidate solution with the fitness measured for it.
///
/// Individuals are owned exclusively by the population that created them and
/// are replaced wholesale each generation; once a fitness has been assigned
/// the genome is never mutated in place. `Clone` produces an independent
/// genome buffer, so copies never alias.
///
/// Ordering is by fitness alone, ascending: after a sort, index 0 holds the
/// worst individual and the last index the best.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Individual {
    genome: Genome,
    fitness: f64,
}

impl Individual {
    /// Wraps a genome with the unevaluated sentinel fitness.
    pub fn new(genome: Genome) -> Self {
        Self {
            genome,
            fitness: UNEVALUATED_FITNESS,
        }
    }

    /// Returns the genome.
    pub fn genome(&self) -> &[u8] {
        &self.genome
    }

    /// Replaces the genome, keeping the current fitness.
    ///
    /// Callers guarantee the new genome has the population's genome length;
    /// no validation happens here.
    pub fn set_genome(&mut self, genome: Genome) {
        self.genome = genome;
    }

    /// Returns the measured fitness, or [`UNEVALUATED_FITNESS`].
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    /// Records a measured fitness.
    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
    }

    /// Whether a fitness has been recorded for this individual.
    pub fn is_evaluated(&self) -> bool {
        self.fitness != UNEVALUATED_FITNESS
    }
}
