//! Population strategies driving the genome search.
//!
//! [`PopulationCore`] carries the individuals and the mechanics every
//! strategy shares; [`SimpleGaPopulation`] and [`MicroGaPopulation`] decide
//! how generations turn over. The [`Population`] enum lets the engine hold
//! either strategy behind one dispatch surface, one instance per modulator
//! board.

pub mod core;
pub mod micro;
pub mod simple;
pub mod types;

pub use self::core::{
    crossover_genomes, random_genome, roulette_index, CrossoverOutcome, PopulationCore,
    PopulationSettings, MUTATION_PROBABILITY,
};
pub use self::micro::MicroGaPopulation;
pub use self::simple::SimpleGaPopulation;
pub use self::types::{Genome, Individual, UNEVALUATED_FITNESS};

/// A population strategy behind one dispatch surface.
#[derive(Debug)]
pub enum Population {
    /// Full-size roulette GA with elitism.
    Simple(SimpleGaPopulation),
    /// Tiny elitist GA with restart and peak retention.
    Micro(MicroGaPopulation),
}

impl Population {
    /// Shared population state.
    pub fn core(&self) -> &PopulationCore {
        match self {
            Population::Simple(p) => p.core(),
            Population::Micro(p) => p.core(),
        }
    }

    /// Mutable shared population state.
    pub fn core_mut(&mut self) -> &mut PopulationCore {
        match self {
            Population::Simple(p) => p.core_mut(),
            Population::Micro(p) => p.core_mut(),
        }
    }

    /// Replaces the current generation with the next one.
    pub fn next_generation(&mut self) {
        match self {
            Population::Simple(p) => p.next_generation(),
            Population::Micro(p) => p.next_generation(),
        }
    }

    /// Number of individuals.
    pub fn size(&self) -> usize {
        self.core().size()
    }

    /// Genome of the individual at `index`.
    pub fn genome(&self, index: usize) -> &[u8] {
        self.core().genome(index)
    }

    /// Records a measured fitness for the individual at `index`.
    pub fn set_fitness(&mut self, index: usize, fitness: f64) {
        self.core_mut().set_fitness(index, fitness);
    }

    /// Highest-fitness individual, if any.
    pub fn best(&self) -> Option<&Individual> {
        self.core().best()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_enum_dispatches_to_both_strategies() {
        let simple = Population::Simple(SimpleGaPopulation::new(
            PopulationSettings::new(8).with_population_size(6),
            StdRng::seed_from_u64(1),
        ));
        let micro = Population::Micro(MicroGaPopulation::new(
            PopulationSettings::micro(8),
            StdRng::seed_from_u64(2),
        ));
        for mut population in [simple, micro] {
            let size = population.size();
            for index in 0..size {
                population.set_fitness(index, index as f64);
            }
            population.next_generation();
            assert_eq!(population.size(), size);
            assert_eq!(population.genome(0).len(), 8);
            assert!(population.best().is_some());
        }
    }
}
