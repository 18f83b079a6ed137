//! Full-size roulette GA with elitism and convergence-triggered reseeding.

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use super::core::{crossover_genomes, roulette_index, CrossoverOutcome, PopulationCore, PopulationSettings};
use super::types::Individual;

/// Classic generational GA.
///
/// Each turnover ranks the population by fitness, fills the non-elite slots
/// with children of roulette-picked parents (mutation enabled), and carries
/// the elites over unchanged. When every non-elite crossover reports its
/// parents diverged, the first half of the new generation is reseeded with
/// fresh random genomes.
#[derive(Debug)]
pub struct SimpleGaPopulation {
    core: PopulationCore,
    parallel: bool,
}

impl SimpleGaPopulation {
    /// Builds a randomly initialized population.
    pub fn new(settings: PopulationSettings, rng: StdRng) -> Self {
        Self {
            core: PopulationCore::new(settings, rng),
            parallel: false,
        }
    }

    /// Enables breeding the non-elite slots on the rayon pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Shared population state.
    pub fn core(&self) -> &PopulationCore {
        &self.core
    }

    /// Mutable shared population state.
    pub fn core_mut(&mut self) -> &mut PopulationCore {
        &mut self.core
    }

    /// Replaces the current generation with the next one.
    ///
    /// The new generation is assembled completely before it is installed, so
    /// readers never observe a half-built population.
    pub fn next_generation(&mut self) {
        let size = self.core.size();
        let elite = self.core.elite_size();
        let slots = size - elite;
        let sorted = self.core.sorted_individuals();
        let fitness_sum: f64 = sorted.iter().map(|i| i.fitness()).sum();

        let children = if slots == 0 {
            Vec::new()
        } else if self.parallel && slots > 1 {
            self.breed_parallel(&sorted, fitness_sum, slots)
        } else {
            self.breed_sequential(&sorted, fitness_sum, slots)
        };

        let all_diverged = !children.is_empty() && children.iter().all(|c| c.diverged);

        let mut next: Vec<Individual> = Vec::with_capacity(size);
        next.extend(children.into_iter().map(|c| Individual::new(c.genome)));
        next.extend(sorted[slots..].iter().cloned());

        if all_diverged {
            debug!("every crossover diverged; reseeding the first half of the population");
            for slot in next.iter_mut().take(size / 2) {
                let genome = self.core.random_genome();
                slot.set_genome(genome);
            }
        }

        self.core.replace_individuals(next);
    }

    fn breed_sequential(
        &mut self,
        sorted: &[Individual],
        fitness_sum: f64,
        slots: usize,
    ) -> Vec<CrossoverOutcome> {
        (0..slots)
            .map(|_| {
                let a = self.core.roulette_index(sorted, fitness_sum);
                let b = self.core.roulette_index(sorted, fitness_sum);
                self.core
                    .crossover(sorted[a].genome(), sorted[b].genome(), true)
            })
            .collect()
    }

    /// Breeds the non-elite slots in disjoint contiguous chunks, one worker
    /// and one derived random source per chunk.
    fn breed_parallel(
        &mut self,
        sorted: &[Individual],
        fitness_sum: f64,
        slots: usize,
    ) -> Vec<CrossoverOutcome> {
        let accepted_similarity = self.core.accepted_similarity();
        let chunk = slots.div_ceil(rayon::current_num_threads().max(1));
        let seeds: Vec<u64> = (0..slots.div_ceil(chunk))
            .map(|_| self.core.next_seed())
            .collect();

        let mut outcomes = vec![
            CrossoverOutcome {
                genome: Vec::new(),
                diverged: false,
            };
            slots
        ];
        outcomes
            .par_chunks_mut(chunk)
            .zip(seeds.par_iter())
            .for_each(|(chunk_slots, &seed)| {
                let mut rng = StdRng::seed_from_u64(seed);
                for slot in chunk_slots {
                    let a = roulette_index(&mut rng, sorted, fitness_sum);
                    let b = roulette_index(&mut rng, sorted, fitness_sum);
                    *slot = crossover_genomes(
                        &mut rng,
                        sorted[a].genome(),
                        sorted[b].genome(),
                        true,
                        accepted_similarity,
                    );
                }
            });
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::types::UNEVALUATED_FITNESS;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    fn ranked_population(size: usize, elite: usize, genome_length: usize) -> SimpleGaPopulation {
        let settings = PopulationSettings::new(genome_length)
            .with_population_size(size)
            .with_elite_size(elite);
        let mut population = SimpleGaPopulation::new(settings, rng(100));
        for index in 0..size {
            population.core_mut().set_fitness(index, index as f64 + 1.0);
        }
        population
    }

    // ---- turnover structure ----

    #[test]
    fn test_population_size_and_genome_length_are_invariant() {
        let mut population = ranked_population(6, 2, 16);
        for _ in 0..5 {
            population.next_generation();
            assert_eq!(population.core().size(), 6);
            for index in 0..6 {
                assert_eq!(population.core().genome(index).len(), 16);
            }
            // children need fresh measurements before the next turnover
            for index in 0..6 {
                population.core_mut().set_fitness(index, index as f64 + 1.0);
            }
        }
    }

    #[test]
    fn test_elites_survive_byte_identical_in_top_slots() {
        let mut population = ranked_population(6, 2, 16);
        let best = population.core().genome(5).to_vec();
        let second = population.core().genome(4).to_vec();

        population.next_generation();

        assert_eq!(population.core().genome(5), best.as_slice());
        assert_eq!(population.core().genome(4), second.as_slice());
        assert_eq!(population.core().fitness(5), 6.0, "elites keep their fitness");
        assert_eq!(population.core().fitness(4), 5.0);
    }

    #[test]
    fn test_children_start_unevaluated() {
        let mut population = ranked_population(6, 2, 16);
        population.next_generation();
        for index in 0..4 {
            assert_eq!(
                population.core().fitness(index),
                UNEVALUATED_FITNESS,
                "slot {} holds a fresh child",
                index
            );
        }
    }

    #[test]
    fn test_parallel_breeding_matches_turnover_structure() {
        let settings = PopulationSettings::new(24)
            .with_population_size(10)
            .with_elite_size(3);
        let mut population = SimpleGaPopulation::new(settings, rng(7)).with_parallel(true);
        for index in 0..10 {
            population.core_mut().set_fitness(index, index as f64 + 1.0);
        }
        let best = population.core().genome(9).to_vec();

        population.next_generation();

        assert_eq!(population.core().size(), 10);
        assert_eq!(population.core().genome(9), best.as_slice());
        for index in 0..7 {
            assert_eq!(population.core().fitness(index), UNEVALUATED_FITNESS);
            assert_eq!(population.core().genome(index).len(), 24);
        }
    }

    // ---- convergence reseeding ----

    /// Marks every crossover as diverged by setting the similarity threshold
    /// above any possible agreement fraction.
    fn uniform_population(accepted_similarity: f64) -> SimpleGaPopulation {
        let settings = PopulationSettings::new(32)
            .with_population_size(4)
            .with_elite_size(2)
            .with_accepted_similarity(accepted_similarity);
        let mut population = SimpleGaPopulation::new(settings, rng(55));
        let clones: Vec<Individual> = (0..4)
            .map(|index| {
                let mut ind = Individual::new(vec![7u8; 32]);
                ind.set_fitness(index as f64 + 1.0);
                ind
            })
            .collect();
        population.core_mut().replace_individuals(clones);
        population
    }

    fn novel_genes(genome: &[u8]) -> usize {
        genome.iter().filter(|&&v| v != 7).count()
    }

    #[test]
    fn test_all_diverged_crossovers_reseed_first_half() {
        // Deliberate polarity: the reseed fires when every crossover reported
        // its parents DIVERGED, not when the population converged.
        let mut population = uniform_population(2.0);
        population.next_generation();
        // slots 0 and 1 form the first half; reseeded genomes are random
        // rather than copies of the all-7 parents
        for index in 0..2 {
            assert!(
                novel_genes(population.core().genome(index)) > 4,
                "slot {} still looks like a clone of the parents",
                index
            );
        }
        assert_eq!(
            population.core().genome(3),
            &[7u8; 32],
            "elites are outside the reseeded half"
        );
    }

    #[test]
    fn test_similar_crossovers_do_not_reseed() {
        let mut population = uniform_population(0.0);
        population.next_generation();
        // children of identical parents stay near-identical; only the rare
        // mutation strays
        for index in 0..2 {
            assert!(
                novel_genes(population.core().genome(index)) <= 4,
                "slot {} was unexpectedly reseeded",
                index
            );
        }
    }
}
