//! Shared population mechanics used by every strategy.
//!
//! [`PopulationCore`] owns the individuals, the sizing parameters, and the
//! strategy's private random source. Strategies compose it and drive the
//! generation turnover; the core supplies random genomes, fitness-ordered
//! copies, uniform crossover, and roulette-wheel picks.

use log::warn;
use rand::rngs::StdRng;
use rand::Rng;

use super::types::{Genome, Individual};

/// Per-gene mutation probability applied after the parent pick.
pub const MUTATION_PROBABILITY: f64 = 1.0 / 200.0;

/// Sizing and similarity parameters shared by the population strategies.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PopulationSettings {
    /// Genes per individual; one gene per driven spatial bin and plane.
    pub genome_length: usize,
    /// Individuals per generation.
    pub population_size: usize,
    /// Top-ranked individuals copied unchanged into the next generation.
    pub elite_size: usize,
    /// Parent-agreement fraction below which a crossover counts as diverged.
    pub accepted_similarity: f64,
}

impl PopulationSettings {
    /// Settings for a full-size population of the given genome length.
    pub fn new(genome_length: usize) -> Self {
        Self {
            genome_length,
            population_size: 30,
            elite_size: 5,
            accepted_similarity: 0.9,
        }
    }

    /// Reference sizing for the micro strategy: five individuals, one elite.
    pub fn micro(genome_length: usize) -> Self {
        Self {
            genome_length,
            population_size: 5,
            elite_size: 1,
            accepted_similarity: 0.9,
        }
    }

    /// Sets the number of individuals per generation.
    pub fn with_population_size(mut self, population_size: usize) -> Self {
        self.population_size = population_size;
        self
    }

    /// Sets the number of elites carried over unchanged.
    pub fn with_elite_size(mut self, elite_size: usize) -> Self {
        self.elite_size = elite_size;
        self
    }

    /// Sets the parent-agreement threshold used by crossover.
    pub fn with_accepted_similarity(mut self, accepted_similarity: f64) -> Self {
        self.accepted_similarity = accepted_similarity;
        self
    }

    /// Validates parameter sanity.
    pub fn validate(&self) -> Result<(), String> {
        if self.genome_length == 0 {
            return Err("genome_length must be at least 1".to_string());
        }
        if self.population_size < 2 {
            return Err("population_size must be at least 2".to_string());
        }
        if !(0.0..=1.0).contains(&self.accepted_similarity) {
            return Err(format!(
                "accepted_similarity must be within [0, 1], got {}",
                self.accepted_similarity
            ));
        }
        Ok(())
    }
}

/// Result of one crossover: the child genome plus the similarity verdict on
/// its parents.
#[derive(Debug, Clone)]
pub struct CrossoverOutcome {
    /// Child genome, unevaluated.
    pub genome: Genome,
    /// True when the parents agreed on fewer than `accepted_similarity` of
    /// the gene positions, i.e. the pair still carries diversity.
    pub diverged: bool,
}

/// Draws a fresh genome, each gene uniform over the full byte range.
pub fn random_genome<R: Rng>(rng: &mut R, genome_length: usize) -> Genome {
    (0..genome_length).map(|_| rng.random::<u8>()).collect()
}

/// Uniform crossover with per-gene mutation.
///
/// Each gene is copied from either parent with a fair coin flip; when
/// `mutate` is set, the copied gene is then replaced with a fresh uniform
/// value with probability [`MUTATION_PROBABILITY`]. The diverged flag
/// reflects parent agreement only, so mutation never influences it.
pub fn crossover_genomes<R: Rng>(
    rng: &mut R,
    parent_a: &[u8],
    parent_b: &[u8],
    mutate: bool,
    accepted_similarity: f64,
) -> CrossoverOutcome {
    debug_assert_eq!(parent_a.len(), parent_b.len());
    let genome_length = parent_a.len();
    let mut genome = Vec::with_capacity(genome_length);
    let mut same_count = 0usize;
    for gene in 0..genome_length {
        if parent_a[gene] == parent_b[gene] {
            same_count += 1;
        }
        let mut value = if rng.random_bool(0.5) {
            parent_a[gene]
        } else {
            parent_b[gene]
        };
        if mutate && rng.random::<f64>() < MUTATION_PROBABILITY {
            value = rng.random::<u8>();
        }
        genome.push(value);
    }
    let diverged = (same_count as f64 / genome_length as f64) < accepted_similarity;
    CrossoverOutcome { genome, diverged }
}

/// Roulette-wheel pick over a fitness-ascending slice.
///
/// Draws `u` uniform in `[0, fitness_sum)` and walks from index 0
/// accumulating fitness until the running sum exceeds `u`. Falls back to a
/// uniform pick when the sum is not positive (nothing evaluated yet) and to
/// the last index when accumulation never crosses `u`.
pub fn roulette_index<R: Rng>(rng: &mut R, sorted: &[Individual], fitness_sum: f64) -> usize {
    if fitness_sum <= 0.0 {
        return rng.random_range(0..sorted.len());
    }
    let u = rng.random_range(0.0..fitness_sum);
    let mut cumulative = 0.0;
    for (index, individual) in sorted.iter().enumerate() {
        cumulative += individual.fitness();
        if cumulative > u {
            return index;
        }
    }
    sorted.len() - 1 // floating-point fallback
}

/// Individuals plus the knobs and random source shared by the strategies.
#[derive(Debug)]
pub struct PopulationCore {
    individuals: Vec<Individual>,
    settings: PopulationSettings,
    rng: StdRng,
}

impl PopulationCore {
    /// Builds a population of random genomes.
    ///
    /// An elite size exceeding the population size is survivable; it is
    /// logged here and clamped wherever elites are copied.
    pub fn new(settings: PopulationSettings, mut rng: StdRng) -> Self {
        if settings.elite_size > settings.population_size {
            warn!(
                "elite size {} exceeds population size {}; clamping at turnover",
                settings.elite_size, settings.population_size
            );
        }
        let individuals = (0..settings.population_size)
            .map(|_| Individual::new(random_genome(&mut rng, settings.genome_length)))
            .collect();
        Self {
            individuals,
            settings,
            rng,
        }
    }

    /// Number of individuals.
    pub fn size(&self) -> usize {
        self.individuals.len()
    }

    /// Elite count, clamped to the population size.
    pub fn elite_size(&self) -> usize {
        self.settings.elite_size.min(self.individuals.len())
    }

    /// Genes per individual.
    pub fn genome_length(&self) -> usize {
        self.settings.genome_length
    }

    /// Parent-agreement threshold used by crossover.
    pub fn accepted_similarity(&self) -> f64 {
        self.settings.accepted_similarity
    }

    /// Genome of the individual at `index`.
    pub fn genome(&self, index: usize) -> &[u8] {
        self.individuals[index].genome()
    }

    /// Fitness of the individual at `index`.
    pub fn fitness(&self, index: usize) -> f64 {
        self.individuals[index].fitness()
    }

    /// Records a measured fitness for the individual at `index`.
    pub fn set_fitness(&mut self, index: usize, fitness: f64) {
        self.individuals[index].set_fitness(fitness);
    }

    /// All individuals in slot order.
    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    /// Highest-fitness individual, if any.
    pub fn best(&self) -> Option<&Individual> {
        self.individuals.iter().max_by(|a, b| {
            a.fitness()
                .partial_cmp(&b.fitness())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    /// Fitness-ascending copy of the individuals; ties keep slot order.
    pub fn sorted_individuals(&self) -> Vec<Individual> {
        let mut sorted = self.individuals.clone();
        sorted.sort_by(|a, b| {
            a.fitness()
                .partial_cmp(&b.fitness())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }

    /// Draws a fresh random genome from the population's own source.
    pub fn random_genome(&mut self) -> Genome {
        random_genome(&mut self.rng, self.settings.genome_length)
    }

    /// Crossover driven by the population's own source.
    pub fn crossover(&mut self, parent_a: &[u8], parent_b: &[u8], mutate: bool) -> CrossoverOutcome {
        crossover_genomes(
            &mut self.rng,
            parent_a,
            parent_b,
            mutate,
            self.settings.accepted_similarity,
        )
    }

    /// Roulette pick driven by the population's own source.
    pub fn roulette_index(&mut self, sorted: &[Individual], fitness_sum: f64) -> usize {
        roulette_index(&mut self.rng, sorted, fitness_sum)
    }

    /// Derives a seed for a worker's private random source.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.random()
    }

    /// Installs the next generation in one swap.
    pub fn replace_individuals(&mut self, next: Vec<Individual>) {
        debug_assert_eq!(next.len(), self.individuals.len());
        self.individuals = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::types::UNEVALUATED_FITNESS;
    use rand::SeedableRng;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    // ---- settings ----

    #[test]
    fn test_settings_validation() {
        assert!(PopulationSettings::new(64).validate().is_ok());
        assert!(PopulationSettings::new(0).validate().is_err());
        assert!(PopulationSettings::new(64)
            .with_population_size(1)
            .validate()
            .is_err());
        assert!(PopulationSettings::new(64)
            .with_accepted_similarity(1.5)
            .validate()
            .is_err());
    }

    #[test]
    fn test_micro_preset_sizing() {
        let settings = PopulationSettings::micro(16);
        assert_eq!(settings.population_size, 5);
        assert_eq!(settings.elite_size, 1);
    }

    // ---- initialization ----

    #[test]
    fn test_new_population_is_random_and_unevaluated() {
        let core = PopulationCore::new(PopulationSettings::new(32).with_population_size(8), rng(1));
        assert_eq!(core.size(), 8);
        for index in 0..core.size() {
            assert_eq!(core.genome(index).len(), 32);
            assert_eq!(core.fitness(index), UNEVALUATED_FITNESS);
        }
        let first = core.genome(0).to_vec();
        assert!(
            (1..core.size()).any(|i| core.genome(i) != first.as_slice()),
            "independent random genomes must differ"
        );
    }

    #[test]
    fn test_oversized_elite_is_survivable() {
        let settings = PopulationSettings::new(8)
            .with_population_size(4)
            .with_elite_size(10);
        let core = PopulationCore::new(settings, rng(2));
        assert_eq!(core.size(), 4);
        assert_eq!(core.elite_size(), 4, "elite count clamps to the population");
    }

    // ---- crossover ----

    #[test]
    fn test_crossover_without_mutation_copies_parent_genes() {
        let mut r = rng(3);
        let a: Vec<u8> = (0..64).map(|_| r.random()).collect();
        let b: Vec<u8> = (0..64).map(|_| r.random()).collect();
        let outcome = crossover_genomes(&mut r, &a, &b, false, 0.97);
        for (gene, value) in outcome.genome.iter().enumerate() {
            assert!(
                *value == a[gene] || *value == b[gene],
                "gene {} came from neither parent",
                gene
            );
        }
    }

    #[test]
    fn test_mutation_rate_tracks_its_probability() {
        // Identical all-zero parents make every mutated gene visible except
        // the 1-in-256 redraws of zero.
        let mut r = rng(42);
        let parent = vec![0u8; 40_000];
        let outcome = crossover_genomes(&mut r, &parent, &parent, true, 0.97);
        let mutated = outcome.genome.iter().filter(|&&v| v != 0).count() as f64;
        let expected = 40_000.0 * MUTATION_PROBABILITY;
        assert!(
            mutated > expected * 0.5 && mutated < expected * 1.5,
            "saw {mutated} mutated genes, expected about {expected}"
        );
    }

    #[test]
    fn test_identical_parents_report_not_diverged() {
        let mut r = rng(4);
        let parent = vec![7u8; 100];
        let outcome = crossover_genomes(&mut r, &parent, &parent, false, 0.97);
        assert!(!outcome.diverged, "full agreement is above any threshold");
    }

    #[test]
    fn test_disjoint_parents_report_diverged() {
        let mut r = rng(5);
        let a = vec![0u8; 100];
        let b = vec![255u8; 100];
        let outcome = crossover_genomes(&mut r, &a, &b, false, 0.97);
        assert!(outcome.diverged, "zero agreement is below any threshold");
    }

    #[test]
    fn test_diverged_threshold_is_strict() {
        // 97 of 100 positions agree: fraction 0.97 is not below 0.97.
        let mut r = rng(6);
        let a = vec![1u8; 100];
        let mut b = vec![1u8; 100];
        b[0] = 2;
        b[1] = 2;
        b[2] = 2;
        let outcome = crossover_genomes(&mut r, &a, &b, false, 0.97);
        assert!(!outcome.diverged, "expected not diverged at exactly 0.97");
        let outcome = crossover_genomes(&mut r, &a, &b, false, 0.98);
        assert!(outcome.diverged, "0.97 agreement is below a 0.98 threshold");
    }

    // ---- roulette selection ----

    fn with_fitness(values: &[f64]) -> Vec<Individual> {
        values
            .iter()
            .map(|&f| {
                let mut ind = Individual::new(vec![0]);
                ind.set_fitness(f);
                ind
            })
            .collect()
    }

    #[test]
    fn test_roulette_skips_zero_fitness_slots() {
        let sorted = with_fitness(&[0.0, 0.0, 10.0]);
        let mut r = rng(7);
        for _ in 0..50 {
            assert_eq!(
                roulette_index(&mut r, &sorted, 10.0),
                2,
                "all probability mass sits on the last slot"
            );
        }
    }

    #[test]
    fn test_roulette_falls_back_to_uniform_without_fitness() {
        let sorted = with_fitness(&[UNEVALUATED_FITNESS; 4]);
        let sum: f64 = sorted.iter().map(|i| i.fitness()).sum();
        let mut r = rng(8);
        for _ in 0..50 {
            let index = roulette_index(&mut r, &sorted, sum);
            assert!(index < 4);
        }
    }

    #[test]
    fn test_roulette_favors_high_fitness() {
        let sorted = with_fitness(&[1.0, 2.0, 3.0, 94.0]);
        let mut r = rng(9);
        let hits = (0..1000)
            .filter(|_| roulette_index(&mut r, &sorted, 100.0) == 3)
            .count();
        assert!(hits > 800, "expected the 94% slot to dominate, got {}", hits);
    }

    // ---- ordering ----

    #[test]
    fn test_sorted_individuals_ascending_and_stable() {
        let mut core =
            PopulationCore::new(PopulationSettings::new(1).with_population_size(4), rng(10));
        core.set_fitness(0, 5.0);
        core.set_fitness(1, 3.0);
        core.set_fitness(2, 5.0);
        core.set_fitness(3, 1.0);
        let marker: Vec<Vec<u8>> = (0..4).map(|i| vec![i as u8]).collect();
        // tag genomes so ties are distinguishable
        let tagged: Vec<Individual> = core
            .individuals()
            .iter()
            .zip(marker.iter())
            .map(|(ind, tag)| {
                let mut t = ind.clone();
                t.set_genome(tag.clone());
                t
            })
            .collect();
        core.replace_individuals(tagged);

        let sorted = core.sorted_individuals();
        let fitnesses: Vec<f64> = sorted.iter().map(|i| i.fitness()).collect();
        assert_eq!(fitnesses, vec![1.0, 3.0, 5.0, 5.0]);
        assert_eq!(
            sorted[2].genome(),
            &[0],
            "tied individuals keep their original relative order"
        );
        assert_eq!(sorted[3].genome(), &[2]);
    }

    #[test]
    fn test_unevaluated_individuals_sort_first() {
        let mut core =
            PopulationCore::new(PopulationSettings::new(1).with_population_size(3), rng(11));
        core.set_fitness(0, 2.0);
        core.set_fitness(2, 1.0);
        let sorted = core.sorted_individuals();
        assert_eq!(sorted[0].fitness(), UNEVALUATED_FITNESS);
        assert_eq!(sorted[2].fitness(), 2.0);
    }

    #[test]
    fn test_best_individual() {
        let mut core =
            PopulationCore::new(PopulationSettings::new(1).with_population_size(3), rng(12));
        core.set_fitness(0, 0.5);
        core.set_fitness(1, 9.0);
        core.set_fitness(2, 4.0);
        let best = core.best().unwrap();
        assert_eq!(best.fitness(), 9.0);
    }
}
