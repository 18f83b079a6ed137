//! Micro GA: a tiny elitist population with restart and peak retention.
//!
//! Five individuals breed through fixed top-three pairings without mutation;
//! diversity comes from convergence restarts instead. Because hardware
//! measurements drift, the strategy separately retains the best genome it
//! has trusted so far and reloads it when the population regresses too far
//! below that peak.

use log::{debug, warn};
use rand::rngs::StdRng;

use super::core::{PopulationCore, PopulationSettings};
use super::types::{Genome, Individual};

/// Consecutive fully-converged turnovers before the non-elite slots restart.
const RESTART_AFTER_CONVERGED: u32 = 3;

/// Consecutive turnovers an unbeaten champion needs before its genome is
/// retained as the peak.
const PEAK_TRUST_STREAK: u32 = 2;

/// Fraction of the retained peak fitness below which a generation counts as
/// regressed.
const PEAK_REGRESSION_FRACTION: f64 = 0.75;

/// Tiny-population GA.
///
/// Turnover breeds the non-elite slots from the top three ranked
/// individuals: best with second, best with third, second with third,
/// cycling for any further slots. Crossover runs without mutation.
#[derive(Debug)]
pub struct MicroGaPopulation {
    core: PopulationCore,
    converged_streak: u32,
    champion: Option<Genome>,
    champion_streak: u32,
    retained_peak: Option<(Genome, f64)>,
    regression_streak: u32,
}

impl MicroGaPopulation {
    /// Builds a randomly initialized micro population.
    ///
    /// [`PopulationSettings::micro`] gives the reference sizing of five
    /// individuals with one elite; any size of at least three works.
    pub fn new(settings: PopulationSettings, rng: StdRng) -> Self {
        Self {
            core: PopulationCore::new(settings, rng),
            converged_streak: 0,
            champion: None,
            champion_streak: 0,
            retained_peak: None,
            regression_streak: 0,
        }
    }

    /// Shared population state.
    pub fn core(&self) -> &PopulationCore {
        &self.core
    }

    /// Mutable shared population state.
    pub fn core_mut(&mut self) -> &mut PopulationCore {
        &mut self.core
    }

    /// Best genome trusted so far, with its fitness at snapshot time.
    pub fn retained_peak(&self) -> Option<(&[u8], f64)> {
        self.retained_peak
            .as_ref()
            .map(|(genome, fitness)| (genome.as_slice(), *fitness))
    }

    /// Replaces the current generation with the next one.
    pub fn next_generation(&mut self) {
        let size = self.core.size();
        if size < 3 {
            warn!("micro turnover needs at least 3 individuals, have {}", size);
            return;
        }
        let elite = self.core.elite_size();
        let slots = size - elite;
        let sorted = self.core.sorted_individuals();

        // fixed pairings over the top three ranks
        let pairings = [
            (size - 1, size - 2),
            (size - 1, size - 3),
            (size - 2, size - 3),
        ];
        let mut children: Vec<Individual> = Vec::with_capacity(slots);
        let mut all_converged = slots > 0;
        for slot in 0..slots {
            let (a, b) = pairings[slot % pairings.len()];
            let outcome = self
                .core
                .crossover(sorted[a].genome(), sorted[b].genome(), false);
            if outcome.diverged {
                all_converged = false;
            }
            children.push(Individual::new(outcome.genome));
        }

        if all_converged {
            self.converged_streak += 1;
        } else {
            self.converged_streak = 0;
        }
        if self.converged_streak >= RESTART_AFTER_CONVERGED {
            debug!(
                "micro population converged for {} turnovers; restarting non-elite slots",
                self.converged_streak
            );
            for child in &mut children {
                let genome = self.core.random_genome();
                child.set_genome(genome);
            }
            self.converged_streak = 0;
        }

        let mut next = children;
        next.extend(sorted[slots..].iter().cloned());

        self.track_peak(&sorted);
        self.reload_peak_if_regressed(&sorted, &mut next);

        self.core.replace_individuals(next);
    }

    /// Updates the trust streak and snapshots the champion genome once it
    /// has stayed strictly on top for [`PEAK_TRUST_STREAK`] turnovers.
    fn track_peak(&mut self, sorted: &[Individual]) {
        let best = &sorted[sorted.len() - 1];
        let strictly_best = best.fitness() > sorted[sorted.len() - 2].fitness();
        if !strictly_best {
            self.champion = None;
            self.champion_streak = 0;
            return;
        }
        if self.champion.as_deref() == Some(best.genome()) {
            self.champion_streak += 1;
        } else {
            self.champion = Some(best.genome().to_vec());
            self.champion_streak = 1;
        }
        if self.champion_streak >= PEAK_TRUST_STREAK {
            self.retained_peak = Some((best.genome().to_vec(), best.fitness()));
        }
    }

    /// Forces the retained peak genome back into slot 0 after more than one
    /// consecutive generation below [`PEAK_REGRESSION_FRACTION`] of the peak.
    fn reload_peak_if_regressed(&mut self, sorted: &[Individual], next: &mut [Individual]) {
        let Some((peak_genome, peak_fitness)) = &self.retained_peak else {
            return;
        };
        let best_fitness = sorted[sorted.len() - 1].fitness();
        if best_fitness < PEAK_REGRESSION_FRACTION * peak_fitness {
            self.regression_streak += 1;
        } else {
            self.regression_streak = 0;
            return;
        }
        if self.regression_streak > 1 {
            if let Some(slot) = next.first_mut() {
                debug!(
                    "population regressed below {:.0}% of the retained peak; reloading it",
                    PEAK_REGRESSION_FRACTION * 100.0
                );
                slot.set_genome(peak_genome.clone());
            }
            self.regression_streak = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    fn micro_with(genomes: &[(u8, f64)], genome_length: usize) -> MicroGaPopulation {
        let settings = PopulationSettings::micro(genome_length)
            .with_population_size(genomes.len());
        let mut population = MicroGaPopulation::new(settings, rng(200));
        let individuals: Vec<Individual> = genomes
            .iter()
            .map(|&(value, fitness)| {
                let mut ind = Individual::new(vec![value; genome_length]);
                ind.set_fitness(fitness);
                ind
            })
            .collect();
        population.core_mut().replace_individuals(individuals);
        population
    }

    fn set_all_fitness(population: &mut MicroGaPopulation, fitness: f64) {
        for index in 0..population.core().size() {
            population.core_mut().set_fitness(index, fitness);
        }
    }

    // ---- pairing structure ----

    #[test]
    fn test_children_come_from_fixed_top_three_pairings() {
        // constant genomes make parentage readable from the gene values
        let mut population = micro_with(
            &[(10, 1.0), (20, 2.0), (30, 3.0), (40, 4.0), (50, 5.0)],
            32,
        );
        population.next_generation();

        // ranks: best=50, second=40, third=30
        let allowed: [&[u8]; 4] = [&[50, 40], &[50, 30], &[40, 30], &[50, 40]];
        for (slot, pair) in allowed.iter().enumerate() {
            let genome = population.core().genome(slot);
            assert!(
                genome.iter().all(|v| pair.contains(v)),
                "slot {} drew genes outside its pairing {:?}",
                slot,
                pair
            );
        }
        assert_eq!(
            population.core().genome(4),
            &[50u8; 32],
            "single elite carries the best genome"
        );
    }

    #[test]
    fn test_turnover_without_mutation_never_invents_genes() {
        let mut population = micro_with(
            &[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0), (5, 5.0)],
            64,
        );
        for _ in 0..3 {
            population.next_generation();
            for index in 0..population.core().size() {
                assert!(
                    population.core().genome(index).iter().all(|&v| (1..=5).contains(&v)),
                    "genes must come from the founding genomes"
                );
            }
            set_all_fitness(&mut population, 1.0);
        }
    }

    // ---- convergence restart ----

    #[test]
    fn test_fully_converged_population_restarts_after_three_turnovers() {
        let mut population = micro_with(&[(7, 1.0); 5], 32);
        population.next_generation();
        population.next_generation();
        for index in 0..4 {
            assert_eq!(
                population.core().genome(index),
                &[7u8; 32],
                "no restart before the streak trips"
            );
        }
        population.next_generation();
        let restarted = (0..4)
            .filter(|&i| population.core().genome(i) != &[7u8; 32])
            .count();
        assert_eq!(restarted, 4, "all non-elite slots restart together");
        assert_eq!(
            population.core().genome(4),
            &[7u8; 32],
            "the elite survives the restart"
        );
    }

    // ---- peak retention ----

    #[test]
    fn test_unbeaten_champion_is_retained_after_two_turnovers() {
        let mut population = micro_with(
            &[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0), (9, 10.0)],
            16,
        );
        population.next_generation();
        assert!(population.retained_peak().is_none(), "one turnover is not enough");

        // the elite keeps the champion on top; re-measure everyone
        for index in 0..4 {
            population.core_mut().set_fitness(index, 1.0);
        }
        population.core_mut().set_fitness(4, 10.0);
        population.next_generation();

        let (genome, fitness) = population.retained_peak().unwrap();
        assert_eq!(genome, &[9u8; 16]);
        assert_eq!(fitness, 10.0);
    }

    #[test]
    fn test_tied_best_is_not_trusted() {
        let mut population = micro_with(
            &[(1, 1.0), (2, 2.0), (3, 3.0), (9, 10.0), (8, 10.0)],
            16,
        );
        population.next_generation();
        for index in 0..3 {
            population.core_mut().set_fitness(index, 1.0);
        }
        population.core_mut().set_fitness(3, 10.0);
        population.core_mut().set_fitness(4, 10.0);
        population.next_generation();
        assert!(
            population.retained_peak().is_none(),
            "a tie at the top must not start a trust streak"
        );
    }

    /// Snapshots a peak of `([9; 16], 10.0)` and then swaps in a population
    /// whose genomes cannot produce a 9 by crossover, so any 9-genome seen
    /// afterwards must come from a peak reload.
    fn population_with_peak() -> MicroGaPopulation {
        let mut population = micro_with(
            &[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0), (9, 10.0)],
            16,
        );
        population.next_generation();
        for index in 0..4 {
            population.core_mut().set_fitness(index, 1.0);
        }
        population.core_mut().set_fitness(4, 10.0);
        population.next_generation();
        assert!(population.retained_peak().is_some());

        let decoys: Vec<Individual> = (1..=5u8)
            .map(|value| {
                let mut ind = Individual::new(vec![value; 16]);
                ind.set_fitness(3.0);
                ind
            })
            .collect();
        population.core_mut().replace_individuals(decoys);
        population
    }

    #[test]
    fn test_peak_reloads_after_two_regressed_generations() {
        let mut population = population_with_peak();

        // first regressed generation: no reload yet
        population.next_generation();
        assert_ne!(population.core().genome(0), &[9u8; 16]);

        // second regressed generation: peak forced into slot 0
        set_all_fitness(&mut population, 3.0);
        population.next_generation();
        assert_eq!(population.core().genome(0), &[9u8; 16]);
    }

    #[test]
    fn test_recovery_clears_the_regression_streak() {
        let mut population = population_with_peak();

        // regress once, recover, regress once more: never two in a row
        population.next_generation();
        set_all_fitness(&mut population, 9.5);
        population.next_generation();
        set_all_fitness(&mut population, 3.0);
        population.next_generation();
        assert_ne!(
            population.core().genome(0),
            &[9u8; 16],
            "an interrupted regression streak must not reload the peak"
        );
    }
}
