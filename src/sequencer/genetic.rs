//! Genetic algorithm over stop permutations.
//!
//! # Operators
//!
//! - **Selection**: tournament over fitness `1 / (1 + distance)`
//! - **Elitism**: the best fraction of each generation survives unchanged
//! - **Crossover**: order crossover (copy a random segment of one parent,
//!   fill the rest in the other parent's relative order)
//! - **Mutation**: a single swap with configurable probability
//!
//! Only positions between the fixed ends are permuted.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, DispatchResult};

use super::matrix::DistanceMatrix;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    pub population_size: usize,
    pub generations: usize,
    /// Probability of one swap per offspring.
    pub mutation_rate: f64,
    /// Share of each generation copied unchanged into the next.
    pub elite_fraction: f64,
    pub tournament_size: usize,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 100,
            mutation_rate: 0.1,
            elite_fraction: 0.2,
            tournament_size: 3,
        }
    }
}

impl GeneticConfig {
    pub fn validate(&self) -> DispatchResult<()> {
        if self.population_size < 2 {
            return Err(DispatchError::InvalidConfig(format!(
                "population_size must be at least 2, got {}",
                self.population_size
            )));
        }
        if self.tournament_size == 0 {
            return Err(DispatchError::InvalidConfig(
                "tournament_size must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(DispatchError::InvalidConfig(format!(
                "mutation_rate must be within [0, 1], got {}",
                self.mutation_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.elite_fraction) {
            return Err(DispatchError::InvalidConfig(format!(
                "elite_fraction must be within [0, 1], got {}",
                self.elite_fraction
            )));
        }
        Ok(())
    }

    fn elite_count(&self) -> usize {
        let elite = (self.population_size as f64 * self.elite_fraction).ceil() as usize;
        elite.clamp(1, self.population_size)
    }
}

pub fn fitness(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

#[derive(Debug, Clone)]
struct Individual {
    genes: Vec<usize>,
    distance: f64,
}

/// Fixed head/tail around the permutable genes.
struct Layout<'a> {
    prefix: &'a [usize],
    suffix: &'a [usize],
    distances: &'a DistanceMatrix,
}

impl Layout<'_> {
    fn assemble(&self, genes: &[usize]) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.prefix.len() + genes.len() + self.suffix.len());
        order.extend_from_slice(self.prefix);
        order.extend_from_slice(genes);
        order.extend_from_slice(self.suffix);
        order
    }

    fn individual(&self, genes: Vec<usize>) -> Individual {
        let distance = self.distances.path_distance(&self.assemble(&genes));
        Individual { genes, distance }
    }
}

/// Runs the search and returns the best order seen plus the generation count.
///
/// `seeds` are full orders sharing the fixed ends of `initial`; they join the
/// first generation alongside `initial` itself. The remaining slots are
/// random shuffles.
pub fn genetic_search<R: Rng>(
    initial: &[usize],
    seeds: &[Vec<usize>],
    distances: &DistanceMatrix,
    fixed_start: bool,
    fixed_end: bool,
    config: &GeneticConfig,
    rng: &mut R,
) -> (Vec<usize>, usize) {
    let n = initial.len();
    let head = usize::from(fixed_start && n > 0);
    let tail = usize::from(fixed_end && n > head);
    if n - head - tail < 2 || config.generations == 0 {
        return (initial.to_vec(), 0);
    }

    let layout = Layout {
        prefix: &initial[..head],
        suffix: &initial[n - tail..],
        distances,
    };
    let middle = &initial[head..n - tail];

    let mut population: Vec<Individual> = Vec::with_capacity(config.population_size);
    population.push(layout.individual(middle.to_vec()));
    for seed in seeds.iter().filter(|seed| seed.len() == n) {
        if population.len() < config.population_size {
            population.push(layout.individual(seed[head..n - tail].to_vec()));
        }
    }
    while population.len() < config.population_size {
        let mut genes = middle.to_vec();
        genes.shuffle(rng);
        population.push(layout.individual(genes));
    }
    sort_by_distance(&mut population);

    let mut best = population[0].clone();
    let elite = config.elite_count();

    for _ in 0..config.generations {
        let mut next: Vec<Individual> = population[..elite].to_vec();
        while next.len() < config.population_size {
            let first = tournament(&population, config.tournament_size, rng);
            let second = tournament(&population, config.tournament_size, rng);
            let mut child = order_crossover(&first.genes, &second.genes, rng);
            if rng.random_bool(config.mutation_rate) {
                swap_mutation(&mut child, rng);
            }
            next.push(layout.individual(child));
        }

        sort_by_distance(&mut next);
        population = next;
        if population[0].distance < best.distance {
            best = population[0].clone();
        }
    }

    (layout.assemble(&best.genes), config.generations)
}

fn sort_by_distance(population: &mut [Individual]) {
    population.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}

fn tournament<'p, R: Rng>(
    population: &'p [Individual],
    size: usize,
    rng: &mut R,
) -> &'p Individual {
    let mut winner = &population[rng.random_range(0..population.len())];
    for _ in 1..size {
        let contender = &population[rng.random_range(0..population.len())];
        if fitness(contender.distance) > fitness(winner.distance) {
            winner = contender;
        }
    }
    winner
}

/// Copies `first[lo..=hi]` and fills the other slots, left to right, with the
/// remaining genes in the order they appear in `second`.
fn order_crossover<R: Rng>(first: &[usize], second: &[usize], rng: &mut R) -> Vec<usize> {
    let len = first.len();
    let a = rng.random_range(0..len);
    let b = rng.random_range(0..len);
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

    let kept: HashSet<usize> = first[lo..=hi].iter().copied().collect();
    let mut fill = second.iter().copied().filter(|gene| !kept.contains(gene));

    let mut child = Vec::with_capacity(len);
    for position in 0..len {
        if (lo..=hi).contains(&position) {
            child.push(first[position]);
        } else if let Some(gene) = fill.next() {
            child.push(gene);
        }
    }
    child
}

fn swap_mutation<R: Rng>(genes: &mut [usize], rng: &mut R) {
    let i = rng.random_range(0..genes.len());
    let j = rng.random_range(0..genes.len());
    genes.swap(i, j);
}
