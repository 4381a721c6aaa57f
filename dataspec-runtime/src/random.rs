//! Random number generators and distributions
//!
//! Generators are seeded, so a specification draws the same numbers on
//! every run. Distributions borrow their generator by id at draw time.

use crate::error::{Result, RuntimeError};
use dataspec_spec::{DistributionKind, RngKind};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone)]
struct UniformDistribution {
    rng: u32,
    sampler: Uniform<i64>,
}

#[derive(Debug, Clone)]
pub struct RandomSources {
    rngs: Vec<Option<StdRng>>,
    distributions: Vec<Option<UniformDistribution>>,
}

fn bound(what: &'static str, id: u32, len: usize) -> RuntimeError {
    RuntimeError::ParameterOutOfBounds {
        what,
        value: id as i64,
        max: len as u32,
    }
}

impl RandomSources {
    pub fn new(max_rngs: u32, max_distributions: u32) -> Self {
        Self {
            rngs: vec![None; max_rngs as usize],
            distributions: vec![None; max_distributions as usize],
        }
    }

    /// Declare (or re-seed) generator `id`
    pub fn declare_rng(&mut self, id: u32, kind: RngKind, seed: u64) -> Result<()> {
        let len = self.rngs.len();
        let slot = self.rngs.get_mut(id as usize).ok_or(bound("rng", id, len))?;
        match kind {
            RngKind::Seeded => *slot = Some(StdRng::seed_from_u64(seed)),
        }
        Ok(())
    }

    /// Declare distribution `id` over the inclusive range `[min, max]`
    pub fn declare_distribution(
        &mut self,
        id: u32,
        rng: u32,
        kind: DistributionKind,
        min: i64,
        max: i64,
    ) -> Result<()> {
        if id as usize >= self.distributions.len() {
            return Err(bound("distribution", id, self.distributions.len()));
        }
        if !matches!(self.rngs.get(rng as usize), Some(Some(_))) {
            return Err(RuntimeError::UndeclaredRng(rng));
        }
        if min > max {
            return Err(RuntimeError::InvalidDistributionBounds { min, max });
        }
        let sampler = match kind {
            DistributionKind::Uniform => Uniform::new_inclusive(min, max),
        };
        self.distributions[id as usize] = Some(UniformDistribution { rng, sampler });
        Ok(())
    }

    /// Draw one value from distribution `id`
    pub fn draw(&mut self, id: u32) -> Result<i64> {
        let dist = self
            .distributions
            .get(id as usize)
            .and_then(Option::as_ref)
            .ok_or(RuntimeError::UndeclaredDistribution(id))?;
        let rng = self
            .rngs
            .get_mut(dist.rng as usize)
            .and_then(Option::as_mut)
            .ok_or(RuntimeError::UndeclaredRng(dist.rng))?;
        Ok(dist.sampler.sample(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draws(seed: u64, n: usize) -> Vec<i64> {
        let mut sources = RandomSources::new(2, 2);
        sources.declare_rng(0, RngKind::Seeded, seed).unwrap();
        sources
            .declare_distribution(1, 0, DistributionKind::Uniform, -10, 10)
            .unwrap();
        (0..n).map(|_| sources.draw(1).unwrap()).collect()
    }

    #[test]
    fn test_seeded_draws_repeat() {
        let a = draws(42, 32);
        assert_eq!(a, draws(42, 32));
        assert!(a.iter().all(|v| (-10..=10).contains(v)));
    }

    #[test]
    fn test_single_point_range() {
        let mut sources = RandomSources::new(1, 1);
        sources.declare_rng(0, RngKind::Seeded, 1).unwrap();
        sources
            .declare_distribution(0, 0, DistributionKind::Uniform, 5, 5)
            .unwrap();
        assert_eq!(sources.draw(0).unwrap(), 5);
    }

    #[test]
    fn test_declaration_errors() {
        let mut sources = RandomSources::new(1, 1);
        assert!(matches!(
            sources.declare_distribution(0, 0, DistributionKind::Uniform, 0, 1),
            Err(RuntimeError::UndeclaredRng(0))
        ));
        sources.declare_rng(0, RngKind::Seeded, 1).unwrap();
        assert!(matches!(
            sources.declare_distribution(0, 0, DistributionKind::Uniform, 3, 2),
            Err(RuntimeError::InvalidDistributionBounds { min: 3, max: 2 })
        ));
        assert!(matches!(
            sources.declare_rng(1, RngKind::Seeded, 1),
            Err(RuntimeError::ParameterOutOfBounds { what: "rng", .. })
        ));
        assert!(matches!(sources.draw(0), Err(RuntimeError::UndeclaredDistribution(0))));
    }
}
