//! Seeded random generator handle for random leaf tensors.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::config::EngineConfig;

/// Shared handle to one generator. Clones draw from the same stream.
#[derive(Clone)]
pub struct RandomSource(Rc<RefCell<StdRng>>);

impl RandomSource {
    pub fn seeded(seed: u64) -> Self {
        RandomSource(Rc::new(RefCell::new(StdRng::seed_from_u64(seed))))
    }

    pub fn from_entropy() -> Self {
        RandomSource(Rc::new(RefCell::new(StdRng::from_entropy())))
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        match config.seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    /// Uniform integer in `[lo, hi]`. Bounds may be given in either order.
    pub fn uniform_int(&self, lo: i64, hi: i64) -> i64 {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        self.0.borrow_mut().gen_range(lo..=hi)
    }

    pub fn standard_normal(&self) -> f32 {
        self.0.borrow_mut().sample(StandardNormal)
    }
}

impl fmt::Debug for RandomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RandomSource")
    }
}
