//! Engine configuration.

use crate::error::{Result, TensorError};

/// Environment variable holding the random seed.
pub const SEED_ENV: &str = "AD_LAZY_SEED";

/// Settings shared by tensor constructors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Seed for [`RandomSource`](crate::random::RandomSource). `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let seed = match lookup(SEED_ENV) {
            Some(raw) => Some(raw.trim().parse().map_err(|_| TensorError::Config {
                key: SEED_ENV,
                value: raw.clone(),
            })?),
            None => None,
        };
        Ok(EngineConfig { seed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_seed() {
        assert_eq!(EngineConfig::new().seed, None);
        assert_eq!(EngineConfig::new().with_seed(7).seed, Some(7));
    }

    #[test]
    fn test_lookup_parses_seed() {
        let cfg = EngineConfig::from_lookup(|k| (k == SEED_ENV).then(|| " 42 ".to_string()))
            .unwrap();
        assert_eq!(cfg.seed, Some(42));

        let unset = EngineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(unset.seed, None);
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        let err = EngineConfig::from_lookup(|_| Some("abc".to_string())).unwrap_err();
        assert_eq!(
            err,
            TensorError::Config {
                key: SEED_ENV,
                value: "abc".to_string()
            }
        );
    }
}
