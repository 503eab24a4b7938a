//! Harness configuration.

use std::path::Path;

use kbot_core::Tolerance;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::{HarnessError, Result};

/// Tunables for generation and verification.
///
/// Loaded from JSON; every field is optional and falls back to the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Relative tolerance for output comparison.
    pub rtol: f64,
    /// Absolute tolerance for output comparison.
    pub atol: f64,
    /// Accept NaN where the expected output is also NaN.
    pub equal_nan: bool,
    /// Launches per test case; the fastest is kept.
    pub timing_repeats: usize,
    /// Seed for input generation. Unseeded generation uses OS entropy.
    pub seed: Option<u64>,
    /// GPU index for the CUDA backend.
    pub device_index: usize,
    /// Memory capacity of the emulated device, in bytes.
    pub emulator_capacity: usize,
    /// Upper bound on the tensor bytes of one generated suite (all inputs
    /// and outputs of all cases).
    pub max_suite_bytes: usize,
}

/// Default suite size limit (256 MiB).
pub const DEFAULT_MAX_SUITE_BYTES: usize = 1 << 28;

impl Default for HarnessConfig {
    fn default() -> Self {
        let tolerance = Tolerance::default();
        Self {
            rtol: tolerance.rtol,
            atol: tolerance.atol,
            equal_nan: tolerance.equal_nan,
            timing_repeats: 1,
            seed: None,
            device_index: 0,
            emulator_capacity: kbot_kernels::emulator::DEFAULT_CAPACITY,
            max_suite_bytes: DEFAULT_MAX_SUITE_BYTES,
        }
    }
}

impl HarnessConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| HarnessError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| HarnessError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("rtol", self.rtol), ("atol", self.atol)] {
            if !value.is_finite() || value < 0.0 {
                return Err(HarnessError::Config(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if self.timing_repeats == 0 {
            return Err(HarnessError::Config("timing_repeats must be at least 1".into()));
        }
        if self.max_suite_bytes == 0 {
            return Err(HarnessError::Config("max_suite_bytes must be at least 1".into()));
        }
        Ok(())
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.rtol, self.atol).with_equal_nan(self.equal_nan)
    }

    /// RNG for input generation: seeded when `seed` is set.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.rtol, 1e-3);
        assert_eq!(config.atol, 1e-3);
        assert_eq!(config.timing_repeats, 1);
        assert!(!config.equal_nan);
        assert!(!config.tolerance().equal_nan);
        assert_eq!(config.max_suite_bytes, DEFAULT_MAX_SUITE_BYTES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = HarnessConfig::from_json(r#"{ "atol": 0.01, "seed": 7 }"#).unwrap();
        assert_eq!(config.atol, 0.01);
        assert_eq!(config.rtol, 1e-3);
        assert_eq!(config.seed, Some(7));

        let config = HarnessConfig::from_json(r#"{ "equal_nan": true }"#).unwrap();
        assert!(config.tolerance().equal_nan);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            HarnessConfig::from_json(r#"{ "rtol": -1.0 }"#),
            Err(HarnessError::Config(_))
        ));
        assert!(HarnessConfig::from_json(r#"{ "timing_repeats": 0 }"#).is_err());
        assert!(HarnessConfig::from_json(r#"{ "max_suite_bytes": 0 }"#).is_err());
        assert!(HarnessConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        use rand::Rng;
        let config = HarnessConfig { seed: Some(42), ..Default::default() };
        let a: u64 = config.rng().gen();
        let b: u64 = config.rng().gen();
        assert_eq!(a, b);
    }
}
