//! Input distributions for generated test cases.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::HarnessError;

/// Upper bound (exclusive) for `randint` draws.
pub const RANDINT_HIGH: i64 = 10;

/// How input values are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    /// Uniform in [0, 1)
    Rand,
    /// Standard normal
    Randn,
    /// Integers uniform in [0, 10)
    Randint,
}

impl Distribution {
    pub const ALL: [Distribution; 3] = [Distribution::Rand, Distribution::Randn, Distribution::Randint];

    pub fn as_str(&self) -> &'static str {
        match self {
            Distribution::Rand => "rand",
            Distribution::Randn => "randn",
            Distribution::Randint => "randint",
        }
    }

    /// Draw `n` values.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<f64> {
        match self {
            Distribution::Rand => (0..n).map(|_| rng.gen_range(0.0..1.0)).collect(),
            // Box-Muller
            Distribution::Randn => (0..n)
                .map(|_| {
                    let u1: f64 = rng.gen_range(1e-12..1.0);
                    let u2: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
                    (-2.0 * u1.ln()).sqrt() * u2.cos()
                })
                .collect(),
            Distribution::Randint => (0..n)
                .map(|_| rng.gen_range(0..RANDINT_HIGH) as f64)
                .collect(),
        }
    }
}

impl FromStr for Distribution {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rand" | "uniform" => Ok(Distribution::Rand),
            "randn" | "normal" => Ok(Distribution::Randn),
            "randint" => Ok(Distribution::Randint),
            _ => Err(HarnessError::InvalidArgument(format!(
                "unknown distribution '{s}', expected one of: rand, randn, randint"
            ))),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
