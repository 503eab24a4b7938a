//! Verification and timing of a submitted kernel against a stored suite.

use std::time::Duration;

use kbot_core::{fmt_time, timing, HostTensor, LaunchGeometry};
use kbot_kernels::Accelerator;

use crate::suite::{TestCase, TestSuite};
use crate::{HarnessConfig, HarnessError, Result};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Mean of per-case timings, in seconds.
    pub mean: f64,
    /// Per-case timing (fastest of the configured repeats), in seconds.
    pub timings: Vec<f64>,
    pub passed: Vec<bool>,
}

impl Evaluation {
    pub fn display(&self) -> String {
        fmt_time(self.mean)
    }

    pub fn cases(&self) -> usize {
        self.timings.len()
    }
}

/// Decode `blob` and run every case in stored order.
pub fn run<A: Accelerator>(
    device: &mut A,
    program: &A::Program,
    geometry: &LaunchGeometry,
    blob: &[u8],
    config: &HarnessConfig,
) -> Result<Evaluation> {
    let suite = TestSuite::from_bytes(blob)?;
    run_suite(device, program, geometry, &suite, config)
}

/// Run every case of an already decoded suite. The first failing case fails
/// the whole run.
pub fn run_suite<A: Accelerator>(
    device: &mut A,
    program: &A::Program,
    geometry: &LaunchGeometry,
    suite: &TestSuite,
    config: &HarnessConfig,
) -> Result<Evaluation> {
    if suite.is_empty() {
        return Err(HarnessError::malformed("suite has no test cases"));
    }
    geometry.validate()?;
    let tolerance = config.tolerance();
    let repeats = config.timing_repeats.max(1);

    let mut timings = Vec::with_capacity(suite.len());
    for (i, case) in suite.cases().iter().enumerate() {
        let (actual, elapsed) = run_case(device, program, geometry, case, repeats)
            .map_err(|e| HarnessError::in_case(e, i))?;

        if let Some(m) = tolerance.first_mismatch(&actual.to_f64_vec(), &case.expected.to_f64_vec()) {
            tracing::debug!("case {} failed at element {}", i, m.index);
            return Err(HarnessError::Correctness {
                case: i,
                index: m.index,
                actual: m.actual,
                expected: m.expected,
            });
        }

        let seconds = elapsed.as_secs_f64();
        tracing::debug!("case {} passed in {}", i, fmt_time(seconds));
        timings.push(seconds);
    }

    let mean = timing::mean(&timings).unwrap_or_default();
    tracing::info!(
        "evaluated {} cases of '{}': mean {}",
        timings.len(),
        suite.name(),
        fmt_time(mean)
    );
    Ok(Evaluation { mean, passed: vec![true; timings.len()], timings })
}

/// Fresh buffers, `repeats` launches, one download. Buffers drop on return.
fn run_case<A: Accelerator>(
    device: &mut A,
    program: &A::Program,
    geometry: &LaunchGeometry,
    case: &TestCase,
    repeats: usize,
) -> std::result::Result<(HostTensor, Duration), kbot_kernels::DeviceError> {
    let inputs = case
        .inputs
        .iter()
        .map(|t| device.alloc_from_host(t.as_bytes()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let out = device.alloc(case.expected.nbytes())?;

    let mut args = Vec::with_capacity(inputs.len() + 1);
    args.push(&out);
    args.extend(inputs.iter());

    let mut best = Duration::MAX;
    for _ in 0..repeats {
        let report = device.launch(program, geometry, &args)?;
        best = best.min(report.elapsed);
    }

    let bytes = device.download(&out)?;
    let expected = &case.expected;
    let actual = HostTensor::from_bytes(expected.dtype(), expected.shape().clone(), bytes)
        .map_err(|e| kbot_kernels::DeviceError::Transfer(e.to_string()))?;
    Ok((actual, best))
}
