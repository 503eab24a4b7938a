//! Test-suite generation from a reference kernel.

use kbot_core::{timing, DType, HostTensor, LaunchGeometry, Shape};
use kbot_kernels::{Accelerator, DeviceError};

use crate::suite::{TestCase, TestSuite};
use crate::{Distribution, HarnessConfig, HarnessError, Result};

/// Cases preallocated up front; larger suites grow as they are generated.
const PREALLOC_CASES: usize = 64;

/// What to generate.
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteRequest {
    pub name: String,
    pub input_shapes: Vec<Shape>,
    pub output_shape: Shape,
    pub dtype: DType,
    pub distribution: Distribution,
    pub count: usize,
}

impl SuiteRequest {
    /// Checks that need no device, including the suite size against
    /// `config.max_suite_bytes`.
    pub fn validate(&self, config: &HarnessConfig) -> Result<()> {
        if self.count == 0 {
            return Err(HarnessError::InvalidArgument("test count must be at least 1".into()));
        }
        if self.input_shapes.is_empty() {
            return Err(HarnessError::InvalidArgument("at least one input shape is required".into()));
        }
        let total = self.suite_bytes()?;
        if total > config.max_suite_bytes {
            return Err(HarnessError::InvalidArgument(format!(
                "suite needs {} bytes, limit is {}",
                total, config.max_suite_bytes
            )));
        }
        Ok(())
    }

    /// Tensor bytes of one case: every input plus the output.
    pub fn case_bytes(&self) -> Result<usize> {
        self.input_shapes
            .iter()
            .chain(std::iter::once(&self.output_shape))
            .try_fold(0usize, |acc, shape| {
                let bytes = self.dtype.checked_storage_bytes(shape)?;
                acc.checked_add(bytes)
                    .ok_or_else(|| HarnessError::InvalidArgument("case size overflows".into()))
            })
    }

    /// Tensor bytes of the whole suite.
    pub fn suite_bytes(&self) -> Result<usize> {
        self.case_bytes()?
            .checked_mul(self.count)
            .ok_or_else(|| HarnessError::InvalidArgument("suite size overflows".into()))
    }
}

/// A freshly generated suite with its serialized form.
#[derive(Debug, Clone)]
pub struct GeneratedSuite {
    pub suite: TestSuite,
    pub blob: Vec<u8>,
    /// Operations per invocation.
    pub ops: u64,
    /// Mean reference timing in seconds.
    pub baseline: f64,
}

/// Run the reference `program` on `count` random input sets and record its
/// outputs as the expected results.
pub fn generate<A: Accelerator>(
    device: &mut A,
    program: &A::Program,
    geometry: &LaunchGeometry,
    request: &SuiteRequest,
    config: &HarnessConfig,
) -> Result<GeneratedSuite> {
    request.validate(config)?;
    geometry.validate()?;

    let mut rng = config.rng();
    let mut cases = Vec::with_capacity(request.count.min(PREALLOC_CASES));
    let mut timings = Vec::with_capacity(request.count.min(PREALLOC_CASES));
    let mut ops: Option<u64> = None;

    let input_bytes = request
        .input_shapes
        .iter()
        .map(|shape| request.dtype.checked_storage_bytes(shape))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let out_bytes = request.dtype.checked_storage_bytes(&request.output_shape)?;

    for i in 0..request.count {
        // Device memory first, so an oversized case fails before host sampling.
        let mut buffers = input_bytes
            .iter()
            .map(|&nbytes| device.alloc(nbytes))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| HarnessError::in_case(e, i))?;
        let out = device.alloc(out_bytes).map_err(|e| HarnessError::in_case(e, i))?;

        let inputs = request
            .input_shapes
            .iter()
            .map(|shape| {
                let values = request.distribution.sample(&mut rng, shape.checked_numel()?);
                HostTensor::from_f64(request.dtype, shape.clone(), &values)
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let (expected, report) = {
            for (buffer, tensor) in buffers.iter_mut().zip(&inputs) {
                device
                    .upload(buffer, tensor.as_bytes())
                    .map_err(|e| HarnessError::in_case(e, i))?;
            }

            let mut args = Vec::with_capacity(buffers.len() + 1);
            args.push(&out);
            args.extend(buffers.iter());
            let report = device
                .launch(program, geometry, &args)
                .map_err(|e| HarnessError::in_case(e, i))?;
            let bytes = device.download(&out).map_err(|e| HarnessError::in_case(e, i))?;
            let expected = HostTensor::from_bytes(request.dtype, request.output_shape.clone(), bytes)
                .map_err(|e| HarnessError::Device(DeviceError::Transfer(e.to_string())))?;
            (expected, report)
        };

        let count = report.ops.unwrap_or_else(|| geometry.work_items());
        if let Some(previous) = ops {
            if previous != count {
                tracing::warn!(
                    "op count changed between iterations ({} then {}), keeping the latest",
                    previous,
                    count
                );
            }
        }
        ops = Some(count);

        let seconds = report.elapsed.as_secs_f64();
        tracing::debug!("generate {}: case {} took {:.3e}s", request.name, i, seconds);
        timings.push(seconds);
        cases.push(TestCase { inputs, expected });
    }

    let ops = ops.unwrap_or_default();
    let baseline = timing::mean(&timings).unwrap_or_default();
    let suite = TestSuite::new(request.name.clone(), ops, cases)?;
    let blob = suite.to_bytes()?;

    tracing::info!(
        "generated suite '{}': {} cases, {} ops, baseline {}",
        request.name,
        suite.len(),
        ops,
        kbot_core::fmt_time(baseline)
    );
    Ok(GeneratedSuite { suite, blob, ops, baseline })
}
