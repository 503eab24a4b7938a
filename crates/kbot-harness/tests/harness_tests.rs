//! End-to-end generation and verification on the emulated device.

use std::sync::Arc;

use kbot_core::{DType, LaunchGeometry, Shape};
use kbot_harness::queue::{create_challenge, evaluate};
use kbot_harness::{
    Distribution, HarnessConfig, HarnessError, KernelSubmission, SuiteRequest, TestSuite,
};
use kbot_kernels::emulator::builtins;
use kbot_kernels::{Accelerator, EmulatedDevice, HostKernel, KernelType};

const NEGATE_SRC: &str = r#"
extern "C" __global__ void negate(float* out, const float* x) {
    int i = blockIdx.x * blockDim.x + threadIdx.x;
    out[i] = -x[i];
}
"#;

fn negate_kernel() -> HostKernel {
    HostKernel::new(|_: &LaunchGeometry, args: &mut [Vec<u8>]| {
        let (out, rest) = args.split_first_mut().ok_or("negate: no output")?;
        let x = rest.first().ok_or("negate: no input")?;
        for (o, i) in out.chunks_exact_mut(4).zip(x.chunks_exact(4)) {
            let v = -f32::from_le_bytes([i[0], i[1], i[2], i[3]]);
            o.copy_from_slice(&v.to_le_bytes());
        }
        Ok(Some((out.len() / 4) as u64))
    })
}

fn device() -> EmulatedDevice {
    let mut dev = EmulatedDevice::with_builtins();
    dev.register("negate", negate_kernel());
    dev
}

fn negate_submission() -> KernelSubmission {
    KernelSubmission::new(
        NEGATE_SRC,
        KernelType::Cuda,
        "negate",
        LaunchGeometry::new([1, 1, 1], [16, 1, 1]).unwrap(),
    )
}

fn request(count: usize) -> SuiteRequest {
    SuiteRequest {
        name: "negate".into(),
        input_shapes: vec![Shape::new(&[4, 4])],
        output_shape: Shape::new(&[4, 4]),
        dtype: DType::F32,
        distribution: Distribution::Randn,
        count,
    }
}

#[test]
fn test_reference_identical_program_passes() {
    let mut dev = device();
    let config = HarnessConfig::default();
    let generated = create_challenge(&mut dev, &negate_submission(), &request(3), &config).unwrap();

    let suite = TestSuite::from_bytes(&generated.blob).unwrap();
    assert_eq!(suite.len(), 3);
    assert_eq!(suite.arity(), 1);
    assert_eq!(suite.ops(), 16);

    let eval = evaluate(&mut dev, &negate_submission(), &generated.blob, &config).unwrap();
    assert!(eval.mean >= 0.0);
    assert_eq!(eval.passed, vec![true; 3]);
}

#[test]
fn test_zero_writing_program_fails_case_zero() {
    let mut dev = device();
    let config = HarnessConfig::default();
    let generated = create_challenge(&mut dev, &negate_submission(), &request(2), &config).unwrap();

    let zeros = KernelSubmission::new(
        "__global__ void fill_zeros(float* out, const float* x) {}",
        KernelType::Cuda,
        "fill_zeros",
        LaunchGeometry::new([1, 1, 1], [16, 1, 1]).unwrap(),
    );
    match evaluate(&mut dev, &zeros, &generated.blob, &config) {
        Err(HarnessError::Correctness { case, .. }) => assert_eq!(case, 0),
        other => panic!("expected correctness error, got {other:?}"),
    }
}

#[test]
fn test_runs_agree_on_outcome() {
    let mut dev = device();
    let config = HarnessConfig::default();
    let generated = create_challenge(&mut dev, &negate_submission(), &request(4), &config).unwrap();
    let first = evaluate(&mut dev, &negate_submission(), &generated.blob, &config);
    let second = evaluate(&mut dev, &negate_submission(), &generated.blob, &config);
    assert_eq!(first.is_ok(), second.is_ok());
    assert_eq!(first.unwrap().passed, second.unwrap().passed);
}

#[test]
fn test_count_and_arity_follow_request() {
    let mut dev = device();
    let prog = dev
        .compile(
            "extern \"C\" __global__ void elementwise_add(float* o, const float* a, const float* b) {}",
            KernelType::Cuda,
            "elementwise_add",
        )
        .unwrap();
    let geometry = LaunchGeometry::new([2, 1, 1], [4, 1, 1]).unwrap();
    for (count, dtype) in [(1, DType::F16), (5, DType::F32), (2, DType::F64)] {
        let req = SuiteRequest {
            name: "add".into(),
            input_shapes: vec![Shape::new(&[8]), Shape::new(&[8])],
            output_shape: Shape::new(&[8]),
            dtype,
            distribution: Distribution::Randint,
            count,
        };
        let generated =
            kbot_harness::generate(&mut dev, &prog, &geometry, &req, &HarnessConfig::default()).unwrap();
        let suite = TestSuite::from_bytes(&generated.blob).unwrap();
        assert_eq!(suite.len(), count);
        assert_eq!(suite.arity(), 2);
        assert_eq!(suite.dtype(), Some(dtype));
    }
}

#[test]
fn test_zero_count_never_touches_device() {
    let mut dev = device();
    let err = create_challenge(&mut dev, &negate_submission(), &request(0), &HarnessConfig::default())
        .unwrap_err();
    assert!(matches!(err, HarnessError::InvalidArgument(_)));
    assert_eq!(dev.compile_count(), 0);
    assert_eq!(dev.launch_count(), 0);
}

#[test]
fn test_compile_error_carries_log() {
    let mut dev = device();
    let broken = KernelSubmission::new(
        "#error shared memory tile too large\n__global__ void negate(float* o, const float* x) {}",
        KernelType::Cuda,
        "negate",
        LaunchGeometry::new([1, 1, 1], [1, 1, 1]).unwrap(),
    );
    match evaluate(&mut dev, &broken, b"", &HarnessConfig::default()) {
        Err(HarnessError::Compile { log, .. }) => assert!(log.contains("shared memory tile too large")),
        other => panic!("expected compile error, got {other:?}"),
    }
}

#[test]
fn test_resource_exhausted_during_run_is_retryable() {
    let mut big = device();
    let generated =
        create_challenge(&mut big, &negate_submission(), &request(2), &HarnessConfig::default()).unwrap();

    let mut small = EmulatedDevice::with_capacity(96).with_kernel("negate", negate_kernel());
    let err = evaluate(&mut small, &negate_submission(), &generated.blob, &HarnessConfig::default())
        .unwrap_err();
    assert!(matches!(err, HarnessError::ResourceExhausted { case: 0, .. }));
    assert!(err.is_retryable());
    assert_eq!(small.memory_used(), 0);
}

#[test]
fn test_ptx_submission_on_emulator() {
    let ptx = r#"
.version 7.0
.target sm_70
.address_size 64
.visible .entry matmul(.param .u64 c, .param .u64 a, .param .u64 b)
{
  ret;
}
"#;
    let mut dev = EmulatedDevice::new().with_kernel("matmul", builtins::matmul());
    let sub = KernelSubmission::new(ptx, KernelType::Ptx, "matmul", LaunchGeometry::new([1, 1, 1], [2, 2, 1]).unwrap());
    let req = SuiteRequest {
        name: "mm".into(),
        input_shapes: vec![Shape::new(&[2, 2]), Shape::new(&[2, 2])],
        output_shape: Shape::new(&[2, 2]),
        dtype: DType::F32,
        distribution: Distribution::Rand,
        count: 2,
    };
    let generated = create_challenge(&mut dev, &sub, &req, &HarnessConfig::default()).unwrap();
    assert_eq!(generated.ops, 16);
    assert!(evaluate(&mut dev, &sub, &generated.blob, &HarnessConfig::default()).is_ok());
}

#[tokio::test]
async fn test_queue_end_to_end() {
    let queue = kbot_harness::DeviceQueue::new(device(), HarnessConfig { seed: Some(1), ..Default::default() });
    let generated = queue.create_challenge(negate_submission(), request(2)).await.unwrap();
    let eval = queue
        .evaluate(negate_submission(), Arc::new(generated.blob))
        .await
        .unwrap();
    assert_eq!(eval.cases(), 2);
}
