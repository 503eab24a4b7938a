//! Process-wide serialization of device work.
//!
//! The device, its compiler and its allocator are one shared resource. Every
//! request (compile + generate, or compile + run) takes the device lock once
//! and holds it until all of its buffers are released. Jobs run on tokio's
//! blocking pool; dropping the awaiting future does not interrupt a job that
//! has started.

use std::sync::Arc;

use kbot_kernels::Accelerator;
use parking_lot::Mutex;

use crate::generator::{generate, GeneratedSuite, SuiteRequest};
use crate::runner::{run, Evaluation};
use crate::{HarnessConfig, HarnessError, KernelSubmission, Result};

/// Exclusive access to one accelerator.
pub struct DeviceQueue<A> {
    device: Arc<Mutex<A>>,
    config: Arc<HarnessConfig>,
}

impl<A> Clone for DeviceQueue<A> {
    fn clone(&self) -> Self {
        Self {
            device: Arc::clone(&self.device),
            config: Arc::clone(&self.config),
        }
    }
}

impl<A: Accelerator + 'static> DeviceQueue<A> {
    pub fn new(device: A, config: HarnessConfig) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run `f` with the device held, on the calling thread.
    pub fn with_device<R>(&self, f: impl FnOnce(&mut A, &HarnessConfig) -> R) -> R {
        let mut device = self.device.lock();
        f(&mut device, &self.config)
    }

    /// Queue `f` as one device job on the blocking pool.
    pub async fn submit<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut A, &HarnessConfig) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let device = Arc::clone(&self.device);
        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || {
            let mut device = device.lock();
            f(&mut device, &config)
        })
        .await
        .map_err(|e| HarnessError::Internal(format!("device job panicked or was cancelled: {e}")))?
    }

    /// Compile the reference kernel and generate a suite from it.
    pub async fn create_challenge(
        &self,
        reference: KernelSubmission,
        request: SuiteRequest,
    ) -> Result<GeneratedSuite> {
        self.submit(move |device, config| create_challenge(device, &reference, &request, config))
            .await
    }

    /// Compile a submission and verify it against a stored suite.
    pub async fn evaluate(&self, submission: KernelSubmission, blob: Arc<Vec<u8>>) -> Result<Evaluation> {
        self.submit(move |device, config| evaluate(device, &submission, &blob, config))
            .await
    }
}

/// Compile + generate on a device already held by the caller.
pub fn create_challenge<A: Accelerator>(
    device: &mut A,
    reference: &KernelSubmission,
    request: &SuiteRequest,
    config: &HarnessConfig,
) -> Result<GeneratedSuite> {
    request.validate(config)?;
    let program = reference.compile(device)?;
    generate(device, &program, &reference.geometry, request, config)
}

/// Compile + run on a device already held by the caller.
pub fn evaluate<A: Accelerator>(
    device: &mut A,
    submission: &KernelSubmission,
    blob: &[u8],
    config: &HarnessConfig,
) -> Result<Evaluation> {
    let program = submission.compile(device)?;
    run(device, &program, &submission.geometry, blob, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use kbot_core::{DType, LaunchGeometry, Shape};
    use kbot_kernels::{EmulatedDevice, HostKernel, KernelType};

    use crate::Distribution;

    fn reference() -> KernelSubmission {
        KernelSubmission::new(
            "extern \"C\" __global__ void matmul(float* c, const float* a, const float* b) {}",
            KernelType::Cuda,
            "matmul",
            LaunchGeometry::new([1, 1, 1], [4, 4, 1]).unwrap(),
        )
    }

    fn request(count: usize) -> SuiteRequest {
        SuiteRequest {
            name: "matmul".into(),
            input_shapes: vec![Shape::new(&[4, 4]), Shape::new(&[4, 4])],
            output_shape: Shape::new(&[4, 4]),
            dtype: DType::F32,
            distribution: Distribution::Rand,
            count,
        }
    }

    #[tokio::test]
    async fn test_create_then_evaluate() {
        let queue = DeviceQueue::new(EmulatedDevice::with_builtins(), HarnessConfig::default());
        let generated = queue.create_challenge(reference(), request(2)).await.unwrap();
        let eval = queue
            .evaluate(reference(), Arc::new(generated.blob))
            .await
            .unwrap();
        assert_eq!(eval.cases(), 2);
    }

    #[tokio::test]
    async fn test_zero_count_skips_compile() {
        let queue = DeviceQueue::new(EmulatedDevice::with_builtins(), HarnessConfig::default());
        let err = queue.create_challenge(reference(), request(0)).await.unwrap_err();
        assert!(matches!(err, HarnessError::InvalidArgument(_)));
        assert_eq!(queue.with_device(|d, _| d.compile_count()), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_jobs_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (active.clone(), peak.clone());
        let slow = HostKernel::new(move |_: &LaunchGeometry, _: &mut [Vec<u8>]| {
            let now = a.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            a.fetch_sub(1, Ordering::SeqCst);
            Ok(None)
        });
        let device = EmulatedDevice::new().with_kernel("slow", slow);
        let queue = DeviceQueue::new(device, HarnessConfig::default());

        let jobs: Vec<_> = (0..8)
            .map(|_| {
                let q = queue.clone();
                tokio::spawn(async move {
                    let sub = KernelSubmission::new(
                        "__global__ void slow(float* o, const float* a) {}",
                        KernelType::Cuda,
                        "slow",
                        LaunchGeometry::new([1, 1, 1], [1, 1, 1]).unwrap(),
                    );
                    let mut req = request(2);
                    req.input_shapes = vec![Shape::new(&[4])];
                    q.create_challenge(sub, req).await
                })
            })
            .collect();
        for job in jobs {
            job.await.unwrap().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
