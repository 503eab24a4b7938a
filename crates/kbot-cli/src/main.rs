use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kbot_core::{fmt_time, literal, DType};
use kbot_harness::{Backend, BackendKind, Distribution, HarnessConfig, KernelSubmission, SuiteRequest, TestSuite};
use kbot_kernels::KernelType;

const BANNER: &str = r#"
 _    _           _
| | _| |__   ___ | |_
| |/ / '_ \ / _ \| __|
|   <| |_) | (_) | |_
|_|\_\_.__/ \___/ \__|"#;

#[derive(Parser)]
#[command(
    name = "kbot",
    about = "Kernel benchmark harness",
    long_about = "Generate randomized test suites from a reference kernel, verify and time\nsubmitted kernels against them, and serve challenges over HTTP.",
    version,
)]
struct Cli {
    /// Device backend: emulator or cuda
    #[arg(long, global = true, default_value = "emulator")]
    backend: BackendKind,
    /// JSON harness config (tolerances, timing repeats, seed)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

/// Kernel source, dialect, entry point and launch geometry.
#[derive(clap::Args)]
struct KernelArgs {
    /// Path to the kernel source
    #[arg(long)]
    source: PathBuf,
    /// Kernel dialect: CUDA or PTX
    #[arg(long, default_value = "CUDA")]
    kernel_type: KernelType,
    /// Entry point name
    #[arg(long)]
    name: String,
    /// Grid extent, e.g. "(1, 1, 1)"
    #[arg(long, default_value = "(1, 1, 1)")]
    global: String,
    /// Block extent, e.g. "(256, 1, 1)"
    #[arg(long)]
    local: String,
}

impl KernelArgs {
    fn submission(&self) -> anyhow::Result<KernelSubmission> {
        let source = std::fs::read_to_string(&self.source)
            .with_context(|| format!("reading kernel source {}", self.source.display()))?;
        let geometry = literal::parse_geometry(&self.global, &self.local)?;
        Ok(KernelSubmission::new(source, self.kernel_type, self.name.clone(), geometry))
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend and device information
    Info,
    /// Generate a test suite from a reference kernel
    Generate {
        #[command(flatten)]
        kernel: KernelArgs,
        /// Input shapes, e.g. "[(4, 4), (4, 4)]"
        #[arg(long)]
        inputs: String,
        /// Output shape, e.g. "(4, 4)"
        #[arg(long)]
        output_shape: String,
        /// Element type: half, single or double
        #[arg(long, default_value = "single")]
        dtype: DType,
        /// Input distribution: rand, randn, randint
        #[arg(long, default_value = "randn")]
        distribution: Distribution,
        /// Number of test cases
        #[arg(long, default_value = "10")]
        count: usize,
        /// Output suite file
        #[arg(long, short, default_value = "suite.safetensors")]
        output: PathBuf,
    },
    /// Verify and time a kernel against a suite
    Evaluate {
        #[command(flatten)]
        kernel: KernelArgs,
        /// Suite file produced by `generate`
        #[arg(long)]
        suite: PathBuf,
    },
    /// Summarize a suite file
    Inspect {
        /// Suite file
        suite: PathBuf,
    },
    /// Start the challenge server
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => cmd_info(cli.backend, config),
        Commands::Generate { kernel, inputs, output_shape, dtype, distribution, count, output } => {
            let request = SuiteRequest {
                name: kernel.name.clone(),
                input_shapes: literal::parse_shape_list(&inputs)?,
                output_shape: literal::parse_shape(&output_shape)?,
                dtype,
                distribution,
                count,
            };
            cmd_generate(cli.backend, config, &kernel, &request, &output)
        }
        Commands::Evaluate { kernel, suite } => cmd_evaluate(cli.backend, config, &kernel, &suite),
        Commands::Inspect { suite } => cmd_inspect(&suite),
        Commands::Serve { addr } => cmd_serve(cli.backend, config, &addr),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<HarnessConfig> {
    match path {
        Some(p) => HarnessConfig::from_file(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(HarnessConfig::default()),
    }
}

fn cmd_info(kind: BackendKind, config: HarnessConfig) -> anyhow::Result<()> {
    println!("{}", BANNER);
    println!("  v{}  -  kernel benchmark harness\n", env!("CARGO_PKG_VERSION"));

    println!("Platform");
    println!("  OS:   {}", std::env::consts::OS);
    println!("  Arch: {}", std::env::consts::ARCH);

    println!("\nCUDA");
    #[cfg(feature = "cuda")]
    {
        let count = kbot_kernels::cuda::device_count();
        println!("  built with cuda: [x]");
        println!("  devices:         {}", count);
    }
    #[cfg(not(feature = "cuda"))]
    println!("  built with cuda: [ ]");

    println!("\nHarness");
    println!("  rtol:           {}", config.rtol);
    println!("  atol:           {}", config.atol);
    println!("  timing repeats: {}", config.timing_repeats);
    match config.seed {
        Some(seed) => println!("  seed:           {}", seed),
        None => println!("  seed:           (entropy)"),
    }

    let backend = Backend::open(kind, config)?;
    println!("\nBackend");
    println!("  {}", backend.describe());
    Ok(())
}

fn cmd_generate(
    kind: BackendKind,
    config: HarnessConfig,
    kernel: &KernelArgs,
    request: &SuiteRequest,
    output: &Path,
) -> anyhow::Result<()> {
    request.validate(&config)?;
    let reference = kernel.submission()?;
    let backend = Backend::open(kind, config)?;
    let generated = backend.create_challenge_blocking(&reference, request)?;

    std::fs::write(output, &generated.blob)
        .with_context(|| format!("writing suite {}", output.display()))?;

    println!("Wrote {} ({} bytes)", output.display(), generated.blob.len());
    println!("  cases:    {}", generated.suite.len());
    println!("  ops:      {}", generated.ops);
    println!("  baseline: {}", fmt_time(generated.baseline));
    Ok(())
}

fn cmd_evaluate(kind: BackendKind, config: HarnessConfig, kernel: &KernelArgs, suite: &Path) -> anyhow::Result<()> {
    let blob = std::fs::read(suite).with_context(|| format!("reading suite {}", suite.display()))?;
    let submission = kernel.submission()?;
    let backend = Backend::open(kind, config)?;
    let evaluation = backend.evaluate_blocking(&submission, &blob)?;

    println!("{:<8} {:>12}", "Case", "Time");
    println!("{}", "-".repeat(21));
    for (i, t) in evaluation.timings.iter().enumerate() {
        println!("{:<8} {:>12}", i, fmt_time(*t));
    }
    println!("{}", "-".repeat(21));
    println!("{:<8} {:>12}", "Mean", evaluation.display());
    Ok(())
}

fn cmd_inspect(path: &Path) -> anyhow::Result<()> {
    let blob = std::fs::read(path).with_context(|| format!("reading suite {}", path.display()))?;
    let suite = TestSuite::from_bytes(&blob)?;

    println!("Suite '{}'", suite.name());
    println!("  cases:  {}", suite.len());
    println!("  arity:  {}", suite.arity());
    println!("  ops:    {}", suite.ops());
    if let Some(dtype) = suite.dtype() {
        println!("  dtype:  {}", dtype.challenge_name());
    }
    let inputs: Vec<String> = suite.input_shapes().iter().map(|s| s.to_string()).collect();
    println!("  inputs: [{}]", inputs.join(", "));
    if let Some(shape) = suite.output_shape() {
        println!("  output: {}", shape);
    }
    Ok(())
}

fn cmd_serve(kind: BackendKind, config: HarnessConfig, addr: &str) -> anyhow::Result<()> {
    let backend = Backend::open(kind, config)?;

    println!("{}", BANNER);
    println!("  v{}  -  challenge server\n", env!("CARGO_PKG_VERSION"));
    println!("  Listening on {}", addr);
    println!("  Backend: {}\n", backend.describe());
    println!("  Endpoints:");
    println!("    GET    /health");
    println!("    GET    /v1/challenges");
    println!("    POST   /v1/challenges");
    println!("    DELETE /v1/challenges/:name");
    println!("    POST   /v1/challenges/:name/submissions");
    println!("    GET    /v1/challenges/:name/leaderboard");
    println!("    GET    /v1/challenges/:name/users/:user/submissions");
    println!("    DELETE /v1/users/:user");
    println!("    GET    /v1/export\n");

    let state = kbot_serve::AppState::new(backend);
    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    rt.block_on(kbot_serve::server::serve(addr, state))
}
