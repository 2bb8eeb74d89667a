//! montecarlo-pi — estimate pi by Monte Carlo quadrature on the GPU.
//!
//! ```text
//! montecarlo-pi                        # 1,000,000 seeds on the default GPU
//! montecarlo-pi --backend cpu -n 100000
//! RUST_LOG=debug montecarlo-pi --rng-seed 42
//! ```

use clap::{Parser, ValueEnum};

use montecarlo_pi::config::{INNER_ITERATIONS, NUM_SEEDS, WORKGROUP_SIZE};
use montecarlo_pi::{run, Backend, EstimatorConfig, EstimatorError};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    /// wgpu compute shader on the default adapter.
    Gpu,
    /// CPU reference kernel, single thread.
    Cpu,
}

impl From<BackendArg> for Backend {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Gpu => Backend::Gpu,
            BackendArg::Cpu => Backend::Cpu,
        }
    }
}

#[derive(Parser)]
#[command(name = "montecarlo-pi")]
#[command(version, about = "Monte Carlo estimate of pi on a wgpu compute shader")]
struct Cli {
    /// Number of seeds (one kernel lane each).
    #[arg(short = 'n', long = "seeds", default_value_t = NUM_SEEDS)]
    num_seeds: usize,

    /// PCG draws per seed.
    #[arg(short, long, default_value_t = INNER_ITERATIONS)]
    iterations: u32,

    /// Lanes per workgroup.
    #[arg(short, long, default_value_t = WORKGROUP_SIZE)]
    workgroup_size: u32,

    /// Where the kernel runs.
    #[arg(short, long, value_enum, default_value_t = BackendArg::Gpu)]
    backend: BackendArg,

    /// Seed the host RNG for a reproducible run.
    #[arg(long)]
    rng_seed: Option<u64>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = EstimatorConfig {
        num_seeds: cli.num_seeds,
        iterations: cli.iterations,
        workgroup_size: cli.workgroup_size,
        rng_seed: cli.rng_seed,
    };

    match run(&config, cli.backend.into()) {
        Ok(report) => println!("{report}"),
        // No GPU API is a clean stop, not a crash.
        Err(e @ EstimatorError::CapabilityUnavailable) => {
            eprintln!("{e}; try --backend cpu");
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
