//! simkern command-line tool
//!
//! Reports the kernels' view of the CPU and evaluates metrics on JSON input.
//!
//! Usage:
//!   simkern caps
//!   simkern eval cos --target '[1, 1, 2]' --rows '[[0, 1, 2], [1, 1, 2], null]'
//!
//! `eval` prints one line per row: the value, `null` for null rows, or
//! `error: <reason>` for rows that failed.

use std::error::Error;

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing::info;

use simkern::dispatch::{self, FORCE_SCALAR_ENV};
use simkern::kernels::{Family, Operand};
use simkern::version;
use simkern::{
    Backend, Batch, BatchConfig, BatchDriver, BatchError, ElementType, FailurePolicy, Metric,
};

/// Vectorized similarity kernels
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print detected CPU capabilities and build information
    Caps,
    /// Evaluate a metric for each row against a target
    Eval(EvalArgs),
}

#[derive(clap::Args, Debug)]
struct EvalArgs {
    /// Metric: cos, sqeuclidean, kullbackleibler, jensenshannon, hamming, jaccard
    metric: Metric,

    /// Comparison target as a JSON array
    #[arg(short, long)]
    target: String,

    /// Rows as a JSON array of arrays; `null` marks a null row
    #[arg(short, long)]
    rows: String,

    /// Element type (default: f64 for float metrics, u8 for bitsets)
    #[arg(long)]
    dtype: Option<ElementType>,

    /// Force a backend (scalar, avx2, neon)
    #[arg(long)]
    backend: Option<Backend>,

    /// Fail on the first failing row instead of marking it
    #[arg(long)]
    abort: bool,

    /// Fill value for failed and null rows
    #[arg(long)]
    null_value: Option<f64>,

    /// Minimum rows for parallel evaluation
    #[arg(long)]
    parallel_threshold: Option<usize>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Caps => caps(),
        Command::Eval(eval_args) => {
            for line in eval(&eval_args)? {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn caps() {
    let calibration = dispatch::calibration();
    println!("{}", version::build_info());
    println!();
    println!("capabilities:      {}", calibration.capabilities.description());
    println!("preferred backend: {}", calibration.preferred);
    if calibration.forced_scalar {
        println!("                   ({} is set)", FORCE_SCALAR_ENV);
    }
    println!();
    println!("metrics:");
    for metric in Metric::ALL {
        println!("  {:<16} {}", metric.name(), metric.family());
    }
}

fn eval(args: &EvalArgs) -> Result<Vec<String>, Box<dyn Error>> {
    let element = args.dtype.unwrap_or(match args.metric.family() {
        Family::Binary => ElementType::U8,
        Family::Spatial | Family::Probability => ElementType::F64,
    });

    let mut config = BatchConfig::new();
    if args.abort {
        config = config.with_policy(FailurePolicy::Abort);
    }
    if let Some(value) = args.null_value {
        config = config.with_null_value(value);
    }
    if let Some(rows) = args.parallel_threshold {
        config = config.with_parallel_threshold(rows);
    }
    if let Some(backend) = args.backend {
        config = config.with_backend(backend);
    }

    info!("Evaluating {} over {} rows", args.metric, element);
    match element {
        ElementType::F32 => eval_typed::<f32>(args, config),
        ElementType::F64 => eval_typed::<f64>(args, config),
        ElementType::U8 => eval_typed::<u8>(args, config),
    }
}

fn eval_typed<T>(args: &EvalArgs, config: BatchConfig) -> Result<Vec<String>, Box<dyn Error>>
where
    T: Operand + DeserializeOwned + Default,
{
    let target: Vec<T> = serde_json::from_str(&args.target)?;
    let rows: Vec<Option<Vec<T>>> = serde_json::from_str(&args.rows)?;
    let width = target.len();

    let mut flat = Vec::with_capacity(rows.len() * width);
    let mut validity = vec![0u8; rows.len().div_ceil(8)];
    for (index, row) in rows.iter().enumerate() {
        match row {
            Some(values) => {
                if values.len() != width {
                    return Err(BatchError::WidthMismatch {
                        expected: width,
                        found: values.len(),
                    }
                    .into());
                }
                flat.extend_from_slice(values);
                validity[index / 8] |= 1 << (index % 8);
            }
            None => flat.extend(std::iter::repeat(T::default()).take(width)),
        }
    }

    let batch = Batch::strided(&flat, width, width, rows.len(), &target)?.with_validity(&validity)?;
    let output = BatchDriver::new(config)?.run(args.metric, &batch)?;

    Ok(output
        .results()
        .map(|result| match result {
            None => "null".to_string(),
            Some(Ok(value)) => value.to_string(),
            Some(Err(err)) => format!("error: {}", err),
        })
        .collect())
}
