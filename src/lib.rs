//! simkern
//!
//! Vectorized similarity and divergence kernels for dataframe and query
//! engines: cosine distance, squared Euclidean distance, Kullback-Leibler and
//! Jensen-Shannon divergence over `f32`/`f64` vectors, and Hamming distance
//! and Jaccard index over packed bitsets.
//!
//! # Features
//!
//! - **cli**: Build the `simkern` command-line tool (capability report and
//!   ad-hoc batch evaluation)

// Error types and C reason codes
pub mod error;

// Scalar, AVX2 and NEON kernels
pub mod kernels;

// Runtime backend selection
pub mod dispatch;

// Batch configuration and host kwargs
pub mod config;

// Row-wise batch driver
pub mod batch;

// C interface
pub mod ffi;

// Build metadata
pub mod version;

pub use batch::{evaluate_rows, Batch, BatchDriver, BatchOutput, BatchReport, RowStatus};
pub use config::{BatchConfig, FailurePolicy, Kwargs};
pub use error::{BatchError, ConfigError, KernelError, ReasonCode};
pub use kernels::{
    binary::{hamming, jaccard},
    evaluate,
    probability::{jensenshannon, kullbackleibler},
    spatial::{cos, sqeuclidean},
    Backend, CpuCapabilities, ElementType, Family, Metric,
};
