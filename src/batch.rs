//! Batch driver: one metric, one comparison target, many rows.
//!
//! Rows live in a flat buffer with a fixed stride. Result `i` always lands
//! in output slot `i`, whether rows are evaluated sequentially or fanned
//! out with rayon, and the backend is chosen once per batch so both modes
//! produce bit-identical results.
//!
//! ## Usage
//! ```ignore
//! use simkern::batch::{Batch, BatchDriver};
//! use simkern::{BatchConfig, Metric};
//!
//! let rows = [0.0f32, 1.0, 2.0, 1.0, 1.0, 2.0];
//! let batch = Batch::new(&rows, &[1.0, 1.0, 2.0])?;
//! let output = BatchDriver::new(BatchConfig::default())?.run(Metric::Cos, &batch)?;
//! ```

use rayon::prelude::*;
use tracing::debug;

use crate::config::{BatchConfig, FailurePolicy};
use crate::dispatch;
use crate::error::{BatchError, ConfigError, KernelError};
use crate::kernels::{Backend, Metric, Operand};

/// A view of fixed-width rows plus the target they are compared against.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a, T> {
    rows: &'a [T],
    width: usize,
    stride: usize,
    row_count: usize,
    target: &'a [T],
    validity: Option<&'a [u8]>,
}

impl<'a, T: Operand> Batch<'a, T> {
    /// Contiguous rows, each as wide as `target`.
    pub fn new(rows: &'a [T], target: &'a [T]) -> Result<Self, BatchError> {
        let width = target.len();
        if width == 0 {
            return Err(BatchError::InvalidLayout(
                "contiguous rows need a non-empty target".to_string(),
            ));
        }
        if rows.len() % width != 0 {
            return Err(BatchError::InvalidLayout(format!(
                "row buffer of {} elements is not a multiple of width {}",
                rows.len(),
                width
            )));
        }
        Ok(Self {
            rows,
            width,
            stride: width,
            row_count: rows.len() / width,
            target,
            validity: None,
        })
    }

    /// `row_count` rows of `width` elements, `stride` elements apart.
    pub fn strided(
        rows: &'a [T],
        width: usize,
        stride: usize,
        row_count: usize,
        target: &'a [T],
    ) -> Result<Self, BatchError> {
        if width != target.len() {
            return Err(BatchError::WidthMismatch {
                expected: target.len(),
                found: width,
            });
        }
        if stride < width {
            return Err(BatchError::InvalidLayout(format!(
                "stride {} is smaller than row width {}",
                stride, width
            )));
        }
        if row_count > 0 {
            let needed = (row_count - 1)
                .checked_mul(stride)
                .and_then(|n| n.checked_add(width))
                .ok_or_else(|| BatchError::InvalidLayout("row layout overflows".to_string()))?;
            if needed > rows.len() {
                return Err(BatchError::InvalidLayout(format!(
                    "{} rows at stride {} need {} elements, buffer has {}",
                    row_count,
                    stride,
                    needed,
                    rows.len()
                )));
            }
        }
        Ok(Self {
            rows,
            width,
            stride,
            row_count,
            target,
            validity: None,
        })
    }

    /// Attach a validity bitmap (LSB-first, one bit per row). Rows whose bit
    /// is clear are null: they are skipped and are not failures.
    pub fn with_validity(mut self, bitmap: &'a [u8]) -> Result<Self, BatchError> {
        let needed = self.row_count.div_ceil(8);
        if bitmap.len() < needed {
            return Err(BatchError::InvalidLayout(format!(
                "validity bitmap has {} bytes, {} rows need {}",
                bitmap.len(),
                self.row_count,
                needed
            )));
        }
        self.validity = Some(bitmap);
        Ok(self)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn target(&self) -> &'a [T] {
        self.target
    }

    pub fn row(&self, index: usize) -> &'a [T] {
        let start = index * self.stride;
        &self.rows[start..start + self.width]
    }

    pub fn is_valid(&self, index: usize) -> bool {
        match self.validity {
            Some(bitmap) => bitmap[index / 8] & (1 << (index % 8)) != 0,
            None => true,
        }
    }
}

/// Outcome of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Ok,
    /// Input row was null.
    Null,
    Failed(KernelError),
}

/// Per-batch summary.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub rows: usize,
    pub backend: Backend,
    pub parallel: bool,
    pub statuses: Vec<RowStatus>,
}

impl BatchReport {
    /// Failed rows in row order.
    pub fn failures(&self) -> impl Iterator<Item = (usize, KernelError)> + '_ {
        self.statuses
            .iter()
            .enumerate()
            .filter_map(|(row, status)| match status {
                RowStatus::Failed(err) => Some((row, *err)),
                _ => None,
            })
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn null_count(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| **s == RowStatus::Null)
            .count()
    }

    /// True when no row failed.
    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Values plus statuses for an owned-output run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutput {
    /// One value per row; failed and null rows hold the fill value.
    pub values: Vec<f64>,
    pub report: BatchReport,
}

impl BatchOutput {
    /// Per-row results: `None` for null rows.
    pub fn results(&self) -> impl Iterator<Item = Option<Result<f64, KernelError>>> + '_ {
        self.values
            .iter()
            .zip(self.report.statuses.iter())
            .map(|(value, status)| match status {
                RowStatus::Ok => Some(Ok(*value)),
                RowStatus::Null => None,
                RowStatus::Failed(err) => Some(Err(*err)),
            })
    }
}

/// Applies kernels across batches under one configuration.
#[derive(Debug, Clone, Default)]
pub struct BatchDriver {
    config: BatchConfig,
}

impl BatchDriver {
    pub fn new(config: BatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Evaluate `metric(target, row)` for every row into a new buffer.
    pub fn run<T: Operand>(
        &self,
        metric: Metric,
        batch: &Batch<'_, T>,
    ) -> Result<BatchOutput, BatchError> {
        let mut values = vec![self.config.null_value; batch.row_count()];
        let report = self.run_into(metric, batch, &mut values)?;
        Ok(BatchOutput { values, report })
    }

    /// Evaluate into a caller-provided buffer of exactly `row_count` slots.
    ///
    /// Argument errors are reported before any slot is written. Under the
    /// abort policy a failing row fills every slot with the fill value and
    /// returns the lowest-index failure.
    pub fn run_into<T: Operand>(
        &self,
        metric: Metric,
        batch: &Batch<'_, T>,
        out: &mut [f64],
    ) -> Result<BatchReport, BatchError> {
        let rows = batch.row_count();
        if out.len() != rows {
            return Err(BatchError::OutputLength {
                expected: rows,
                found: out.len(),
            });
        }
        if !metric.accepts(T::ELEMENT) {
            return Err(BatchError::UnsupportedWidth {
                metric,
                element: T::ELEMENT,
            });
        }

        let path = dispatch::select_with(self.config.backend, T::ELEMENT, batch.width());
        let parallel = rows >= self.config.parallel_threshold;
        let null_value = self.config.null_value;
        let target = batch.target();

        debug!(
            "Batch {}: {} rows x {} {}, backend={}, parallel={}",
            metric,
            rows,
            batch.width(),
            T::ELEMENT,
            path.backend(),
            parallel
        );

        let eval_row = |index: usize, slot: &mut f64, status: &mut RowStatus| {
            if !batch.is_valid(index) {
                *slot = null_value;
                *status = RowStatus::Null;
                return;
            }
            match T::evaluate(metric, path, target, batch.row(index)) {
                Ok(value) => *slot = value,
                Err(err) => {
                    *slot = null_value;
                    *status = RowStatus::Failed(err);
                }
            }
        };

        let mut statuses = vec![RowStatus::Ok; rows];
        if parallel {
            out.par_iter_mut()
                .zip(statuses.par_iter_mut())
                .enumerate()
                .for_each(|(index, (slot, status))| eval_row(index, slot, status));
        } else {
            out.iter_mut()
                .zip(statuses.iter_mut())
                .enumerate()
                .for_each(|(index, (slot, status))| eval_row(index, slot, status));
        }

        let report = BatchReport {
            rows,
            backend: path.backend(),
            parallel,
            statuses,
        };

        match self.config.policy {
            FailurePolicy::Abort => {
                if let Some((row, source)) = report.failures().next() {
                    out.fill(null_value);
                    debug!("Batch {} aborted at row {}: {}", metric, row, source);
                    return Err(BatchError::RowFailed { row, source });
                }
            }
            FailurePolicy::Continue => {
                for (row, err) in report.failures() {
                    debug!("Batch {} row {} failed: {}", metric, row, err);
                }
            }
        }

        Ok(report)
    }
}

/// Evaluate contiguous rows against `target` with the default configuration.
pub fn evaluate_rows<T: Operand>(
    metric: Metric,
    rows: &[T],
    target: &[T],
) -> Result<BatchOutput, BatchError> {
    let batch = Batch::new(rows, target)?;
    BatchDriver::default().run(metric, &batch)
}
