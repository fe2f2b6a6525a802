//! C interface.
//!
//! Every entry point returns a `ReasonCode` as `c_int` (`SIMKERN_OK` on
//! success) and writes results through out-pointers. Operands are borrowed
//! for the duration of the call only. On failure single-pair kernels leave
//! `*out` untouched. Panics never cross the boundary; they surface as
//! `SIMKERN_ERR_INTERNAL`.
//!
//! Zero-length operands may be passed as null pointers.

use std::ffi::c_void;
use std::mem::{align_of, size_of};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::slice;

use libc::{c_char, c_int, size_t};

use crate::batch::{Batch, BatchDriver, BatchReport, RowStatus};
use crate::config::{BatchConfig, DEFAULT_PARALLEL_THRESHOLD};
use crate::dispatch;
use crate::error::ReasonCode;
use crate::kernels::{
    binary, probability, spatial, Backend, CpuCapabilities, ElementType, Metric, Operand,
};
use crate::version;

pub const SIMKERN_OK: c_int = ReasonCode::Ok as c_int;
pub const SIMKERN_ERR_LENGTH_MISMATCH: c_int = ReasonCode::LengthMismatch as c_int;
pub const SIMKERN_ERR_SINGULARITY: c_int = ReasonCode::Singularity as c_int;
pub const SIMKERN_ERR_DEGENERATE_INPUT: c_int = ReasonCode::DegenerateInput as c_int;
pub const SIMKERN_ERR_UNSUPPORTED_WIDTH: c_int = ReasonCode::UnsupportedWidth as c_int;
pub const SIMKERN_ERR_INVALID_MASS: c_int = ReasonCode::InvalidMass as c_int;
pub const SIMKERN_ERR_NULL_POINTER: c_int = ReasonCode::NullPointer as c_int;
pub const SIMKERN_ERR_INVALID_ARGUMENT: c_int = ReasonCode::InvalidArgument as c_int;
pub const SIMKERN_ERR_PARTIAL: c_int = ReasonCode::Partial as c_int;
pub const SIMKERN_ERR_INTERNAL: c_int = ReasonCode::Internal as c_int;

/// `SimkernBatchConfig::backend` value for automatic selection.
pub const SIMKERN_BACKEND_AUTO: c_int = -1;

/// Run `f`, mapping its outcome and any panic to a status code.
fn guard<F>(f: F) -> c_int
where
    F: FnOnce() -> Result<ReasonCode, ReasonCode>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(code)) | Ok(Err(code)) => code as c_int,
        Err(_) => SIMKERN_ERR_INTERNAL,
    }
}

/// Borrow `len` elements at `ptr`.
///
/// # Safety
/// For `len > 0`, `ptr` must point to `len` initialized elements that stay
/// valid and unmodified for `'a`.
unsafe fn operand<'a, T>(ptr: *const T, len: usize) -> Result<&'a [T], ReasonCode> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(ReasonCode::NullPointer);
    }
    if (ptr as usize) % align_of::<T>() != 0 {
        return Err(ReasonCode::InvalidArgument);
    }
    Ok(slice::from_raw_parts(ptr, len))
}

// ============================================================================
// Single-pair kernels
// ============================================================================

macro_rules! export_float_kernel {
    ($($name:ident => $kernel:path, $t:ty;)*) => {
        $(
            /// Evaluate one pair of float vectors into `*out`.
            ///
            /// # Safety
            /// `a` and `b` must point to `a_len` / `b_len` readable elements
            /// (or be null when the length is zero); `out` must be writable.
            #[no_mangle]
            pub unsafe extern "C" fn $name(
                a: *const $t,
                a_len: size_t,
                b: *const $t,
                b_len: size_t,
                out: *mut f64,
            ) -> c_int {
                guard(|| {
                    if out.is_null() {
                        return Err(ReasonCode::NullPointer);
                    }
                    let a = operand(a, a_len)?;
                    let b = operand(b, b_len)?;
                    let value = $kernel(a, b).map_err(|e| e.code())?;
                    *out = value;
                    Ok(ReasonCode::Ok)
                })
            }
        )*
    };
}

export_float_kernel! {
    simkern_cos_f32 => spatial::cos, f32;
    simkern_cos_f64 => spatial::cos, f64;
    simkern_sqeuclidean_f32 => spatial::sqeuclidean, f32;
    simkern_sqeuclidean_f64 => spatial::sqeuclidean, f64;
    simkern_kullbackleibler_f32 => probability::kullbackleibler, f32;
    simkern_kullbackleibler_f64 => probability::kullbackleibler, f64;
    simkern_jensenshannon_f32 => probability::jensenshannon, f32;
    simkern_jensenshannon_f64 => probability::jensenshannon, f64;
}

/// Borrow two bitsets of `a_bits` / `b_bits` bits.
unsafe fn bitsets<'a>(
    a: *const u8,
    a_bits: size_t,
    b: *const u8,
    b_bits: size_t,
) -> Result<(&'a [u8], &'a [u8]), ReasonCode> {
    if a_bits != b_bits {
        return Err(ReasonCode::LengthMismatch);
    }
    let bytes = a_bits.div_ceil(8);
    Ok((operand(a, bytes)?, operand(b, bytes)?))
}

/// Hamming distance over the first `a_bits` bits, written as `f64`.
///
/// # Safety
/// `a` and `b` must each point to `ceil(bits / 8)` readable bytes; `out`
/// must be writable.
#[no_mangle]
pub unsafe extern "C" fn simkern_hamming_u8(
    a: *const u8,
    a_bits: size_t,
    b: *const u8,
    b_bits: size_t,
    out: *mut f64,
) -> c_int {
    guard(|| {
        if out.is_null() {
            return Err(ReasonCode::NullPointer);
        }
        let (a, b) = bitsets(a, a_bits, b, b_bits)?;
        let count = binary::hamming_bits(a, b, a_bits).map_err(|e| e.code())?;
        *out = count as f64;
        Ok(ReasonCode::Ok)
    })
}

/// Jaccard index over the first `a_bits` bits.
///
/// # Safety
/// Same contract as [`simkern_hamming_u8`].
#[no_mangle]
pub unsafe extern "C" fn simkern_jaccard_u8(
    a: *const u8,
    a_bits: size_t,
    b: *const u8,
    b_bits: size_t,
    out: *mut f64,
) -> c_int {
    guard(|| {
        if out.is_null() {
            return Err(ReasonCode::NullPointer);
        }
        let (a, b) = bitsets(a, a_bits, b, b_bits)?;
        *out = binary::jaccard_bits(a, b, a_bits).map_err(|e| e.code())?;
        Ok(ReasonCode::Ok)
    })
}

// ============================================================================
// Batch
// ============================================================================

/// Batch descriptor.
///
/// Rows start `row_stride` bytes apart and hold `row_width` elements each;
/// `row_width` must equal `target_len`. For `u8` rows widths count bytes and
/// every bit of every byte is compared.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SimkernBatch {
    /// `Metric` code
    pub metric: c_int,
    /// `ElementType` code
    pub element: c_int,
    pub rows: *const c_void,
    pub row_width: size_t,
    /// Distance between row starts in bytes
    pub row_stride: size_t,
    pub row_count: size_t,
    pub target: *const c_void,
    pub target_len: size_t,
    /// Optional LSB-first row validity bitmap; null means all rows valid
    pub validity: *const u8,
}

/// Batch configuration. The C interface always uses the continue policy.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SimkernBatchConfig {
    /// Written for failed and null rows (default: NaN)
    pub null_value: f64,
    /// Minimum rows for parallel evaluation (default: 1024)
    pub parallel_threshold: size_t,
    /// `Backend` code, or `SIMKERN_BACKEND_AUTO`
    pub backend: c_int,
}

impl Default for SimkernBatchConfig {
    fn default() -> Self {
        Self {
            null_value: f64::NAN,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            backend: SIMKERN_BACKEND_AUTO,
        }
    }
}

impl SimkernBatchConfig {
    fn to_config(self) -> Result<BatchConfig, ReasonCode> {
        let mut config = BatchConfig::new()
            .with_null_value(self.null_value)
            .with_parallel_threshold(self.parallel_threshold);
        if self.backend != SIMKERN_BACKEND_AUTO {
            let backend = Backend::from_code(self.backend).ok_or(ReasonCode::InvalidArgument)?;
            config = config.with_backend(backend);
        }
        config.validate().map_err(|_| ReasonCode::InvalidArgument)?;
        Ok(config)
    }
}

/// One failed row.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimkernRowFailure {
    pub row: size_t,
    /// `ReasonCode` of the failure
    pub reason: c_int,
}

/// Get the default batch configuration.
#[no_mangle]
pub extern "C" fn simkern_batch_config_default() -> SimkernBatchConfig {
    SimkernBatchConfig::default()
}

/// Type the descriptor's buffers and run the driver.
unsafe fn run_typed<T: Operand>(
    desc: &SimkernBatch,
    metric: Metric,
    driver: &BatchDriver,
    out: &mut [f64],
) -> Result<BatchReport, ReasonCode> {
    let elem = size_of::<T>();
    if desc.row_stride % elem != 0 {
        return Err(ReasonCode::UnsupportedWidth);
    }
    let stride = desc.row_stride / elem;

    let rows_len = match desc.row_count {
        0 => 0,
        n => (n - 1)
            .checked_mul(stride)
            .and_then(|len| len.checked_add(desc.row_width))
            .ok_or(ReasonCode::InvalidArgument)?,
    };
    let rows = operand(desc.rows as *const T, rows_len)?;
    let target = operand(desc.target as *const T, desc.target_len)?;

    let mut batch = Batch::strided(rows, desc.row_width, stride, desc.row_count, target)
        .map_err(|e| e.code())?;
    if !desc.validity.is_null() {
        let bitmap = operand(desc.validity, desc.row_count.div_ceil(8))?;
        batch = batch.with_validity(bitmap).map_err(|e| e.code())?;
    }

    driver.run_into(metric, &batch, out).map_err(|e| e.code())
}

/// Evaluate a batch with the continue-and-mark policy.
///
/// Writes one value per row to `out` (`out_len` must equal `row_count`).
/// Failed rows receive the configured fill value and, up to
/// `failures_cap`, a `(row, reason)` record in `failures`;
/// `*failure_count` receives the total number of failed rows. When
/// `out_validity` is non-null, bit `i` (LSB-first) is cleared for null input
/// rows and set otherwise.
///
/// Returns `SIMKERN_OK` when every non-null row succeeded and
/// `SIMKERN_ERR_PARTIAL` when some failed. Argument errors return their
/// reason code with nothing written.
///
/// # Safety
/// `batch` must point to a valid descriptor whose buffers cover the
/// described rows; `out` must hold `out_len` writable slots; `out_validity`
/// (optional) must hold `ceil(row_count / 8)` writable bytes; `failures`
/// must hold `failures_cap` writable records (or be null with a cap of 0).
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn simkern_batch(
    batch: *const SimkernBatch,
    config: *const SimkernBatchConfig,
    out: *mut f64,
    out_len: size_t,
    out_validity: *mut u8,
    failures: *mut SimkernRowFailure,
    failures_cap: size_t,
    failure_count: *mut size_t,
) -> c_int {
    guard(|| {
        let desc = batch.as_ref().ok_or(ReasonCode::NullPointer)?;
        if failures.is_null() && failures_cap > 0 {
            return Err(ReasonCode::NullPointer);
        }
        let metric = Metric::from_code(desc.metric).ok_or(ReasonCode::InvalidArgument)?;
        let element = ElementType::from_code(desc.element).ok_or(ReasonCode::InvalidArgument)?;
        if !metric.accepts(element) {
            return Err(ReasonCode::UnsupportedWidth);
        }
        let config = config.as_ref().copied().unwrap_or_default().to_config()?;
        let driver = BatchDriver::new(config).map_err(|_| ReasonCode::InvalidArgument)?;

        if out_len != desc.row_count {
            return Err(ReasonCode::InvalidArgument);
        }
        if out.is_null() && out_len > 0 {
            return Err(ReasonCode::NullPointer);
        }
        let out: &mut [f64] = if out_len == 0 {
            &mut []
        } else {
            slice::from_raw_parts_mut(out, out_len)
        };

        let report = match element {
            ElementType::F32 => run_typed::<f32>(desc, metric, &driver, out)?,
            ElementType::F64 => run_typed::<f64>(desc, metric, &driver, out)?,
            ElementType::U8 => run_typed::<u8>(desc, metric, &driver, out)?,
        };

        if !out_validity.is_null() {
            let bitmap = slice::from_raw_parts_mut(out_validity, report.rows.div_ceil(8));
            bitmap.fill(0);
            for (row, status) in report.statuses.iter().enumerate() {
                if *status != RowStatus::Null {
                    bitmap[row / 8] |= 1 << (row % 8);
                }
            }
        }

        let mut failed = 0usize;
        for (row, err) in report.failures() {
            if failed < failures_cap {
                *failures.add(failed) = SimkernRowFailure {
                    row,
                    reason: err.code() as c_int,
                };
            }
            failed += 1;
        }
        if let Some(count) = failure_count.as_mut() {
            *count = failed;
        }

        Ok(if failed == 0 {
            ReasonCode::Ok
        } else {
            ReasonCode::Partial
        })
    })
}

// ============================================================================
// Runtime info
// ============================================================================

/// Detected CPU capabilities (calibrates dispatch on first call).
#[no_mangle]
pub extern "C" fn simkern_capabilities() -> CpuCapabilities {
    dispatch::capabilities()
}

/// Calibrate dispatch now and return the preferred `Backend` code.
#[no_mangle]
pub extern "C" fn simkern_warmup() -> c_int {
    dispatch::warmup() as c_int
}

/// Library version as a static nul-terminated string.
#[no_mangle]
pub extern "C" fn simkern_version() -> *const c_char {
    version::VERSION_CSTR.as_ptr() as *const c_char
}

/// Static nul-terminated description of a reason code.
#[no_mangle]
pub extern "C" fn simkern_reason_message(code: c_int) -> *const c_char {
    match ReasonCode::from_code(code) {
        Some(code) => code.message_with_nul().as_ptr() as *const c_char,
        None => "unknown reason code\0".as_ptr() as *const c_char,
    }
}
