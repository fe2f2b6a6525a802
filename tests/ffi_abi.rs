//! End-to-end tests of the exported C interface.

use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;

use simkern::ffi::*;
use simkern::{ElementType, Metric, ReasonCode};

fn float_batch<T>(
    metric: Metric,
    element: ElementType,
    rows: &[T],
    width: usize,
    target: &[T],
) -> SimkernBatch {
    SimkernBatch {
        metric: metric as i32,
        element: element as i32,
        rows: rows.as_ptr() as *const c_void,
        row_width: width,
        row_stride: width * size_of::<T>(),
        row_count: if width == 0 { 0 } else { rows.len() / width },
        target: target.as_ptr() as *const c_void,
        target_len: target.len(),
        validity: ptr::null(),
    }
}

#[test]
fn test_batch_continue_and_mark() {
    let rows = [0.0f32, 1.0, 2.0, 1.0, 1.0, 2.0, 0.0, 0.0, 0.0];
    let target = [1.0f32, 1.0, 2.0];
    let batch = float_batch(Metric::Cos, ElementType::F32, &rows, 3, &target);

    let mut out = [0.0f64; 3];
    let mut failures = [SimkernRowFailure::default(); 4];
    let mut failure_count = 0usize;
    let rc = unsafe {
        simkern_batch(
            &batch,
            ptr::null(),
            out.as_mut_ptr(),
            out.len(),
            ptr::null_mut(),
            failures.as_mut_ptr(),
            failures.len(),
            &mut failure_count,
        )
    };

    assert_eq!(rc, SIMKERN_ERR_PARTIAL);
    assert!((out[0] - 0.08712911517429056).abs() < 1e-6);
    assert_eq!(out[1], 0.0);
    assert!(out[2].is_nan());
    assert_eq!(failure_count, 1);
    assert_eq!(
        failures[0],
        SimkernRowFailure {
            row: 2,
            reason: ReasonCode::DegenerateInput as i32,
        }
    );
}

#[test]
fn test_batch_all_rows_succeed() {
    let rows = [1.0f64, 2.0, 3.0, 4.0];
    let target = [1.0f64, 2.0];
    let batch = float_batch(Metric::SqEuclidean, ElementType::F64, &rows, 2, &target);
    let config = SimkernBatchConfig {
        parallel_threshold: 1,
        ..simkern_batch_config_default()
    };

    let mut out = [0.0f64; 2];
    let mut failure_count = 99usize;
    let rc = unsafe {
        simkern_batch(
            &batch,
            &config,
            out.as_mut_ptr(),
            2,
            ptr::null_mut(),
            ptr::null_mut(),
            0,
            &mut failure_count,
        )
    };
    assert_eq!(rc, SIMKERN_OK);
    assert_eq!(out, [0.0, 8.0]);
    assert_eq!(failure_count, 0);
}

#[test]
fn test_batch_failure_count_exceeds_capacity() {
    let rows = [0.0f64; 8];
    let target = [1.0f64, 1.0];
    let batch = float_batch(Metric::Cos, ElementType::F64, &rows, 2, &target);
    let config = SimkernBatchConfig {
        null_value: -1.0,
        ..simkern_batch_config_default()
    };

    let mut out = [0.0f64; 4];
    let mut failures = [SimkernRowFailure::default(); 2];
    let mut failure_count = 0usize;
    let rc = unsafe {
        simkern_batch(
            &batch,
            &config,
            out.as_mut_ptr(),
            4,
            ptr::null_mut(),
            failures.as_mut_ptr(),
            2,
            &mut failure_count,
        )
    };
    assert_eq!(rc, SIMKERN_ERR_PARTIAL);
    assert_eq!(out, [-1.0; 4]);
    assert_eq!(failure_count, 4);
    assert_eq!(failures[0].row, 0);
    assert_eq!(failures[1].row, 1);
}

#[test]
fn test_batch_bitsets_with_validity() {
    // Three 2-byte rows, padded to a 4-byte stride
    let rows = [
        0xffu8, 0x00, 0xaa, 0xaa, //
        0x0f, 0x00, 0xaa, 0xaa, //
        0xf0, 0x0f, 0xaa, 0xaa,
    ];
    let target = [0xffu8, 0x00];
    let validity = [0b101u8];
    let batch = SimkernBatch {
        metric: Metric::Jaccard as i32,
        element: ElementType::U8 as i32,
        rows: rows.as_ptr() as *const c_void,
        row_width: 2,
        row_stride: 4,
        row_count: 3,
        target: target.as_ptr() as *const c_void,
        target_len: 2,
        validity: validity.as_ptr(),
    };

    let mut out = [0.0f64; 3];
    let mut out_validity = [0xffu8];
    let rc = unsafe {
        simkern_batch(
            &batch,
            ptr::null(),
            out.as_mut_ptr(),
            3,
            out_validity.as_mut_ptr(),
            ptr::null_mut(),
            0,
            ptr::null_mut(),
        )
    };
    assert_eq!(rc, SIMKERN_OK);
    assert_eq!(out[0], 1.0);
    assert!(out[1].is_nan());
    // {4..8} ∩ {0..8} over {0..8} ∪ {8..12}
    assert_eq!(out[2], 4.0 / 12.0);
    assert_eq!(out_validity[0], 0b101);
}

#[test]
fn test_batch_argument_errors_write_nothing() {
    let rows = [1.0f32, 2.0, 3.0, 4.0];
    let target = [1.0f32, 2.0];
    let mut out = [5.0f64; 2];
    let mut failure_count = 7usize;

    let mut run = |batch: &SimkernBatch, out_len: usize| unsafe {
        simkern_batch(
            batch,
            ptr::null(),
            out.as_mut_ptr(),
            out_len,
            ptr::null_mut(),
            ptr::null_mut(),
            0,
            &mut failure_count,
        )
    };

    let good = float_batch(Metric::Cos, ElementType::F32, &rows, 2, &target);
    assert_eq!(run(&good, 3), SIMKERN_ERR_INVALID_ARGUMENT);

    let wrong_width = SimkernBatch { row_width: 1, ..good };
    assert_eq!(run(&wrong_width, 2), SIMKERN_ERR_LENGTH_MISMATCH);

    let hamming_over_floats = SimkernBatch {
        metric: Metric::Hamming as i32,
        ..good
    };
    assert_eq!(run(&hamming_over_floats, 2), SIMKERN_ERR_UNSUPPORTED_WIDTH);

    let odd_stride = SimkernBatch { row_stride: 9, ..good };
    assert_eq!(run(&odd_stride, 2), SIMKERN_ERR_UNSUPPORTED_WIDTH);

    let unknown_metric = SimkernBatch { metric: 17, ..good };
    assert_eq!(run(&unknown_metric, 2), SIMKERN_ERR_INVALID_ARGUMENT);

    let null_rows = SimkernBatch {
        rows: ptr::null(),
        ..good
    };
    assert_eq!(run(&null_rows, 2), SIMKERN_ERR_NULL_POINTER);

    assert_eq!(out, [5.0; 2]);
    assert_eq!(failure_count, 7);

    let rc = unsafe {
        simkern_batch(
            ptr::null(),
            ptr::null(),
            ptr::null_mut(),
            0,
            ptr::null_mut(),
            ptr::null_mut(),
            0,
            ptr::null_mut(),
        )
    };
    assert_eq!(rc, SIMKERN_ERR_NULL_POINTER);
}

#[test]
fn test_single_pair_kernels_agree_with_rust_api() {
    let p = [0.1f64, 0.2, 0.3, 0.4, 0.0, 0.5];
    let q = [0.3f64, 0.1, 0.1, 0.2, 0.2, 0.1];
    let mut out = 0.0;

    let rc = unsafe { simkern_jensenshannon_f64(p.as_ptr(), 6, q.as_ptr(), 6, &mut out) };
    assert_eq!(rc, SIMKERN_OK);
    assert_eq!(out, simkern::jensenshannon(&p, &q).unwrap());

    let rc = unsafe { simkern_kullbackleibler_f64(p.as_ptr(), 6, q.as_ptr(), 6, &mut out) };
    assert_eq!(rc, SIMKERN_OK);
    assert_eq!(out, simkern::kullbackleibler(&p, &q).unwrap());

    let a = [1.0f32, -2.0, 3.0];
    let rc = unsafe { simkern_cos_f32(a.as_ptr(), 3, a.as_ptr(), 3, &mut out) };
    assert_eq!(rc, SIMKERN_OK);
    assert_eq!(out, 0.0);

    let zeros = [0.0f32; 3];
    out = 3.0;
    let rc = unsafe { simkern_cos_f32(zeros.as_ptr(), 3, a.as_ptr(), 3, &mut out) };
    assert_eq!(rc, SIMKERN_ERR_DEGENERATE_INPUT);
    assert_eq!(out, 3.0);

    let neg = [0.5f32, -0.5, 1.0];
    let rc = unsafe { simkern_jensenshannon_f32(neg.as_ptr(), 3, a.as_ptr(), 3, &mut out) };
    assert_eq!(rc, SIMKERN_ERR_INVALID_MASS);
}
