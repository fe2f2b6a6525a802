//! ARM NEON reductions for aarch64.
//!
//! Mirrors the AVX2 loops with 128-bit groups: f32 lanes are widened with
//! `vcvt_f64_f32` / `vcvt_high_f64_f32` and accumulated with `vfmaq_f64`;
//! bit counts use `vcntq_u8`. Tails go to the scalar loop.

use std::arch::aarch64::*;

use super::types::{NEON_BYTE_LANES, NEON_F32_LANES, NEON_F64_LANES};
use super::{scalar, Dot3};

#[target_feature(enable = "neon")]
pub unsafe fn dot3_f32(a: &[f32], b: &[f32]) -> Dot3 {
    let n = a.len().min(b.len());
    let mut ab: float64x2_t = vdupq_n_f64(0.0);
    let mut aa: float64x2_t = vdupq_n_f64(0.0);
    let mut bb: float64x2_t = vdupq_n_f64(0.0);

    let mut i = 0;
    while i + NEON_F32_LANES <= n {
        let av: float32x4_t = vld1q_f32(a.as_ptr().add(i));
        let bv: float32x4_t = vld1q_f32(b.as_ptr().add(i));

        let a_lo = vcvt_f64_f32(vget_low_f32(av));
        let a_hi = vcvt_high_f64_f32(av);
        let b_lo = vcvt_f64_f32(vget_low_f32(bv));
        let b_hi = vcvt_high_f64_f32(bv);

        ab = vfmaq_f64(ab, a_lo, b_lo);
        ab = vfmaq_f64(ab, a_hi, b_hi);
        aa = vfmaq_f64(aa, a_lo, a_lo);
        aa = vfmaq_f64(aa, a_hi, a_hi);
        bb = vfmaq_f64(bb, b_lo, b_lo);
        bb = vfmaq_f64(bb, b_hi, b_hi);

        i += NEON_F32_LANES;
    }

    let tail = scalar::dot3(&a[i..n], &b[i..n]);
    Dot3 {
        ab: vaddvq_f64(ab) + tail.ab,
        aa: vaddvq_f64(aa) + tail.aa,
        bb: vaddvq_f64(bb) + tail.bb,
    }
}

#[target_feature(enable = "neon")]
pub unsafe fn dot3_f64(a: &[f64], b: &[f64]) -> Dot3 {
    let n = a.len().min(b.len());
    let mut ab = vdupq_n_f64(0.0);
    let mut aa = vdupq_n_f64(0.0);
    let mut bb = vdupq_n_f64(0.0);

    let mut i = 0;
    while i + NEON_F64_LANES <= n {
        let av = vld1q_f64(a.as_ptr().add(i));
        let bv = vld1q_f64(b.as_ptr().add(i));
        ab = vfmaq_f64(ab, av, bv);
        aa = vfmaq_f64(aa, av, av);
        bb = vfmaq_f64(bb, bv, bv);
        i += NEON_F64_LANES;
    }

    let tail = scalar::dot3(&a[i..n], &b[i..n]);
    Dot3 {
        ab: vaddvq_f64(ab) + tail.ab,
        aa: vaddvq_f64(aa) + tail.aa,
        bb: vaddvq_f64(bb) + tail.bb,
    }
}

#[target_feature(enable = "neon")]
pub unsafe fn sqdiff_f32(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    let mut acc0 = vdupq_n_f64(0.0);
    let mut acc1 = vdupq_n_f64(0.0);

    let mut i = 0;
    while i + NEON_F32_LANES <= n {
        let av = vld1q_f32(a.as_ptr().add(i));
        let bv = vld1q_f32(b.as_ptr().add(i));
        let d_lo = vsubq_f64(vcvt_f64_f32(vget_low_f32(av)), vcvt_f64_f32(vget_low_f32(bv)));
        let d_hi = vsubq_f64(vcvt_high_f64_f32(av), vcvt_high_f64_f32(bv));
        acc0 = vfmaq_f64(acc0, d_lo, d_lo);
        acc1 = vfmaq_f64(acc1, d_hi, d_hi);
        i += NEON_F32_LANES;
    }

    vaddvq_f64(vaddq_f64(acc0, acc1)) + scalar::sqdiff(&a[i..n], &b[i..n])
}

#[target_feature(enable = "neon")]
pub unsafe fn sqdiff_f64(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    let mut acc = vdupq_n_f64(0.0);

    let mut i = 0;
    while i + NEON_F64_LANES <= n {
        let d = vsubq_f64(vld1q_f64(a.as_ptr().add(i)), vld1q_f64(b.as_ptr().add(i)));
        acc = vfmaq_f64(acc, d, d);
        i += NEON_F64_LANES;
    }

    vaddvq_f64(acc) + scalar::sqdiff(&a[i..n], &b[i..n])
}

#[target_feature(enable = "neon")]
pub unsafe fn sum_f32(a: &[f32]) -> f64 {
    let n = a.len();
    let mut acc = vdupq_n_f64(0.0);

    let mut i = 0;
    while i + NEON_F32_LANES <= n {
        let v = vld1q_f32(a.as_ptr().add(i));
        acc = vaddq_f64(acc, vaddq_f64(vcvt_f64_f32(vget_low_f32(v)), vcvt_high_f64_f32(v)));
        i += NEON_F32_LANES;
    }

    vaddvq_f64(acc) + scalar::sum(&a[i..])
}

#[target_feature(enable = "neon")]
pub unsafe fn sum_f64(a: &[f64]) -> f64 {
    let n = a.len();
    let mut acc = vdupq_n_f64(0.0);

    let mut i = 0;
    while i + NEON_F64_LANES <= n {
        acc = vaddq_f64(acc, vld1q_f64(a.as_ptr().add(i)));
        i += NEON_F64_LANES;
    }

    vaddvq_f64(acc) + scalar::sum(&a[i..])
}

#[target_feature(enable = "neon")]
pub unsafe fn popcount_xor(a: &[u8], b: &[u8]) -> u64 {
    let n = a.len().min(b.len());
    let mut total = 0u64;

    let mut i = 0;
    while i + NEON_BYTE_LANES <= n {
        let x = veorq_u8(vld1q_u8(a.as_ptr().add(i)), vld1q_u8(b.as_ptr().add(i)));
        // At most 128 set bits per group, fits the u16 horizontal add
        total += vaddlvq_u8(vcntq_u8(x)) as u64;
        i += NEON_BYTE_LANES;
    }

    total + scalar::popcount_xor(&a[i..n], &b[i..n])
}

#[target_feature(enable = "neon")]
pub unsafe fn popcount_and_or(a: &[u8], b: &[u8]) -> (u64, u64) {
    let n = a.len().min(b.len());
    let mut inter = 0u64;
    let mut union = 0u64;

    let mut i = 0;
    while i + NEON_BYTE_LANES <= n {
        let av = vld1q_u8(a.as_ptr().add(i));
        let bv = vld1q_u8(b.as_ptr().add(i));
        inter += vaddlvq_u8(vcntq_u8(vandq_u8(av, bv))) as u64;
        union += vaddlvq_u8(vcntq_u8(vorrq_u8(av, bv))) as u64;
        i += NEON_BYTE_LANES;
    }

    let (tail_inter, tail_union) = scalar::popcount_and_or(&a[i..n], &b[i..n]);
    (inter + tail_inter, union + tail_union)
}
