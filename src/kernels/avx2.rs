//! AVX2 + FMA reductions for x86_64.
//!
//! f32 lanes are widened to f64 before accumulation so every backend rounds
//! the same way up to summation order. Each loop consumes whole 256-bit
//! groups and hands the tail to the scalar loop, so no load ever reaches
//! past the end of an operand.
//!
//! All functions require AVX2 and FMA; callers obtain that guarantee from
//! `dispatch::Resolved`.

use std::arch::x86_64::*;

use super::types::{AVX2_BYTE_LANES, AVX2_F32_LANES, AVX2_F64_LANES};
use super::{scalar, Dot3};

/// Horizontal sum of four f64 lanes.
#[inline]
#[target_feature(enable = "avx2,fma")]
unsafe fn hsum_pd(v: __m256d) -> f64 {
    let lo = _mm256_castpd256_pd128(v);
    let hi = _mm256_extractf128_pd(v, 1);
    let pair = _mm_add_pd(lo, hi);
    let high = _mm_unpackhi_pd(pair, pair);
    _mm_cvtsd_f64(_mm_add_sd(pair, high))
}

/// Widen eight f32 lanes into two f64 vectors (low half, high half).
#[inline]
#[target_feature(enable = "avx2,fma")]
unsafe fn widen_ps(v: __m256) -> (__m256d, __m256d) {
    (
        _mm256_cvtps_pd(_mm256_castps256_ps128(v)),
        _mm256_cvtps_pd(_mm256_extractf128_ps(v, 1)),
    )
}

#[target_feature(enable = "avx2,fma")]
pub unsafe fn dot3_f32(a: &[f32], b: &[f32]) -> Dot3 {
    let n = a.len().min(b.len());
    let mut ab = _mm256_setzero_pd();
    let mut aa = _mm256_setzero_pd();
    let mut bb = _mm256_setzero_pd();

    let mut i = 0;
    while i + AVX2_F32_LANES <= n {
        let (a_lo, a_hi) = widen_ps(_mm256_loadu_ps(a.as_ptr().add(i)));
        let (b_lo, b_hi) = widen_ps(_mm256_loadu_ps(b.as_ptr().add(i)));

        ab = _mm256_fmadd_pd(a_lo, b_lo, ab);
        ab = _mm256_fmadd_pd(a_hi, b_hi, ab);
        aa = _mm256_fmadd_pd(a_lo, a_lo, aa);
        aa = _mm256_fmadd_pd(a_hi, a_hi, aa);
        bb = _mm256_fmadd_pd(b_lo, b_lo, bb);
        bb = _mm256_fmadd_pd(b_hi, b_hi, bb);

        i += AVX2_F32_LANES;
    }

    let tail = scalar::dot3(&a[i..n], &b[i..n]);
    Dot3 {
        ab: hsum_pd(ab) + tail.ab,
        aa: hsum_pd(aa) + tail.aa,
        bb: hsum_pd(bb) + tail.bb,
    }
}

#[target_feature(enable = "avx2,fma")]
pub unsafe fn dot3_f64(a: &[f64], b: &[f64]) -> Dot3 {
    let n = a.len().min(b.len());
    let mut ab = _mm256_setzero_pd();
    let mut aa = _mm256_setzero_pd();
    let mut bb = _mm256_setzero_pd();

    let mut i = 0;
    while i + AVX2_F64_LANES <= n {
        let av = _mm256_loadu_pd(a.as_ptr().add(i));
        let bv = _mm256_loadu_pd(b.as_ptr().add(i));
        ab = _mm256_fmadd_pd(av, bv, ab);
        aa = _mm256_fmadd_pd(av, av, aa);
        bb = _mm256_fmadd_pd(bv, bv, bb);
        i += AVX2_F64_LANES;
    }

    let tail = scalar::dot3(&a[i..n], &b[i..n]);
    Dot3 {
        ab: hsum_pd(ab) + tail.ab,
        aa: hsum_pd(aa) + tail.aa,
        bb: hsum_pd(bb) + tail.bb,
    }
}

#[target_feature(enable = "avx2,fma")]
pub unsafe fn sqdiff_f32(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    // Two accumulators to hide FMA latency
    let mut acc0 = _mm256_setzero_pd();
    let mut acc1 = _mm256_setzero_pd();

    let mut i = 0;
    while i + AVX2_F32_LANES <= n {
        let (a_lo, a_hi) = widen_ps(_mm256_loadu_ps(a.as_ptr().add(i)));
        let (b_lo, b_hi) = widen_ps(_mm256_loadu_ps(b.as_ptr().add(i)));
        let d_lo = _mm256_sub_pd(a_lo, b_lo);
        let d_hi = _mm256_sub_pd(a_hi, b_hi);
        acc0 = _mm256_fmadd_pd(d_lo, d_lo, acc0);
        acc1 = _mm256_fmadd_pd(d_hi, d_hi, acc1);
        i += AVX2_F32_LANES;
    }

    hsum_pd(_mm256_add_pd(acc0, acc1)) + scalar::sqdiff(&a[i..n], &b[i..n])
}

#[target_feature(enable = "avx2,fma")]
pub unsafe fn sqdiff_f64(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    let mut acc = _mm256_setzero_pd();

    let mut i = 0;
    while i + AVX2_F64_LANES <= n {
        let d = _mm256_sub_pd(
            _mm256_loadu_pd(a.as_ptr().add(i)),
            _mm256_loadu_pd(b.as_ptr().add(i)),
        );
        acc = _mm256_fmadd_pd(d, d, acc);
        i += AVX2_F64_LANES;
    }

    hsum_pd(acc) + scalar::sqdiff(&a[i..n], &b[i..n])
}

#[target_feature(enable = "avx2,fma")]
pub unsafe fn sum_f32(a: &[f32]) -> f64 {
    let n = a.len();
    let mut acc = _mm256_setzero_pd();

    let mut i = 0;
    while i + AVX2_F32_LANES <= n {
        let (lo, hi) = widen_ps(_mm256_loadu_ps(a.as_ptr().add(i)));
        acc = _mm256_add_pd(acc, _mm256_add_pd(lo, hi));
        i += AVX2_F32_LANES;
    }

    hsum_pd(acc) + scalar::sum(&a[i..])
}

#[target_feature(enable = "avx2,fma")]
pub unsafe fn sum_f64(a: &[f64]) -> f64 {
    let n = a.len();
    let mut acc = _mm256_setzero_pd();

    let mut i = 0;
    while i + AVX2_F64_LANES <= n {
        acc = _mm256_add_pd(acc, _mm256_loadu_pd(a.as_ptr().add(i)));
        i += AVX2_F64_LANES;
    }

    hsum_pd(acc) + scalar::sum(&a[i..])
}

/// Per-byte population count via a nibble lookup table, summed into four
/// u64 lanes with `sad_epu8`.
#[inline]
#[target_feature(enable = "avx2,fma")]
unsafe fn popcount_epi64(v: __m256i) -> __m256i {
    let lookup = _mm256_setr_epi8(
        0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4, //
        0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4,
    );
    let low_mask = _mm256_set1_epi8(0x0f);
    let lo = _mm256_and_si256(v, low_mask);
    let hi = _mm256_and_si256(_mm256_srli_epi16(v, 4), low_mask);
    let counts = _mm256_add_epi8(
        _mm256_shuffle_epi8(lookup, lo),
        _mm256_shuffle_epi8(lookup, hi),
    );
    _mm256_sad_epu8(counts, _mm256_setzero_si256())
}

#[inline]
#[target_feature(enable = "avx2,fma")]
unsafe fn hsum_epi64(v: __m256i) -> u64 {
    let mut lanes = [0u64; 4];
    _mm256_storeu_si256(lanes.as_mut_ptr() as *mut __m256i, v);
    lanes.iter().sum()
}

#[target_feature(enable = "avx2,fma")]
pub unsafe fn popcount_xor(a: &[u8], b: &[u8]) -> u64 {
    let n = a.len().min(b.len());
    let mut acc = _mm256_setzero_si256();

    let mut i = 0;
    while i + AVX2_BYTE_LANES <= n {
        let av = _mm256_loadu_si256(a.as_ptr().add(i) as *const __m256i);
        let bv = _mm256_loadu_si256(b.as_ptr().add(i) as *const __m256i);
        acc = _mm256_add_epi64(acc, popcount_epi64(_mm256_xor_si256(av, bv)));
        i += AVX2_BYTE_LANES;
    }

    hsum_epi64(acc) + scalar::popcount_xor(&a[i..n], &b[i..n])
}

#[target_feature(enable = "avx2,fma")]
pub unsafe fn popcount_and_or(a: &[u8], b: &[u8]) -> (u64, u64) {
    let n = a.len().min(b.len());
    let mut inter = _mm256_setzero_si256();
    let mut union = _mm256_setzero_si256();

    let mut i = 0;
    while i + AVX2_BYTE_LANES <= n {
        let av = _mm256_loadu_si256(a.as_ptr().add(i) as *const __m256i);
        let bv = _mm256_loadu_si256(b.as_ptr().add(i) as *const __m256i);
        inter = _mm256_add_epi64(inter, popcount_epi64(_mm256_and_si256(av, bv)));
        union = _mm256_add_epi64(union, popcount_epi64(_mm256_or_si256(av, bv)));
        i += AVX2_BYTE_LANES;
    }

    let (tail_inter, tail_union) = scalar::popcount_and_or(&a[i..n], &b[i..n]);
    (hsum_epi64(inter) + tail_inter, hsum_epi64(union) + tail_union)
}
