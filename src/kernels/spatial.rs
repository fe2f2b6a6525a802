//! Spatial kernels: cosine distance and squared Euclidean distance.

use super::{Dot3, Element};
use crate::dispatch::{self, Resolved};
use crate::error::KernelError;

#[inline]
fn check_lengths<T>(a: &[T], b: &[T]) -> Result<(), KernelError> {
    if a.len() != b.len() {
        return Err(KernelError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}

/// Cosine distance `1 - (a·b) / sqrt(‖a‖²·‖b‖²)`, in `[0, 2]`.
///
/// Identical non-zero operands give exactly `0.0`, including magnitudes
/// whose squared norms multiply out of the normal f64 range. An operand with
/// zero magnitude (all zeros, or empty) is rejected with `DegenerateInput`,
/// as is one whose squared norm overflows f64 (elements beyond roughly
/// `1e154`) or contains NaN.
pub fn cos<T: Element>(a: &[T], b: &[T]) -> Result<f64, KernelError> {
    cos_with(dispatch::select(T::ELEMENT, a.len()), a, b)
}

/// [`cos`] on an explicit backend.
pub fn cos_with<T: Element>(path: Resolved, a: &[T], b: &[T]) -> Result<f64, KernelError> {
    check_lengths(a, b)?;
    cosine_distance(T::dot3(path, a, b))
}

/// `2^exp` for exponents inside the normal range.
#[inline]
fn pow2(exp: i32) -> f64 {
    f64::from_bits(((1023 + exp) as u64) << 52)
}

/// Scale a squared norm by an even power of two into `[2^-500, 2^500]`.
/// Returns the scaled value and half the exponent applied.
#[inline]
fn rescale(x: f64) -> (f64, i32) {
    if x < pow2(-500) {
        (x * pow2(600), 300)
    } else if x > pow2(500) {
        (x * pow2(-600), -300)
    } else {
        (x, 0)
    }
}

fn cosine_distance(d: Dot3) -> Result<f64, KernelError> {
    if d.aa == 0.0 || d.bb == 0.0 {
        return Err(KernelError::DegenerateInput("zero-magnitude vector in cosine"));
    }
    if !(d.aa.is_finite() && d.bb.is_finite() && d.ab.is_finite()) {
        return Err(KernelError::DegenerateInput("vector magnitude overflows in cosine"));
    }

    // Power-of-two scaling is exact, and keeps aa·bb normal so that
    // sqrt(x * x) == x holds and self-distance stays at zero
    let (aa, ha) = rescale(d.aa);
    let (bb, hb) = rescale(d.bb);
    let ab = d.ab * pow2(ha + hb);

    let distance = 1.0 - ab / (aa * bb).sqrt();
    Ok(distance.clamp(0.0, 2.0))
}

/// Squared Euclidean distance `Σ (a_i - b_i)²`. Empty operands give `0.0`.
pub fn sqeuclidean<T: Element>(a: &[T], b: &[T]) -> Result<f64, KernelError> {
    sqeuclidean_with(dispatch::select(T::ELEMENT, a.len()), a, b)
}

/// [`sqeuclidean`] on an explicit backend.
pub fn sqeuclidean_with<T: Element>(path: Resolved, a: &[T], b: &[T]) -> Result<f64, KernelError> {
    check_lengths(a, b)?;
    Ok(T::sqdiff(path, a, b))
}
