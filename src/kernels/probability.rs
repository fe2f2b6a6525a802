//! Probability kernels: Kullback-Leibler and Jensen-Shannon divergence.
//!
//! Operands are non-negative mass vectors. Each is normalized by its own sum
//! before comparison, so callers may pass raw counts. The wide backends
//! accelerate the normalizing sums; the logarithm pass is scalar on every
//! backend, so backends differ only in the rounding of those sums.
//!
//! Terms with zero mass contribute nothing (`0 · ln(0 / x) = 0`).

use std::f64::consts::LN_2;

use super::Element;
use crate::dispatch::{self, Resolved};
use crate::error::KernelError;

/// Validate masses and return the distribution total.
fn total_mass<T: Element>(path: Resolved, p: &[T]) -> Result<f64, KernelError> {
    if let Some(index) = p.iter().position(|&x| {
        let x = x.to_f64();
        !(x.is_finite() && x >= 0.0)
    }) {
        return Err(KernelError::InvalidMass { index });
    }

    let total = T::sum(path, p);
    if total <= 0.0 {
        return Err(KernelError::DegenerateInput("distribution has zero total mass"));
    }
    if !total.is_finite() {
        return Err(KernelError::DegenerateInput("distribution total overflows"));
    }
    Ok(total)
}

fn check_lengths<T>(p: &[T], q: &[T]) -> Result<(), KernelError> {
    if p.len() != q.len() {
        return Err(KernelError::LengthMismatch {
            left: p.len(),
            right: q.len(),
        });
    }
    Ok(())
}

/// `KL(p̂ ‖ q̂) = Σ p̂_i · ln(p̂_i / q̂_i)` in nats.
///
/// Fails with `Singularity` at the first index where `q` has no mass but
/// `p` does; the divergence is never reported as infinity.
pub fn kullbackleibler<T: Element>(p: &[T], q: &[T]) -> Result<f64, KernelError> {
    kullbackleibler_with(dispatch::select(T::ELEMENT, p.len()), p, q)
}

/// [`kullbackleibler`] on an explicit backend.
pub fn kullbackleibler_with<T: Element>(
    path: Resolved,
    p: &[T],
    q: &[T],
) -> Result<f64, KernelError> {
    check_lengths(p, q)?;
    let p_total = total_mass(path, p)?;
    let q_total = total_mass(path, q)?;
    // ln(p̂/q̂) = ln p - ln q + ln(Q/P); each piece stays finite for any
    // positive finite mass, where the ratio p/q can overflow
    let ln_scale = q_total.ln() - p_total.ln();

    let mut acc = 0.0f64;
    for (index, (&pi, &qi)) in p.iter().zip(q.iter()).enumerate() {
        let pi = pi.to_f64();
        if pi == 0.0 {
            continue;
        }
        let qi = qi.to_f64();
        if qi == 0.0 {
            return Err(KernelError::Singularity { index });
        }
        acc += (pi / p_total) * ((pi.ln() - qi.ln()) + ln_scale);
    }

    // Gibbs' inequality; negative values are rounding noise
    Ok(acc.max(0.0))
}

/// `JS(p, q) = ½·KL(p̂ ‖ m) + ½·KL(q̂ ‖ m)` with `m = (p̂ + q̂) / 2`, in nats.
///
/// Symmetric, finite and bounded by `ln 2`. Returns the divergence itself,
/// not its square root.
pub fn jensenshannon<T: Element>(p: &[T], q: &[T]) -> Result<f64, KernelError> {
    jensenshannon_with(dispatch::select(T::ELEMENT, p.len()), p, q)
}

/// [`jensenshannon`] on an explicit backend.
pub fn jensenshannon_with<T: Element>(
    path: Resolved,
    p: &[T],
    q: &[T],
) -> Result<f64, KernelError> {
    check_lengths(p, q)?;
    let p_total = total_mass(path, p)?;
    let q_total = total_mass(path, q)?;

    let mut acc = 0.0f64;
    for (&pi, &qi) in p.iter().zip(q.iter()) {
        let pi = pi.to_f64() / p_total;
        let qi = qi.to_f64() / q_total;
        let mi = 0.5 * (pi + qi);
        if mi == 0.0 {
            continue;
        }
        // Sum of two terms is order-independent, keeping JS exactly symmetric
        let mut term = 0.0f64;
        if pi > 0.0 {
            term += pi * (pi / mi).ln();
        }
        if qi > 0.0 {
            term += qi * (qi / mi).ln();
        }
        acc += term;
    }

    Ok((0.5 * acc).clamp(0.0, LN_2))
}
