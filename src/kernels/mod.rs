//! Similarity and divergence kernels.
//!
//! Every metric is a pure function of two equal-length operands. The
//! reductions underneath (dot products, squared differences, sums and
//! population counts) come in a portable scalar form and in AVX2 (x86_64)
//! and NEON (aarch64) forms; `crate::dispatch` picks one per call.
//!
//! ## Conventions
//! - `cos` is the cosine *distance* `1 - cos θ`; zero-magnitude operands are
//!   rejected with `DegenerateInput`.
//! - Accumulation is always f64, also for f32 operands.
//! - Divergences normalize each operand by its own sum; `kullbackleibler`
//!   reports `Singularity` instead of returning infinity.
//! - Bitsets are LSB-first; an empty Jaccard union yields 1.0.
//!
//! ## Usage
//! ```ignore
//! use simkern::kernels::{spatial, binary};
//!
//! let d = spatial::cos(&[0.0f32, 1.0, 2.0], &[1.0, 1.0, 2.0])?;
//! let h = binary::hamming(&[0b1010_1010], &[0b0101_0101])?;
//! ```

pub mod binary;
pub mod probability;
pub mod scalar;
pub mod spatial;
pub mod types;

#[cfg(target_arch = "x86_64")]
mod avx2;
#[cfg(target_arch = "aarch64")]
mod neon;

pub use types::{
    Backend, CpuCapabilities, ElementType, Family, Metric, AVX2_BYTE_LANES, AVX2_F32_LANES,
    AVX2_F64_LANES, NEON_BYTE_LANES, NEON_F32_LANES, NEON_F64_LANES,
};

use crate::dispatch::Resolved;
use crate::error::KernelError;

/// Partial sums for cosine: `a·b`, `a·a`, `b·b`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Dot3 {
    pub ab: f64,
    pub aa: f64,
    pub bb: f64,
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Floating-point element with scalar and wide reductions.
pub trait Element: Copy + Send + Sync + sealed::Sealed + 'static {
    const ELEMENT: ElementType;

    fn to_f64(self) -> f64;

    /// `(a·b, a·a, b·b)` accumulated in f64.
    fn dot3(path: Resolved, a: &[Self], b: &[Self]) -> Dot3;

    /// `Σ (a_i - b_i)²` accumulated in f64.
    fn sqdiff(path: Resolved, a: &[Self], b: &[Self]) -> f64;

    /// `Σ a_i` accumulated in f64.
    fn sum(path: Resolved, a: &[Self]) -> f64;
}

macro_rules! impl_element {
    ($t:ty, $elem:expr, $dot3:ident, $sqdiff:ident, $sum:ident) => {
        impl Element for $t {
            const ELEMENT: ElementType = $elem;

            #[inline(always)]
            fn to_f64(self) -> f64 {
                self as f64
            }

            fn dot3(path: Resolved, a: &[Self], b: &[Self]) -> Dot3 {
                debug_assert_eq!(a.len(), b.len());
                match path.backend() {
                    // SAFETY: a Resolved backend is supported by this CPU.
                    #[cfg(target_arch = "x86_64")]
                    Backend::Avx2 => unsafe { avx2::$dot3(a, b) },
                    #[cfg(target_arch = "aarch64")]
                    Backend::Neon => unsafe { neon::$dot3(a, b) },
                    _ => scalar::dot3(a, b),
                }
            }

            fn sqdiff(path: Resolved, a: &[Self], b: &[Self]) -> f64 {
                debug_assert_eq!(a.len(), b.len());
                match path.backend() {
                    #[cfg(target_arch = "x86_64")]
                    Backend::Avx2 => unsafe { avx2::$sqdiff(a, b) },
                    #[cfg(target_arch = "aarch64")]
                    Backend::Neon => unsafe { neon::$sqdiff(a, b) },
                    _ => scalar::sqdiff(a, b),
                }
            }

            fn sum(path: Resolved, a: &[Self]) -> f64 {
                match path.backend() {
                    #[cfg(target_arch = "x86_64")]
                    Backend::Avx2 => unsafe { avx2::$sum(a) },
                    #[cfg(target_arch = "aarch64")]
                    Backend::Neon => unsafe { neon::$sum(a) },
                    _ => scalar::sum(a),
                }
            }
        }
    };
}

impl_element!(f32, ElementType::F32, dot3_f32, sqdiff_f32, sum_f32);
impl_element!(f64, ElementType::F64, dot3_f64, sqdiff_f64, sum_f64);

/// Population counts over whole bytes.
pub(crate) fn popcount_xor(path: Resolved, a: &[u8], b: &[u8]) -> u64 {
    debug_assert_eq!(a.len(), b.len());
    match path.backend() {
        // SAFETY: a Resolved backend is supported by this CPU.
        #[cfg(target_arch = "x86_64")]
        Backend::Avx2 => unsafe { avx2::popcount_xor(a, b) },
        #[cfg(target_arch = "aarch64")]
        Backend::Neon => unsafe { neon::popcount_xor(a, b) },
        _ => scalar::popcount_xor(a, b),
    }
}

/// `(popcount(a & b), popcount(a | b))` over whole bytes.
pub(crate) fn popcount_and_or(path: Resolved, a: &[u8], b: &[u8]) -> (u64, u64) {
    debug_assert_eq!(a.len(), b.len());
    match path.backend() {
        #[cfg(target_arch = "x86_64")]
        Backend::Avx2 => unsafe { avx2::popcount_and_or(a, b) },
        #[cfg(target_arch = "aarch64")]
        Backend::Neon => unsafe { neon::popcount_and_or(a, b) },
        _ => scalar::popcount_and_or(a, b),
    }
}

/// Operand type a batch can be evaluated over.
///
/// `evaluate` receives the comparison target first and the row second, so
/// asymmetric metrics compute `metric(target, row)`.
pub trait Operand: Copy + Send + Sync + 'static {
    const ELEMENT: ElementType;

    fn evaluate(metric: Metric, path: Resolved, target: &[Self], row: &[Self])
        -> Result<f64, KernelError>;
}

macro_rules! impl_float_operand {
    ($($t:ty),*) => {
        $(
            impl Operand for $t {
                const ELEMENT: ElementType = <$t as Element>::ELEMENT;

                fn evaluate(
                    metric: Metric,
                    path: Resolved,
                    target: &[Self],
                    row: &[Self],
                ) -> Result<f64, KernelError> {
                    match metric {
                        Metric::Cos => spatial::cos_with(path, target, row),
                        Metric::SqEuclidean => spatial::sqeuclidean_with(path, target, row),
                        Metric::KullbackLeibler => {
                            probability::kullbackleibler_with(path, target, row)
                        }
                        Metric::JensenShannon => probability::jensenshannon_with(path, target, row),
                        Metric::Hamming | Metric::Jaccard => Err(KernelError::UnsupportedWidth {
                            metric,
                            element: <Self as Operand>::ELEMENT,
                        }),
                    }
                }
            }
        )*
    };
}

impl_float_operand!(f32, f64);

impl Operand for u8 {
    const ELEMENT: ElementType = ElementType::U8;

    fn evaluate(
        metric: Metric,
        path: Resolved,
        target: &[Self],
        row: &[Self],
    ) -> Result<f64, KernelError> {
        let bits = target.len() * 8;
        match metric {
            Metric::Hamming => binary::hamming_with(path, target, row, bits).map(|d| d as f64),
            Metric::Jaccard => binary::jaccard_with(path, target, row, bits),
            _ => Err(KernelError::UnsupportedWidth {
                metric,
                element: ElementType::U8,
            }),
        }
    }
}

/// Evaluate `metric` on one pair with automatic backend selection.
pub fn evaluate<T: Operand>(metric: Metric, a: &[T], b: &[T]) -> Result<f64, KernelError> {
    let path = crate::dispatch::select(T::ELEMENT, a.len());
    T::evaluate(metric, path, a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_routes_by_metric() {
        let a = [0.0f32, 1.0, 2.0];
        let b = [1.0f32, 1.0, 2.0];
        let d = evaluate(Metric::Cos, &a, &b).unwrap();
        assert!((d - (1.0 - 5.0 / 30.0f64.sqrt())).abs() < 1e-12);
        assert_eq!(evaluate(Metric::SqEuclidean, &a, &b).unwrap(), 1.0);
    }

    #[test]
    fn test_binary_metric_rejects_floats() {
        let a = [1.0f64, 0.0];
        assert_eq!(
            evaluate(Metric::Hamming, &a, &a),
            Err(KernelError::UnsupportedWidth {
                metric: Metric::Hamming,
                element: ElementType::F64,
            })
        );
        let b = [1.0f32, 0.0];
        assert_eq!(
            evaluate(Metric::Jaccard, &b, &b),
            Err(KernelError::UnsupportedWidth {
                metric: Metric::Jaccard,
                element: ElementType::F32,
            })
        );
    }

    #[test]
    fn test_float_metric_rejects_bytes() {
        let a = [0xffu8];
        assert!(matches!(
            evaluate(Metric::Cos, &a, &a),
            Err(KernelError::UnsupportedWidth { .. })
        ));
        assert_eq!(evaluate(Metric::Hamming, &[0x0fu8], &[0xf0u8]).unwrap(), 8.0);
    }
}
