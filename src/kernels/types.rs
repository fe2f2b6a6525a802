//! Kernel type definitions.
//!
//! This module defines the metric selectors, element types, wide-vector group
//! widths and the CPU capability descriptor used for runtime dispatch.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// f32 elements per AVX2 group (one 256-bit register).
pub const AVX2_F32_LANES: usize = 8;
/// f64 elements per AVX2 group.
pub const AVX2_F64_LANES: usize = 4;
/// Bytes per AVX2 group.
pub const AVX2_BYTE_LANES: usize = 32;

/// f32 elements per NEON group (one 128-bit register).
pub const NEON_F32_LANES: usize = 4;
/// f64 elements per NEON group.
pub const NEON_F64_LANES: usize = 2;
/// Bytes per NEON group.
pub const NEON_BYTE_LANES: usize = 16;

/// One of the six supported metrics.
///
/// Discriminants are the selector codes of the C interface.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Cosine distance, `1 - cos(a, b)`.
    Cos = 0,
    /// Squared Euclidean distance.
    SqEuclidean = 1,
    /// Kullback-Leibler divergence.
    KullbackLeibler = 2,
    /// Jensen-Shannon divergence.
    JensenShannon = 3,
    /// Hamming distance over packed bits.
    Hamming = 4,
    /// Jaccard index over packed bits.
    Jaccard = 5,
}

/// Metric grouping, matching the expression namespaces hosts expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Spatial,
    Probability,
    Binary,
}

impl Family {
    pub fn name(&self) -> &'static str {
        match self {
            Family::Spatial => "spatial",
            Family::Probability => "prob",
            Family::Binary => "binary",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Cos,
        Metric::SqEuclidean,
        Metric::KullbackLeibler,
        Metric::JensenShannon,
        Metric::Hamming,
        Metric::Jaccard,
    ];

    /// Decode a C selector code.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| *m as i32 == code)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Cos => "cos",
            Metric::SqEuclidean => "sqeuclidean",
            Metric::KullbackLeibler => "kullbackleibler",
            Metric::JensenShannon => "jensenshannon",
            Metric::Hamming => "hamming",
            Metric::Jaccard => "jaccard",
        }
    }

    pub fn family(&self) -> Family {
        match self {
            Metric::Cos | Metric::SqEuclidean => Family::Spatial,
            Metric::KullbackLeibler | Metric::JensenShannon => Family::Probability,
            Metric::Hamming | Metric::Jaccard => Family::Binary,
        }
    }

    /// Whether the metric accepts operands of the given element type.
    pub fn accepts(&self, element: ElementType) -> bool {
        match self.family() {
            Family::Binary => element == ElementType::U8,
            Family::Spatial | Family::Probability => element != ElementType::U8,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| format!("unknown metric '{}'", s))
    }
}

/// Operand element type.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    F32 = 0,
    F64 = 1,
    /// Packed bits, eight per byte.
    U8 = 2,
}

impl ElementType {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ElementType::F32),
            1 => Some(ElementType::F64),
            2 => Some(ElementType::U8),
            _ => None,
        }
    }

    /// Storage width in bytes.
    pub fn width(&self) -> usize {
        match self {
            ElementType::F32 => 4,
            ElementType::F64 => 8,
            ElementType::U8 => 1,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
            ElementType::U8 => "u8",
        })
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "f32" => Ok(ElementType::F32),
            "f64" => Ok(ElementType::F64),
            "u8" => Ok(ElementType::U8),
            _ => Err(format!("unknown element type '{}'", s)),
        }
    }
}

/// Implementation strategy for a kernel call.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Portable loop, available everywhere.
    Scalar = 0,
    /// x86_64 AVX2 + FMA.
    Avx2 = 1,
    /// aarch64 Advanced SIMD.
    Neon = 2,
}

impl Backend {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Backend::Scalar),
            1 => Some(Backend::Avx2),
            2 => Some(Backend::Neon),
            _ => None,
        }
    }

    /// Elements processed per wide group; 1 for the scalar loop.
    pub fn lanes(&self, element: ElementType) -> usize {
        match (self, element) {
            (Backend::Scalar, _) => 1,
            (Backend::Avx2, ElementType::F32) => AVX2_F32_LANES,
            (Backend::Avx2, ElementType::F64) => AVX2_F64_LANES,
            (Backend::Avx2, ElementType::U8) => AVX2_BYTE_LANES,
            (Backend::Neon, ElementType::F32) => NEON_F32_LANES,
            (Backend::Neon, ElementType::F64) => NEON_F64_LANES,
            (Backend::Neon, ElementType::U8) => NEON_BYTE_LANES,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Scalar => "scalar",
            Backend::Avx2 => "avx2",
            Backend::Neon => "neon",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scalar" => Ok(Backend::Scalar),
            "avx2" => Ok(Backend::Avx2),
            "neon" => Ok(Backend::Neon),
            _ => Err(format!("unknown backend '{}'", s)),
        }
    }
}

/// CPU capability flags for runtime dispatch.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuCapabilities {
    /// ARM NEON (always true on aarch64).
    pub has_neon: bool,
    /// x86 AVX2.
    pub has_avx2: bool,
    /// x86 fused multiply-add.
    pub has_fma: bool,
    /// x86 POPCNT.
    pub has_popcnt: bool,
    /// x86 AVX-512F (reported only).
    pub has_avx512f: bool,
}

impl CpuCapabilities {
    /// Detect CPU capabilities at runtime.
    #[cfg(target_arch = "aarch64")]
    pub fn detect() -> Self {
        Self {
            has_neon: std::arch::is_aarch64_feature_detected!("neon"),
            ..Self::default()
        }
    }

    /// Detect CPU capabilities at runtime.
    #[cfg(target_arch = "x86_64")]
    pub fn detect() -> Self {
        Self {
            has_neon: false,
            has_avx2: is_x86_feature_detected!("avx2"),
            has_fma: is_x86_feature_detected!("fma"),
            has_popcnt: is_x86_feature_detected!("popcnt"),
            has_avx512f: is_x86_feature_detected!("avx512f"),
        }
    }

    /// Fallback for other architectures.
    #[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
    pub fn detect() -> Self {
        Self::default()
    }

    /// Whether `backend` can run on this CPU.
    pub fn supports(&self, backend: Backend) -> bool {
        match backend {
            Backend::Scalar => true,
            Backend::Avx2 => cfg!(target_arch = "x86_64") && self.has_avx2 && self.has_fma,
            Backend::Neon => cfg!(target_arch = "aarch64") && self.has_neon,
        }
    }

    /// Widest backend this CPU supports.
    pub fn best_backend(&self) -> Backend {
        if self.supports(Backend::Avx2) {
            Backend::Avx2
        } else if self.supports(Backend::Neon) {
            Backend::Neon
        } else {
            Backend::Scalar
        }
    }

    /// Get a human-readable description of capabilities.
    pub fn description(&self) -> String {
        let mut caps = Vec::new();
        if self.has_neon {
            caps.push("NEON");
        }
        if self.has_avx512f {
            caps.push("AVX-512F");
        }
        if self.has_avx2 {
            caps.push("AVX2");
        }
        if self.has_fma {
            caps.push("FMA");
        }
        if self.has_popcnt {
            caps.push("POPCNT");
        }
        if caps.is_empty() {
            "Scalar (no SIMD)".to_string()
        } else {
            caps.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_roundtrip() {
        for metric in Metric::ALL {
            assert_eq!(metric.name().parse::<Metric>().unwrap(), metric);
            assert_eq!(Metric::from_code(metric as i32), Some(metric));
        }
        assert!("cosine".parse::<Metric>().is_err());
        assert_eq!(Metric::from_code(6), None);
    }

    #[test]
    fn test_metric_accepts() {
        assert!(Metric::Cos.accepts(ElementType::F32));
        assert!(Metric::JensenShannon.accepts(ElementType::F64));
        assert!(!Metric::SqEuclidean.accepts(ElementType::U8));
        assert!(Metric::Jaccard.accepts(ElementType::U8));
        assert!(!Metric::Hamming.accepts(ElementType::F32));
    }

    #[test]
    fn test_metric_families() {
        assert_eq!(Metric::SqEuclidean.family().name(), "spatial");
        assert_eq!(Metric::KullbackLeibler.family().to_string(), "prob");
        assert_eq!(Metric::Jaccard.family(), Family::Binary);
    }

    #[test]
    fn test_lane_widths() {
        assert_eq!(Backend::Scalar.lanes(ElementType::F64), 1);
        assert_eq!(Backend::Avx2.lanes(ElementType::F32), 8);
        assert_eq!(Backend::Neon.lanes(ElementType::F64), 2);
        assert_eq!(Backend::Avx2.lanes(ElementType::U8), 32);
    }

    #[test]
    fn test_cpu_capabilities_detect() {
        let caps = CpuCapabilities::detect();
        // Just verify it doesn't panic
        let desc = caps.description();
        assert!(!desc.is_empty());
        assert!(caps.supports(caps.best_backend()));
    }

    #[test]
    fn test_cpu_capabilities_scalar_fallback() {
        let caps = CpuCapabilities::default();
        assert_eq!(caps.description(), "Scalar (no SIMD)");
        assert_eq!(caps.best_backend(), Backend::Scalar);
        assert!(!caps.supports(Backend::Avx2));
    }

    #[test]
    fn test_avx2_requires_fma() {
        let caps = CpuCapabilities {
            has_avx2: true,
            has_fma: false,
            ..CpuCapabilities::default()
        };
        assert!(!caps.supports(Backend::Avx2));
    }
}
