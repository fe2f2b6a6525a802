//! Runtime capability detection and backend selection.
//!
//! Dispatch starts `Uncalibrated`. The first kernel call detects the CPU's
//! vector extensions once, publishes the result through a `OnceLock` and moves
//! to `Calibrated`; the descriptor is never recomputed. Concurrent first calls
//! may race to detect, but only one result is published and detection is
//! deterministic.
//!
//! Selection never changes results beyond floating-point rounding: every
//! backend accumulates in f64 and handles tails with the scalar loop.

use std::sync::OnceLock;

use tracing::{debug, info, warn};

use crate::kernels::{Backend, CpuCapabilities, ElementType};

/// Setting this variable (to anything but `0` or the empty string) pins
/// automatic selection to the scalar backend for the process lifetime.
pub const FORCE_SCALAR_ENV: &str = "SIMKERN_FORCE_SCALAR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Uncalibrated,
    Calibrated,
}

/// Cached result of the one-time calibration.
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    pub capabilities: CpuCapabilities,
    /// Backend used by automatic selection.
    pub preferred: Backend,
    pub forced_scalar: bool,
}

static CALIBRATION: OnceLock<Calibration> = OnceLock::new();

fn force_scalar_requested() -> bool {
    std::env::var_os(FORCE_SCALAR_ENV).is_some_and(|v| !v.is_empty() && v != "0")
}

fn calibrate() -> Calibration {
    let capabilities = CpuCapabilities::detect();
    let forced_scalar = force_scalar_requested();
    let preferred = if forced_scalar {
        warn!("{} set, kernels pinned to the scalar backend", FORCE_SCALAR_ENV);
        Backend::Scalar
    } else {
        capabilities.best_backend()
    };

    info!(
        "Kernel dispatch calibrated: {} (preferred backend: {})",
        capabilities.description(),
        preferred
    );

    Calibration {
        capabilities,
        preferred,
        forced_scalar,
    }
}

/// The process-wide calibration, computed on first use.
pub fn calibration() -> &'static Calibration {
    CALIBRATION.get_or_init(calibrate)
}

pub fn capabilities() -> CpuCapabilities {
    calibration().capabilities
}

pub fn state() -> DispatchState {
    if CALIBRATION.get().is_some() {
        DispatchState::Calibrated
    } else {
        DispatchState::Uncalibrated
    }
}

/// Calibrate eagerly so the first kernel call pays no detection cost.
pub fn warmup() -> Backend {
    calibration().preferred
}

/// A backend that is known to run on this CPU.
///
/// Only this module constructs values, so holding one is proof that the
/// backend's instructions are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved(Backend);

impl Resolved {
    pub const SCALAR: Resolved = Resolved(Backend::Scalar);

    pub fn backend(self) -> Backend {
        self.0
    }
}

/// Resolve an explicitly requested backend.
///
/// Backends the CPU lacks resolve to scalar. The scalar pin only affects
/// automatic selection, so explicit requests still reach wide loops.
pub fn resolve(requested: Backend) -> Resolved {
    if calibration().capabilities.supports(requested) {
        Resolved(requested)
    } else {
        debug!("Backend {} unavailable, using scalar", requested);
        Resolved::SCALAR
    }
}

/// Pick the backend for one operand shape.
pub fn select(element: ElementType, len: usize) -> Resolved {
    select_with(None, element, len)
}

/// Pick the backend for one operand shape, honoring an optional request.
///
/// Operands shorter than one wide group always take the scalar loop.
pub fn select_with(requested: Option<Backend>, element: ElementType, len: usize) -> Resolved {
    let resolved = match requested {
        Some(backend) => resolve(backend),
        None => Resolved(calibration().preferred),
    };
    if len < resolved.backend().lanes(element) {
        Resolved::SCALAR
    } else {
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_is_cached() {
        let first = calibration() as *const Calibration;
        let second = calibration() as *const Calibration;
        assert_eq!(first, second);
        assert_eq!(state(), DispatchState::Calibrated);
    }

    #[test]
    fn test_concurrent_first_access() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| calibration() as *const Calibration as usize))
            .collect();
        let addrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_short_operands_use_scalar() {
        let short = select(ElementType::F64, 1);
        assert_eq!(short.backend(), Backend::Scalar);
        let forced = select_with(Some(Backend::Avx2), ElementType::F32, 7);
        assert_eq!(forced.backend(), Backend::Scalar);
    }

    #[test]
    fn test_preferred_backend_is_supported() {
        let cal = calibration();
        assert!(cal.capabilities.supports(cal.preferred));
        let long = select(ElementType::F32, 1024);
        assert!(cal.capabilities.supports(long.backend()));
    }

    #[test]
    fn test_unavailable_backend_falls_back() {
        #[cfg(target_arch = "x86_64")]
        assert_eq!(resolve(Backend::Neon), Resolved::SCALAR);
        #[cfg(target_arch = "aarch64")]
        assert_eq!(resolve(Backend::Avx2), Resolved::SCALAR);
        assert_eq!(resolve(Backend::Scalar), Resolved::SCALAR);
    }
}
