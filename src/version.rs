//! Build metadata baked in by `build.rs`.

use std::fmt;

pub const PROJECT_NAME: &str = env!("SIMKERN_PROJECT_NAME");
pub const VERSION: &str = env!("SIMKERN_VERSION");
pub const BUILD_TIME: &str = env!("SIMKERN_BUILD_TIME");
pub const BUILD_MODE: &str = env!("SIMKERN_BUILD_MODE");
pub const TARGET_TRIPLE: &str = env!("SIMKERN_TARGET_TRIPLE");
pub const RUSTC_VERSION: &str = env!("SIMKERN_RUSTC_VERSION");
/// SIMD features the compiler could assume statically, comma-separated.
pub const STATIC_FEATURES: &str = env!("SIMKERN_STATIC_FEATURES");

/// Nul-terminated version for the C interface.
pub(crate) const VERSION_CSTR: &str = concat!(env!("SIMKERN_VERSION"), "\0");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub project: &'static str,
    pub version: &'static str,
    pub build_time: &'static str,
    pub build_mode: &'static str,
    pub target: &'static str,
    pub rustc: &'static str,
    pub static_features: &'static str,
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        project: PROJECT_NAME,
        version: VERSION,
        build_time: BUILD_TIME,
        build_mode: BUILD_MODE,
        target: TARGET_TRIPLE,
        rustc: RUSTC_VERSION,
        static_features: STATIC_FEATURES,
    }
}

/// One-line version, e.g. `simkern 0.3.0 (release, x86_64-unknown-linux-gnu)`.
pub fn version_string() -> String {
    format!("{} {} ({}, {})", PROJECT_NAME, VERSION, BUILD_MODE, TARGET_TRIPLE)
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.project, self.version)?;
        writeln!(f, "  build mode: {}", self.build_mode)?;
        writeln!(f, "  target:     {}", self.target)?;
        writeln!(f, "  built:      {}", self.build_time)?;
        writeln!(f, "  rustc:      {}", self.rustc)?;
        write!(f, "  simd:       {}", self.static_features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_matches_package() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
        assert!(VERSION_CSTR.ends_with('\0'));
        assert_eq!(&VERSION_CSTR[..VERSION.len()], VERSION);
    }

    #[test]
    fn test_build_info() {
        let info = build_info();
        assert_eq!(info.project, "simkern");
        assert!(info.build_mode == "debug" || info.build_mode == "release");
        assert!(version_string().starts_with("simkern "));
        assert!(info.to_string().contains("target:"));
        assert!(!info.static_features.is_empty());
    }

    #[test]
    fn test_build_info_names_compiler() {
        // Queried from the same compiler cargo builds with
        assert!(RUSTC_VERSION.starts_with("rustc "), "{}", RUSTC_VERSION);
        assert!(!TARGET_TRIPLE.is_empty());
        assert!(build_info().to_string().contains(RUSTC_VERSION));
    }
}
