use std::path::Path;
use std::process::Command;

const DEFAULT_VERSION: &str = "0.0.0";
const DEFAULT_PROJECT_NAME: &str = "simkern";

/// Set a compile-time environment variable with the SIMKERN_ prefix
macro_rules! set_env {
    ($name:expr, $value:expr) => {
        println!("cargo:rustc-env=SIMKERN_{}={}", $name, $value);
    };
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Rebuild triggers
    println!("cargo:rerun-if-changed=Cargo.toml");

    let version = read_cargo_version().unwrap_or_else(|_| DEFAULT_VERSION.to_string());
    let target = std::env::var("TARGET").unwrap_or_else(|_| rustc_host().unwrap_or_default());
    let profile = std::env::var("PROFILE").unwrap_or_default();

    set_env!("PROJECT_NAME", DEFAULT_PROJECT_NAME);
    set_env!("VERSION", version);
    set_env!(
        "BUILD_TIME",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    set_env!(
        "BUILD_MODE",
        if profile == "release" {
            "release"
        } else {
            "debug"
        }
    );
    set_env!("TARGET_TRIPLE", target);
    set_env!(
        "RUSTC_VERSION",
        rustc_version().unwrap_or_else(|| "unknown".into())
    );
    set_env!("STATIC_FEATURES", static_simd_features());

    Ok(())
}

/// Package version from the manifest next to this build script.
fn read_cargo_version() -> Result<String, Box<dyn std::error::Error>> {
    let dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let manifest: toml::Value =
        toml::from_str(&std::fs::read_to_string(Path::new(&dir).join("Cargo.toml"))?)?;
    manifest
        .get("package")
        .and_then(|package| package.get("version"))
        .and_then(toml::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| "no package.version in Cargo.toml".into())
}

/// Run the compiler cargo is building with, falling back to `rustc` on PATH.
fn rustc(args: &[&str]) -> Option<String> {
    let compiler = std::env::var_os("RUSTC").unwrap_or_else(|| "rustc".into());
    let output = Command::new(compiler).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|stdout| stdout.trim().to_string())
}

fn rustc_version() -> Option<String> {
    rustc(&["--version"])
}

fn rustc_host() -> Option<String> {
    rustc(&["-vV"])?
        .lines()
        .find_map(|line| line.strip_prefix("host: "))
        .map(|host| host.trim().to_string())
}

/// SIMD features enabled at compile time (runtime dispatch may find more)
fn static_simd_features() -> String {
    const INTERESTING: &[&str] = &["sse4.2", "popcnt", "avx2", "fma", "avx512f", "neon"];
    let enabled = std::env::var("CARGO_CFG_TARGET_FEATURE").unwrap_or_default();
    let features: Vec<&str> = enabled
        .split(',')
        .filter(|f| INTERESTING.contains(f))
        .collect();
    if features.is_empty() {
        "none".to_string()
    } else {
        features.join(",")
    }
}
