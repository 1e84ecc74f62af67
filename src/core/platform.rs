//! Target platform and optimization mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target triple components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetTriple {
    /// CPU architecture (x86_64, aarch64, etc.)
    pub arch: String,
    /// Vendor (unknown, apple, pc, etc.)
    pub vendor: String,
    /// Operating system (linux, macos, windows, etc.)
    pub os: String,
    /// Environment/ABI (gnu, musl, msvc, etc.)
    pub env: Option<String>,
}

impl TargetTriple {
    pub fn new(arch: &str, vendor: &str, os: &str, env: Option<&str>) -> Self {
        TargetTriple {
            arch: arch.to_string(),
            vendor: vendor.to_string(),
            os: normalize_os(os).to_string(),
            env: env.map(|s| s.to_string()),
        }
    }

    /// The triple of the machine running the build.
    pub fn host() -> Self {
        let arch = std::env::consts::ARCH;
        let os = std::env::consts::OS;

        let (vendor, env) = match os {
            "linux" => ("unknown", Some("gnu")),
            "macos" => ("apple", None),
            "windows" => {
                if cfg!(target_env = "gnu") {
                    ("pc", Some("gnu"))
                } else {
                    ("pc", Some("msvc"))
                }
            }
            _ => ("unknown", None),
        };

        TargetTriple::new(arch, vendor, os, env)
    }

    /// Parse a triple.
    ///
    /// Accepts the four-part form (`x86_64-unknown-linux-gnu`), the three-part
    /// form (`aarch64-apple-darwin`), and the vendor-less Zig form
    /// (`x86_64-linux-gnu`, `x86_64-windows-msvc`).
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return None;
        }

        match parts.as_slice() {
            [arch, second, third] if is_known_os(second) => {
                Some(TargetTriple::new(arch, "unknown", second, Some(third)))
            }
            [arch, vendor, os] => Some(TargetTriple::new(arch, vendor, os, None)),
            [arch, os] if is_known_os(os) => Some(TargetTriple::new(arch, "unknown", os, None)),
            [arch, vendor, os, env] => Some(TargetTriple::new(arch, vendor, os, Some(env))),
            _ => None,
        }
    }

    pub fn is_macos(&self) -> bool {
        self.os == "macos"
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    pub fn is_linux(&self) -> bool {
        self.os == "linux"
    }

    /// MSVC-like ABI.
    pub fn is_msvc(&self) -> bool {
        self.env.as_deref() == Some("msvc")
    }

    /// GNU ABI (`gnu`, `gnueabihf`, `gnux32`, ...), or Linux with no explicit ABI.
    pub fn is_gnu(&self) -> bool {
        match self.env.as_deref() {
            Some(env) => env.starts_with("gnu"),
            None => self.is_linux(),
        }
    }
}

impl fmt::Display for TargetTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.env {
            Some(env) => write!(f, "{}-{}-{}-{}", self.arch, self.vendor, self.os, env),
            None => write!(f, "{}-{}-{}", self.arch, self.vendor, self.os),
        }
    }
}

fn normalize_os(os: &str) -> &str {
    match os {
        "darwin" | "macosx" => "macos",
        other => other,
    }
}

fn is_known_os(s: &str) -> bool {
    matches!(
        normalize_os(s),
        "linux" | "macos" | "windows" | "freebsd" | "netbsd" | "openbsd" | "ios" | "android"
    )
}

/// Optimization mode for every compiled unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizeMode {
    #[default]
    Debug,
    ReleaseFast,
    ReleaseSafe,
    ReleaseSmall,
}

impl OptimizeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizeMode::Debug => "debug",
            OptimizeMode::ReleaseFast => "release-fast",
            OptimizeMode::ReleaseSafe => "release-safe",
            OptimizeMode::ReleaseSmall => "release-small",
        }
    }

    /// Whether assertions are compiled out (`NDEBUG`).
    pub fn strips_asserts(&self) -> bool {
        matches!(self, OptimizeMode::ReleaseFast | OptimizeMode::ReleaseSmall)
    }
}

impl FromStr for OptimizeMode {
    type Err = OptimizeModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" | "Debug" => Ok(OptimizeMode::Debug),
            "release-fast" | "ReleaseFast" => Ok(OptimizeMode::ReleaseFast),
            "release-safe" | "ReleaseSafe" => Ok(OptimizeMode::ReleaseSafe),
            "release-small" | "ReleaseSmall" => Ok(OptimizeMode::ReleaseSmall),
            _ => Err(OptimizeModeParseError(s.to_string())),
        }
    }
}

impl fmt::Display for OptimizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown optimization mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizeModeParseError(pub String);

impl fmt::Display for OptimizeModeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid optimize mode '{}', valid values: debug, release-fast, release-safe, release-small",
            self.0
        )
    }
}

impl std::error::Error for OptimizeModeParseError {}

/// Compiler identity, e.g. `gcc-13.2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerIdentity {
    pub family: String,
    pub version: String,
}

impl CompilerIdentity {
    pub fn new(family: &str, version: &str) -> Self {
        CompilerIdentity {
            family: family.to_string(),
            version: version.to_string(),
        }
    }
}

impl fmt::Display for CompilerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.family, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_triple() {
        let triple = TargetTriple::host();
        assert!(!triple.arch.is_empty());
        assert!(!triple.os.is_empty());
    }

    #[test]
    fn test_parse_four_part() {
        let triple = TargetTriple::parse("x86_64-unknown-linux-gnu").unwrap();
        assert_eq!(triple.arch, "x86_64");
        assert_eq!(triple.vendor, "unknown");
        assert_eq!(triple.os, "linux");
        assert_eq!(triple.env.as_deref(), Some("gnu"));
        assert!(triple.is_gnu());
        assert!(!triple.is_msvc());
    }

    #[test]
    fn test_parse_vendorless_forms() {
        let triple = TargetTriple::parse("x86_64-windows-msvc").unwrap();
        assert!(triple.is_windows());
        assert!(triple.is_msvc());
        assert_eq!(triple.to_string(), "x86_64-unknown-windows-msvc");

        let triple = TargetTriple::parse("aarch64-macos").unwrap();
        assert!(triple.is_macos());
        assert_eq!(triple.env, None);
    }

    #[test]
    fn test_parse_darwin_is_macos() {
        let triple = TargetTriple::parse("aarch64-apple-darwin").unwrap();
        assert!(triple.is_macos());
        assert_eq!(triple.vendor, "apple");
        assert!(!triple.is_gnu());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(TargetTriple::parse("x86_64").is_none());
        assert!(TargetTriple::parse("x86_64--linux").is_none());
        assert!(TargetTriple::parse("a-b-c-d-e").is_none());
    }

    #[test]
    fn test_optimize_mode_parse() {
        assert_eq!("debug".parse::<OptimizeMode>(), Ok(OptimizeMode::Debug));
        assert_eq!(
            "ReleaseFast".parse::<OptimizeMode>(),
            Ok(OptimizeMode::ReleaseFast)
        );
        assert_eq!(
            "release-small".parse::<OptimizeMode>(),
            Ok(OptimizeMode::ReleaseSmall)
        );
        let err = "fast".parse::<OptimizeMode>().unwrap_err();
        assert!(err.to_string().contains("release-safe"));
    }

    #[test]
    fn test_optimize_mode_asserts() {
        assert!(!OptimizeMode::Debug.strips_asserts());
        assert!(!OptimizeMode::ReleaseSafe.strips_asserts());
        assert!(OptimizeMode::ReleaseFast.strips_asserts());
    }
}
