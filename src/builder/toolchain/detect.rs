//! Toolchain detection functions.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use which::which;

use crate::core::platform::CompilerIdentity;
use crate::core::target::Language;
use crate::util::config::ToolchainSettings;
use crate::util::process::ProcessBuilder;

use super::{GccToolchain, Toolchain, ToolchainPlatform};

/// Detect the available toolchain.
///
/// Priority:
/// 1. `[toolchain]` settings from the config files
/// 2. Environment variables (CC, CXX, AR)
/// 3. On Windows, MSVC from a Developer Command Prompt
/// 4. cc/gcc/clang plus ar from PATH
pub fn detect_toolchain(settings: &ToolchainSettings) -> Result<Box<dyn Toolchain>> {
    if settings.has_overrides() {
        if let Some(toolchain) = try_detect_from_config(settings)? {
            return Ok(toolchain);
        }
    }

    if let Some(toolchain) = try_detect_msvc()? {
        return Ok(toolchain);
    }

    if let Some(toolchain) = try_detect_gcc()? {
        return Ok(toolchain);
    }

    bail!(
        "no C compiler found\n\
         \n\
         llama-build requires a C/C++ compiler (gcc, clang, or cl).\n\
         Set the CC and CXX environment variables, add a [toolchain] table to\n\
         .llama-build/config.toml, or install a compiler."
    )
}

fn try_detect_from_config(settings: &ToolchainSettings) -> Result<Option<Box<dyn Toolchain>>> {
    let cc = match &settings.cc {
        Some(cc) if cc.exists() => cc.clone(),
        Some(cc) => {
            tracing::warn!("configured C compiler not found: {}", cc.display());
            return Ok(None);
        }
        None => return Ok(None),
    };

    let cxx = settings
        .cxx
        .clone()
        .filter(|p| p.exists())
        .or_else(|| std::env::var("CXX").ok().map(PathBuf::from))
        .unwrap_or_else(|| GccToolchain::infer_cxx(&cc));

    let ar = settings
        .ar
        .clone()
        .filter(|p| p.exists())
        .or_else(|| std::env::var("AR").ok().map(PathBuf::from))
        .or_else(|| which("ar").ok())
        .or_else(|| which("llvm-ar").ok());

    let Some(ar) = ar else {
        tracing::warn!("archiver (ar) not found");
        return Ok(None);
    };

    let family = detect_compiler_family(&cc);
    tracing::info!(
        "using toolchain from config: cc={}, cxx={}, ar={}",
        cc.display(),
        cxx.display(),
        ar.display()
    );

    Ok(Some(Box::new(GccToolchain::new(cc, cxx, ar, family))))
}

/// MSVC, when already inside a configured Developer Command Prompt.
#[cfg(target_os = "windows")]
fn try_detect_msvc() -> Result<Option<Box<dyn Toolchain>>> {
    use super::MsvcToolchain;

    let Ok(cl) = which("cl") else {
        return Ok(None);
    };
    if std::env::var("INCLUDE").is_err() || std::env::var("LIB").is_err() {
        tracing::debug!("cl.exe found but INCLUDE/LIB are not set; skipping MSVC");
        return Ok(None);
    }

    let lib = which("lib")
        .map_err(|_| anyhow::anyhow!("MSVC cl.exe found but lib.exe not in PATH"))?;
    let link = which("link")
        .map_err(|_| anyhow::anyhow!("MSVC cl.exe found but link.exe not in PATH"))?;
    Ok(Some(Box::new(MsvcToolchain::new(cl, lib, link))))
}

#[cfg(not(target_os = "windows"))]
fn try_detect_msvc() -> Result<Option<Box<dyn Toolchain>>> {
    Ok(None)
}

fn try_detect_gcc() -> Result<Option<Box<dyn Toolchain>>> {
    let cc = match std::env::var("CC") {
        Ok(cc) => PathBuf::from(cc),
        Err(_) => match which("cc").or_else(|_| which("gcc")).or_else(|_| which("clang")) {
            Ok(p) => p,
            Err(_) => return Ok(None),
        },
    };

    let cxx = match std::env::var("CXX") {
        Ok(cxx) => PathBuf::from(cxx),
        Err(_) => which("c++")
            .or_else(|_| which("g++"))
            .or_else(|_| which("clang++"))
            .unwrap_or_else(|_| GccToolchain::infer_cxx(&cc)),
    };

    let ar = match std::env::var("AR") {
        Ok(ar) => PathBuf::from(ar),
        Err(_) => match which("ar").or_else(|_| which("llvm-ar")) {
            Ok(p) => p,
            Err(_) => return Ok(None),
        },
    };

    let family = detect_compiler_family(&cc);
    Ok(Some(Box::new(GccToolchain::new(cc, cxx, ar, family))))
}

/// Detect whether the compiler is GCC, Clang, or Apple Clang.
fn detect_compiler_family(cc: &Path) -> ToolchainPlatform {
    let name = cc
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

    let banner = version_banner(cc).unwrap_or_default().to_lowercase();
    if banner.contains("apple") && banner.contains("clang") {
        ToolchainPlatform::AppleClang
    } else if name.contains("clang") || banner.contains("clang") {
        ToolchainPlatform::Clang
    } else {
        ToolchainPlatform::Gcc
    }
}

fn version_banner(compiler: &Path) -> Option<String> {
    let output = ProcessBuilder::new(compiler).arg("--version").exec().ok()?;
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Identify the compiler as `<family>-<major.minor>`.
///
/// An unreadable version is reported as `unknown` rather than failing
/// configuration.
pub fn detect_compiler_identity(toolchain: &dyn Toolchain) -> CompilerIdentity {
    let family = toolchain.platform();
    let compiler = toolchain.compiler_path(Language::C);

    let text = match family {
        // cl.exe prints its banner on stderr when run without arguments
        ToolchainPlatform::Msvc => ProcessBuilder::new(compiler)
            .exec()
            .ok()
            .map(|o| String::from_utf8_lossy(&o.stderr).into_owned()),
        _ => version_banner(compiler),
    };

    let version = text.as_deref().and_then(parse_version).unwrap_or_else(|| {
        tracing::warn!("could not read the version of {}", compiler.display());
        "unknown".to_string()
    });

    CompilerIdentity::new(family.as_str(), &version)
}

/// First `major.minor` found in a version banner.
fn parse_version(text: &str) -> Option<String> {
    text.split_whitespace().find_map(|token| {
        let token = token.trim_start_matches(['(', 'v']);
        let mut parts = token.split(|c: char| !c.is_ascii_digit());
        let major = parts.next().filter(|p| !p.is_empty())?;
        let rest = &token[major.len()..];
        let minor = rest.strip_prefix('.')?;
        let minor: String = minor.chars().take_while(|c| c.is_ascii_digit()).collect();
        if minor.is_empty() {
            return None;
        }
        Some(format!("{}.{}", major, minor))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_gcc() {
        assert_eq!(
            parse_version("gcc (Ubuntu 13.2.0-4ubuntu3) 13.2.0\nCopyright (C) 2023"),
            Some("13.2".to_string())
        );
    }

    #[test]
    fn test_parse_version_clang() {
        assert_eq!(
            parse_version("Ubuntu clang version 17.0.6 (9ubuntu1)\nTarget: x86_64-pc-linux-gnu"),
            Some("17.0".to_string())
        );
        assert_eq!(
            parse_version("Apple clang version 15.0.0 (clang-1500.3.9.4)"),
            Some("15.0".to_string())
        );
    }

    #[test]
    fn test_parse_version_msvc() {
        assert_eq!(
            parse_version("Microsoft (R) C/C++ Optimizing Compiler Version 19.38.33133 for x64"),
            Some("19.38".to_string())
        );
    }

    #[test]
    fn test_parse_version_none() {
        assert_eq!(parse_version("no digits here"), None);
        assert_eq!(parse_version("version 12"), None);
    }

    #[test]
    fn test_config_override_missing_cc() {
        let settings = ToolchainSettings {
            cc: Some(PathBuf::from("/definitely/not/a/compiler")),
            cxx: None,
            ar: None,
        };
        assert!(try_detect_from_config(&settings).unwrap().is_none());
    }

    #[test]
    fn test_identity_of_missing_compiler_is_unknown() {
        let toolchain = GccToolchain::new(
            PathBuf::from("definitely-not-a-compiler-77"),
            PathBuf::from("definitely-not-a-compiler-77++"),
            PathBuf::from("ar"),
            ToolchainPlatform::Gcc,
        );
        let identity = detect_compiler_identity(&toolchain);
        assert_eq!(identity.to_string(), "gcc-unknown");
    }
}
