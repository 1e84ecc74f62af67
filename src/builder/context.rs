//! Configuration context - target, optimisation, global flags and policies.
//!
//! Configuration happens in two phases. A mutable [`ConfigurationBuilder`]
//! resolves everything that depends on user options, then [`freeze`] turns
//! it into an immutable [`BuildConfiguration`]. Only the frozen form can
//! declare targets, so no flag can change after the first declaration.
//!
//! [`freeze`]: ConfigurationBuilder::freeze

use std::path::{Path, PathBuf};

use crate::builder::build_info::BuildInfo;
use crate::builder::errors::ConfigureError;
use crate::builder::features::Capabilities;
use crate::builder::flags::FlagSet;
use crate::builder::revision::RevisionSource;
use crate::core::options::OptionRegistry;
use crate::core::platform::{OptimizeMode, TargetTriple};

/// Inputs that do not come from user options.
pub struct ConfigureInputs<'a> {
    /// Root of the llama.cpp checkout
    pub source_root: PathBuf,

    /// Toolchain identifier embedded into build-info, e.g. `gcc-13.2`
    pub compiler: String,

    /// Where the source revision comes from
    pub revision_source: &'a dyn RevisionSource,

    /// Skip generating files (used when only listing options)
    pub dry_run: bool,
}

/// Configuration under construction.
#[derive(Debug, Clone)]
pub struct ConfigurationBuilder {
    triple: TargetTriple,
    optimize: OptimizeMode,
    include_dirs: Vec<PathBuf>,
    flags: FlagSet,
    lto: bool,
    install_libs: bool,
    build_all: bool,
    capabilities: Capabilities,
    revision: String,
    source_root: PathBuf,
}

impl ConfigurationBuilder {
    /// Resolve the configuration from user options.
    ///
    /// A failed revision lookup stops here: nothing is generated and no
    /// flags are computed.
    pub fn resolve(
        inputs: &ConfigureInputs<'_>,
        options: &mut OptionRegistry,
    ) -> Result<Self, ConfigureError> {
        let triple = match options.string("target", "Target triple", "native")? {
            None => TargetTriple::host(),
            Some(raw) if raw == "native" => TargetTriple::host(),
            Some(raw) => {
                TargetTriple::parse(&raw).ok_or_else(|| ConfigureError::InvalidTarget(raw))?
            }
        };

        let optimize = match options.string(
            "optimize",
            "Optimization mode (debug, release-fast, release-safe, release-small)",
            "debug",
        )? {
            None => OptimizeMode::default(),
            Some(raw) => raw.parse::<OptimizeMode>()?,
        };

        tracing::info!("configuring for {} ({})", triple, optimize);

        let root = &inputs.source_root;
        let revision = inputs.revision_source.revision(root)?;

        if !inputs.dry_run {
            BuildInfo::new(&revision, &inputs.compiler, &triple.to_string()).write(root)?;
        }

        let mut builder = ConfigurationBuilder {
            flags: platform_flags(&triple),
            triple,
            optimize,
            include_dirs: Vec::new(),
            lto: false,
            install_libs: false,
            build_all: false,
            capabilities: Capabilities::default(),
            revision,
            source_root: root.clone(),
        };

        builder.add_include_dir(root.clone());
        builder.add_include_dir(root.join("common"));

        builder.lto = options
            .flag("lto", "Enable link-time optimization", "false")?
            .unwrap_or(false);
        builder.install_libs = options
            .flag("install-libs", "Install the static libraries", "false")?
            .unwrap_or(false);
        builder.build_all = options
            .flag("build-all", "Build every candidate executable", "false")?
            .unwrap_or(false);

        builder.capabilities = Capabilities::resolve(options, &builder.triple)?;
        builder.capabilities.apply_defines(&mut builder.flags);

        tracing::debug!("C flags: {}", builder.flags.c().join(" "));
        tracing::debug!("C++ flags: {}", builder.flags.cxx().join(" "));

        Ok(builder)
    }

    /// Append an include directory. Order is kept; duplicates are dropped.
    pub fn add_include_dir(&mut self, dir: PathBuf) {
        if !self.include_dirs.contains(&dir) {
            self.include_dirs.push(dir);
        }
    }

    /// Finish configuration.
    pub fn freeze(self) -> BuildConfiguration {
        BuildConfiguration {
            triple: self.triple,
            optimize: self.optimize,
            include_dirs: self.include_dirs,
            flags: self.flags,
            lto: self.lto,
            install_libs: self.install_libs,
            build_all: self.build_all,
            capabilities: self.capabilities,
            revision: self.revision,
            source_root: self.source_root,
        }
    }
}

/// Baseline language standards and platform feature-test macros.
fn platform_flags(triple: &TargetTriple) -> FlagSet {
    let mut flags = FlagSet::new();
    flags.add_c("-std=c11");
    flags.add_cxx("-std=c++11");

    flags.define("_XOPEN_SOURCE", Some("600"));
    if triple.is_gnu() {
        flags.define("_GNU_SOURCE", None);
    }
    match triple.os.as_str() {
        "macos" => flags.define("_DARWIN_C_SOURCE", None),
        "freebsd" => flags.define("__BSD_VISIBLE", None),
        "netbsd" => flags.define("_NETBSD_SOURCE", None),
        "openbsd" => flags.define("_BSD_SOURCE", None),
        _ => {}
    }
    flags
}

/// Frozen configuration shared by every declaration.
#[derive(Debug, Clone)]
pub struct BuildConfiguration {
    triple: TargetTriple,
    optimize: OptimizeMode,
    include_dirs: Vec<PathBuf>,
    flags: FlagSet,
    lto: bool,
    install_libs: bool,
    build_all: bool,
    capabilities: Capabilities,
    revision: String,
    source_root: PathBuf,
}

impl BuildConfiguration {
    pub fn triple(&self) -> &TargetTriple {
        &self.triple
    }

    pub fn optimize(&self) -> OptimizeMode {
        self.optimize
    }

    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    pub fn lto(&self) -> bool {
        self.lto
    }

    pub fn install_libs(&self) -> bool {
        self.install_libs
    }

    pub fn build_all(&self) -> bool {
        self.build_all
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }
}
