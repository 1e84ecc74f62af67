//! The generated `common/build-info.cpp` unit.

use std::path::{Path, PathBuf};

use crate::builder::errors::ConfigureError;
use crate::util::fs::write_if_changed;

/// Location of the generated unit, relative to the source root.
pub const BUILD_INFO_SOURCE: &str = "common/build-info.cpp";

/// Values embedded into the build-info unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub build_number: u32,
    pub commit: String,
    pub compiler: String,
    pub target: String,
}

impl BuildInfo {
    pub fn new(commit: &str, compiler: &str, target: &str) -> Self {
        BuildInfo {
            build_number: 0,
            commit: commit.to_string(),
            compiler: compiler.to_string(),
            target: target.to_string(),
        }
    }

    /// Source text of the unit. A pure function of the fields.
    pub fn render(&self) -> String {
        format!(
            "int LLAMA_BUILD_NUMBER = {};\n\
             char const *LLAMA_COMMIT = \"{}\";\n\
             char const *LLAMA_COMPILER = \"{}\";\n\
             char const *LLAMA_BUILD_TARGET = \"{}\";\n",
            self.build_number,
            escape(&self.commit),
            escape(&self.compiler),
            escape(&self.target),
        )
    }

    /// Write the unit under `root`, leaving an identical file untouched.
    ///
    /// Returns the path of the unit.
    pub fn write(&self, root: &Path) -> Result<PathBuf, ConfigureError> {
        let path = root.join(BUILD_INFO_SOURCE);
        let written = write_if_changed(&path, &self.render()).map_err(|source| {
            ConfigureError::WriteBuildInfo {
                path: path.clone(),
                source,
            }
        })?;

        if written {
            tracing::debug!("wrote {}", path.display());
        } else {
            tracing::debug!("{} is up to date", path.display());
        }
        Ok(path)
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
