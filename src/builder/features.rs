//! Optional compute backends.
//!
//! Each enabled backend defines a macro for every compiled unit and adds
//! link requirements to the candidate executables. The macro is global on
//! purpose: ggml checks it in both C and C++ sources.

use serde::Serialize;

use crate::builder::errors::ConfigureError;
use crate::builder::flags::FlagSet;
use crate::core::options::OptionRegistry;
use crate::core::platform::TargetTriple;

/// Frameworks required by the Metal backend. All three or none.
pub const METAL_FRAMEWORKS: [&str; 3] = ["Foundation", "Metal", "MetalKit"];

/// Framework providing BLAS/LAPACK on macOS.
pub const ACCELERATE_FRAMEWORK: &str = "Accelerate";

/// Resolved backend toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub vulkan: bool,
    pub metal: bool,
    pub accelerate: bool,
}

impl Capabilities {
    /// Read the three backend options.
    ///
    /// `metal` defaults to on for macOS only. `accelerate` defaults to on
    /// for macOS and cannot be enabled anywhere else.
    pub fn resolve(
        options: &mut OptionRegistry,
        triple: &TargetTriple,
    ) -> Result<Self, ConfigureError> {
        let on_macos = triple.is_macos();
        let platform_default = if on_macos { "true on macOS" } else { "false" };

        let vulkan = options
            .flag("vulkan", "Enable the Vulkan GPU backend", "false")?
            .unwrap_or(false);

        let metal = options
            .flag("metal", "Enable the Metal backend", platform_default)?
            .unwrap_or(on_macos);

        let requested_accelerate = options.flag(
            "accelerate",
            "Link the Accelerate framework for BLAS",
            platform_default,
        )?;
        let accelerate = match requested_accelerate {
            Some(true) if !on_macos => {
                tracing::warn!("Accelerate is only available on macOS, ignoring for {}", triple);
                false
            }
            Some(value) => value,
            None => on_macos,
        };

        Ok(Capabilities {
            vulkan,
            metal,
            accelerate,
        })
    }

    /// Append the backend macros to the global flag sequences.
    pub fn apply_defines(&self, flags: &mut FlagSet) {
        if self.vulkan {
            flags.define("GGML_USE_VULKAN", None);
        }
        if self.metal {
            flags.define("GGML_USE_METAL", None);
        }
        if self.accelerate {
            flags.define("GGML_USE_ACCELERATE", None);
            flags.define("ACCELERATE_NEW_LAPACK", None);
            flags.define("ACCELERATE_LAPACK_ILP64", None);
        }
    }

    /// Platform library providing the Vulkan loader.
    pub fn gpu_driver_library(triple: &TargetTriple) -> &'static str {
        if triple.is_windows() {
            "vulkan-1"
        } else {
            "vulkan"
        }
    }
}
