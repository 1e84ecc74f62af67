//! User-facing build options.
//!
//! Every option the recipe reads must be declared through the registry,
//! whether or not the user supplied it. The declarations double as the
//! option listing, so an executable that is never built still advertises
//! its opt-in toggle.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::builder::errors::ConfigureError;

/// Value type of a declared option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Bool,
    String,
}

/// An option the recipe has declared.
#[derive(Debug, Clone, Serialize)]
pub struct DeclaredOption {
    pub name: String,
    pub kind: OptionKind,
    pub description: String,
    /// Human-readable default, for listings
    pub default: String,
}

/// Registry of declared options and user-supplied values.
#[derive(Debug, Default)]
pub struct OptionRegistry {
    declared: Vec<DeclaredOption>,
    supplied: BTreeMap<String, String>,
    consumed: BTreeSet<String>,
}

impl OptionRegistry {
    /// Create a registry with no user input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from `name[=value]` strings, as given to `-D`.
    ///
    /// A bare `name` means `name=true`. Later entries win.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for arg in args {
            let arg = arg.as_ref();
            match arg.split_once('=') {
                Some((name, value)) => registry.supply(name.trim(), value.trim()),
                None => registry.supply(arg.trim(), "true"),
            }
        }
        registry
    }

    /// Supply a value for an option, replacing any earlier value.
    pub fn supply(&mut self, name: &str, value: &str) {
        self.supplied.insert(name.to_string(), value.to_string());
    }

    /// Supply a value only if the user has not already given one.
    pub fn supply_default(&mut self, name: &str, value: &str) {
        self.supplied
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }

    /// Declare a boolean option and read its value.
    ///
    /// Returns `None` when the user did not supply it; the caller owns the
    /// default.
    pub fn flag(
        &mut self,
        name: &str,
        description: &str,
        default: &str,
    ) -> Result<Option<bool>, ConfigureError> {
        self.declare(name, OptionKind::Bool, description, default)?;
        match self.supplied.get(name) {
            None => Ok(None),
            Some(raw) => parse_bool(raw)
                .map(Some)
                .ok_or_else(|| ConfigureError::InvalidOptionValue {
                    name: name.to_string(),
                    value: raw.clone(),
                    expected: "a boolean (true/false)",
                }),
        }
    }

    /// Declare a string option and read its value.
    pub fn string(
        &mut self,
        name: &str,
        description: &str,
        default: &str,
    ) -> Result<Option<String>, ConfigureError> {
        self.declare(name, OptionKind::String, description, default)?;
        Ok(self.supplied.get(name).cloned())
    }

    fn declare(
        &mut self,
        name: &str,
        kind: OptionKind,
        description: &str,
        default: &str,
    ) -> Result<(), ConfigureError> {
        if !self.consumed.insert(name.to_string()) {
            return Err(ConfigureError::OptionRedeclared(name.to_string()));
        }
        self.declared.push(DeclaredOption {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            default: default.to_string(),
        });
        Ok(())
    }

    /// Fail if the user supplied an option nothing declared.
    pub fn finish(&self) -> Result<(), ConfigureError> {
        let unknown: Vec<&String> = self
            .supplied
            .keys()
            .filter(|name| !self.consumed.contains(*name))
            .collect();

        match unknown.first() {
            None => Ok(()),
            Some(name) => Err(ConfigureError::UnknownOption {
                name: (*name).clone(),
                known: self.declared.iter().map(|o| o.name.clone()).collect(),
            }),
        }
    }

    /// All options declared so far, in declaration order.
    pub fn declared(&self) -> &[DeclaredOption] {
        &self.declared
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_args() {
        let mut reg = OptionRegistry::from_args(["server", "vulkan=false", "optimize=release-fast"]);

        assert_eq!(reg.flag("server", "Build server", "false").unwrap(), Some(true));
        assert_eq!(reg.flag("vulkan", "Vulkan", "false").unwrap(), Some(false));
        assert_eq!(
            reg.string("optimize", "Optimize", "debug").unwrap().as_deref(),
            Some("release-fast")
        );
        assert_eq!(reg.flag("main", "Build main", "false").unwrap(), None);
        reg.finish().unwrap();
    }

    #[test]
    fn test_bool_spellings() {
        for (raw, expected) in [("on", true), ("YES", true), ("1", true), ("off", false), ("0", false)] {
            let mut reg = OptionRegistry::from_args([format!("lto={}", raw)]);
            assert_eq!(reg.flag("lto", "LTO", "false").unwrap(), Some(expected));
        }
    }

    #[test]
    fn test_invalid_bool() {
        let mut reg = OptionRegistry::from_args(["lto=maybe"]);
        let err = reg.flag("lto", "LTO", "false").unwrap_err();
        assert!(matches!(err, ConfigureError::InvalidOptionValue { .. }));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let mut reg = OptionRegistry::from_args(["servre"]);
        reg.flag("server", "Build server", "false").unwrap();

        match reg.finish().unwrap_err() {
            ConfigureError::UnknownOption { name, known } => {
                assert_eq!(name, "servre");
                assert_eq!(known, vec!["server".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_redeclaration_rejected() {
        let mut reg = OptionRegistry::new();
        reg.flag("main", "Build main", "false").unwrap();
        assert!(matches!(
            reg.flag("main", "Build main", "false"),
            Err(ConfigureError::OptionRedeclared(_))
        ));
    }

    #[test]
    fn test_supply_default_does_not_override_user() {
        let mut reg = OptionRegistry::from_args(["vulkan=false"]);
        reg.supply_default("vulkan", "true");
        reg.supply_default("lto", "true");

        assert_eq!(reg.flag("vulkan", "", "false").unwrap(), Some(false));
        assert_eq!(reg.flag("lto", "", "false").unwrap(), Some(true));
    }

    #[test]
    fn test_declared_listing_keeps_order() {
        let mut reg = OptionRegistry::new();
        reg.string("target", "Target triple", "native").unwrap();
        reg.flag("lto", "Enable LTO", "false").unwrap();

        let names: Vec<_> = reg.declared().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["target", "lto"]);
        assert_eq!(reg.declared()[1].kind, OptionKind::Bool);
    }
}
