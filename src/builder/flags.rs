//! Global compiler flag sequences, split by source class.

use serde::Serialize;

use crate::core::target::Language;

/// Ordered C and C++ flag sequences.
///
/// `add_both` appends to both sequences in one call, so a flag is either in
/// both or in neither.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlagSet {
    c: Vec<String>,
    cxx: Vec<String>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_c(&mut self, flag: impl Into<String>) {
        self.c.push(flag.into());
    }

    pub fn add_cxx(&mut self, flag: impl Into<String>) {
        self.cxx.push(flag.into());
    }

    pub fn add_both(&mut self, flag: impl Into<String>) {
        let flag = flag.into();
        self.c.push(flag.clone());
        self.cxx.push(flag);
    }

    /// Append `-D<name>` or `-D<name>=<value>` to both sequences.
    pub fn define(&mut self, name: &str, value: Option<&str>) {
        match value {
            Some(v) => self.add_both(format!("-D{}={}", name, v)),
            None => self.add_both(format!("-D{}", name)),
        }
    }

    pub fn c(&self) -> &[String] {
        &self.c
    }

    pub fn cxx(&self) -> &[String] {
        &self.cxx
    }

    /// The sequence that applies to a source class.
    pub fn for_language(&self, lang: Language) -> &[String] {
        match lang {
            Language::C => &self.c,
            Language::Cxx => &self.cxx,
        }
    }
}
