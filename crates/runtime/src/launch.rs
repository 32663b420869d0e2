//! Provider locator classification.
//!
//! A locator is a path to a provider script. Its extension picks the
//! interpreter that runs it; nothing here reads the script itself.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::{Error, Result};

/// A fully resolved command for starting a provider process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Maps script extensions to the runtime command that executes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runtimes {
    by_extension: BTreeMap<String, String>,
}

impl Default for Runtimes {
    fn default() -> Self {
        Self::empty().with("py", "python").with("js", "node")
    }
}

impl Runtimes {
    /// A table with no known extensions.
    pub fn empty() -> Self {
        Self {
            by_extension: BTreeMap::new(),
        }
    }

    /// Register (or replace) the program used for an extension.
    ///
    /// A leading dot is accepted and stripped.
    pub fn with(mut self, extension: impl AsRef<str>, program: impl Into<String>) -> Self {
        let extension = extension.as_ref().trim_start_matches('.').to_string();
        self.by_extension.insert(extension, program.into());
        self
    }

    /// Known extensions, sorted.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.by_extension.keys().map(String::as_str)
    }

    /// Classify a locator into the command that launches it.
    ///
    /// Fails with [`Error::Config`] for unsupported extensions, before anything
    /// is spawned.
    pub fn resolve(&self, locator: &str) -> Result<LaunchCommand> {
        // Suffix after the last dot of the file name, so `.py` itself counts.
        let extension = Path::new(locator)
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, extension)| extension)
            .filter(|extension| !extension.is_empty())
            .ok_or_else(|| self.unsupported(locator))?;

        let program = self
            .by_extension
            .get(extension)
            .ok_or_else(|| self.unsupported(locator))?;

        Ok(LaunchCommand {
            program: program.clone(),
            args: vec![locator.to_string()],
        })
    }

    fn unsupported(&self, locator: &str) -> Error {
        let known = self
            .extensions()
            .map(|e| format!(".{e}"))
            .collect::<Vec<_>>()
            .join(", ");
        Error::Config(format!(
            "unsupported provider {locator}: expected a file ending in one of {known}"
        ))
    }
}
