//! Language runtimes available inside the execution environment
//!
//! Maps language tags to the command line that runs a program given as a
//! single argument. Lookups are case-insensitive and accept common aliases.

use std::collections::HashMap;

/// Command line for one language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runtime {
    /// Canonical runtime name ("python", "bash", ...)
    pub name: String,
    /// Program and leading arguments; the source is appended last
    pub command: Vec<String>,
}

impl Runtime {
    pub fn new(name: impl Into<String>, command: &[&str]) -> Self {
        Self {
            name: name.into(),
            command: command.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Registry of runtimes keyed by lowercase language tag
#[derive(Debug, Clone)]
pub struct RuntimeRegistry {
    runtimes: HashMap<String, Runtime>,
}

impl RuntimeRegistry {
    /// An empty registry
    pub fn empty() -> Self {
        Self {
            runtimes: HashMap::new(),
        }
    }

    /// Default runtimes, with python programs run by `kernel` (e.g. "python3")
    pub fn with_kernel(kernel: &str) -> Self {
        let mut registry = Self::empty();

        let python = Runtime::new("python", &[kernel, "-c"]);
        registry.register(&["python", "python3", "py"], python);

        let shell = Runtime::new("bash", &["/bin/sh", "-c"]);
        registry.register(&["bash", "sh", "shell"], shell);

        let node = Runtime::new("javascript", &["node", "-e"]);
        registry.register(&["javascript", "js", "node"], node);

        let ts = Runtime::new("typescript", &["npx", "--yes", "tsx", "-e"]);
        registry.register(&["typescript", "ts"], ts);

        registry
    }

    /// Register `runtime` under every tag in `aliases`
    pub fn register(&mut self, aliases: &[&str], runtime: Runtime) {
        for alias in aliases {
            self.runtimes.insert(alias.to_lowercase(), runtime.clone());
        }
    }

    /// Keep only the runtimes whose canonical name is in `names`
    ///
    /// Used when the environment image lacks some toolchains.
    pub fn retain(&mut self, names: &[String]) {
        self.runtimes
            .retain(|_, runtime| names.iter().any(|n| n.eq_ignore_ascii_case(&runtime.name)));
    }

    /// Resolve a language tag
    pub fn resolve(&self, language: &str) -> Option<&Runtime> {
        self.runtimes.get(&language.trim().to_lowercase())
    }

    /// Whether the tag has a registered runtime
    pub fn supports(&self, language: &str) -> bool {
        self.resolve(language).is_some()
    }
}

impl Default for RuntimeRegistry {
    fn default() -> Self {
        Self::with_kernel("python3")
    }
}
