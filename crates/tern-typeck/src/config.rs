use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::DiagnosticKind;

/// Limits and switches for one inference run, read from the `[inference]`
/// table of a TOML file. Every field has a default.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferConfig {
    /// Candidate attempts (across all nesting levels) one outermost call
    /// may spend before it is reported `TOO_COMPLEX`.
    pub max_candidate_attempts: usize,
    /// Nested calls/literals deeper than this are reported `TOO_COMPLEX`.
    pub max_nesting_depth: usize,
    /// Worklist steps one constraint system may take while resolving.
    pub max_propagation_steps: usize,
    /// Diagnostic kinds dropped from the final sequence, by name
    /// (`"UNUSED_PARAMETER"`).
    pub suppressed: Vec<String>,
}

impl Default for InferConfig {
    fn default() -> Self {
        InferConfig {
            max_candidate_attempts: 10_000,
            max_nesting_depth: 64,
            max_propagation_steps: 100_000,
            suppressed: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    inference: InferConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: String, message: String },
    Parse(String),
    UnknownDiagnostic(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => write!(f, "failed to read {}: {}", path, message),
            ConfigError::Parse(msg) => write!(f, "failed to parse inference config: {}", msg),
            ConfigError::UnknownDiagnostic(name) => {
                write!(f, "unknown diagnostic kind in `suppressed`: {}", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl InferConfig {
    pub fn from_file(path: &Path) -> Result<InferConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<InferConfig, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let config = file.inference;
        config.suppressed_kinds()?;
        Ok(config)
    }

    /// Suppress one more kind.
    pub fn suppress(mut self, kind: DiagnosticKind) -> Self {
        self.suppressed.push(kind.as_str().to_string());
        self
    }

    pub fn suppressed_kinds(&self) -> Result<Vec<DiagnosticKind>, ConfigError> {
        self.suppressed
            .iter()
            .map(|name| {
                DiagnosticKind::from_name(name)
                    .ok_or_else(|| ConfigError::UnknownDiagnostic(name.clone()))
            })
            .collect()
    }

    pub fn is_suppressed(&self, kind: DiagnosticKind) -> bool {
        self.suppressed.iter().any(|name| name == kind.as_str())
    }
}
