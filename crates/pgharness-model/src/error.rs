//! Error types for manifest validation and loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error codes for manifest validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// M001: Two entries share the same name
    DuplicateName,
    /// M002: Entry name is empty
    EmptyName,
    /// M003: Disabled entry has no disabled reason
    MissingDisabledReason,
    /// M004: Dependency names an entry that does not exist
    DanglingDependency,
    /// M005: Dependency graph contains a cycle
    CircularDependency,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "M001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::DuplicateName => "M001",
            ErrorCode::EmptyName => "M002",
            ErrorCode::MissingDisabledReason => "M003",
            ErrorCode::DanglingDependency => "M004",
            ErrorCode::CircularDependency => "M005",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Warning codes for manifest validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningCode {
    /// W001: Tool entry declares sharedPreload (it is never preloaded)
    ToolDeclaresPreload,
    /// W002: preloadOnly set on an entry that is not sharedPreload
    PreloadOnlyWithoutPreload,
}

impl WarningCode {
    /// Returns the warning code string (e.g., "W001").
    pub fn code(&self) -> &'static str {
        match self {
            WarningCode::ToolDeclaresPreload => "W001",
            WarningCode::PreloadOnlyWithoutPreload => "W002",
        }
    }
}

impl std::fmt::Display for WarningCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A validation error with code, message, and the offending entry name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Name of the manifest entry the error refers to.
    pub entry: Option<String>,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            entry: None,
        }
    }

    /// Creates a new validation error attached to a manifest entry.
    pub fn for_entry(code: ErrorCode, message: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            entry: Some(entry.into()),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref entry) = self.entry {
            write!(f, "{}: {} (entry '{}')", self.code, self.message, entry)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// A validation warning with code, message, and the offending entry name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The warning code.
    pub code: WarningCode,
    /// Human-readable warning message.
    pub message: String,
    /// Name of the manifest entry the warning refers to.
    pub entry: Option<String>,
}

impl ValidationWarning {
    /// Creates a new validation warning attached to a manifest entry.
    pub fn for_entry(
        code: WarningCode,
        message: impl Into<String>,
        entry: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            entry: Some(entry.into()),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref entry) = self.entry {
            write!(f, "{}: {} (entry '{}')", self.code, self.message, entry)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

/// Result of manifest validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Whether validation passed (no errors).
    pub ok: bool,
    /// Every validation error found.
    pub errors: Vec<ValidationError>,
    /// Every validation warning found.
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Creates a successful validation result.
    pub fn success() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
        self.ok = false;
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Returns true if validation passed.
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// Returns true if any error carries the given code.
    pub fn has_error(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    /// Converts a failed result into [`ManifestError::Invalid`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ManifestError> {
        if self.ok {
            Ok(self.warnings)
        } else {
            Err(ManifestError::Invalid {
                errors: self.errors,
            })
        }
    }
}

/// Top-level error type for manifest operations.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Manifest validation failed with one or more errors.
    #[error("manifest validation failed with {} error(s): {}", .errors.len(), join_errors(.errors))]
    Invalid { errors: Vec<ValidationError> },

    /// JSON parsing error.
    #[error("manifest JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Failed to read the manifest file.
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Trait implemented by harness errors that carry a stable code.
///
/// Codes are reported in summaries and JSON output so CI tooling can match on
/// them without parsing messages.
pub trait HarnessError: std::error::Error {
    /// Returns the stable error code (e.g., "INFRA_003").
    fn code(&self) -> &'static str;

    /// Returns the error category (e.g., "infrastructure").
    fn category(&self) -> &'static str;
}

impl HarnessError for ManifestError {
    fn code(&self) -> &'static str {
        match self {
            ManifestError::Invalid { .. } => "MANIFEST_001",
            ManifestError::JsonParse(_) => "MANIFEST_002",
            ManifestError::Read { .. } => "MANIFEST_003",
        }
    }

    fn category(&self) -> &'static str {
        "validation"
    }
}
