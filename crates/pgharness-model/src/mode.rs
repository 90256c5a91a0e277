//! Test mode selection.

use serde::{Deserialize, Serialize};

/// Environment variable consulted when no mode is given explicitly.
pub const TEST_MODE_ENV: &str = "PGH_TEST_MODE";

/// Which extension set and which named tests a run covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    /// Only the extensions that ship enabled in the release image.
    #[default]
    Production,
    /// Every extension, including ones that are opt-in in the release image.
    Regression,
}

impl TestMode {
    /// Returns the string identifier for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            TestMode::Production => "production",
            TestMode::Regression => "regression",
        }
    }

    /// Resolves the mode from an explicit value, falling back to
    /// `PGH_TEST_MODE` and then to production.
    pub fn detect(explicit: Option<TestMode>) -> Result<TestMode, UnknownModeError> {
        if let Some(mode) = explicit {
            return Ok(mode);
        }
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.trim().is_empty() => value.parse(),
            _ => Ok(TestMode::Production),
        }
    }
}

impl std::fmt::Display for TestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a mode string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown test mode '{0}' (expected 'production' or 'regression')")]
pub struct UnknownModeError(pub String);

impl std::str::FromStr for TestMode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(TestMode::Production),
            "regression" | "full" => Ok(TestMode::Regression),
            other => Err(UnknownModeError(other.to_string())),
        }
    }
}
