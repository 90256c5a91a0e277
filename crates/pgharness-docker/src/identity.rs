//! Run-scoped resource naming.

use chrono::Local;

/// Label key attached to every resource a run creates.
pub const RUN_LABEL: &str = "pgharness.run";

/// Prefix shared by every resource name.
pub const NAME_PREFIX: &str = "pgh";

/// Identifies one harness run.
///
/// Resource names take the form `pgh-<role>-<run id>`, where the run id is
/// `<YYYYmmddHHMMSS>-<pid>`. Two concurrent runs on one host therefore never
/// collide, and a run only ever tears down names it can prove it created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunIdentity {
    run_id: String,
}

impl RunIdentity {
    /// Creates an identity from the current local time and process id.
    pub fn new() -> Self {
        let stamp = Local::now().format("%Y%m%d%H%M%S");
        Self {
            run_id: format!("{}-{}", stamp, std::process::id()),
        }
    }

    /// Reconstructs the identity of an earlier run.
    pub fn from_run_id(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    /// The run id.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Name for a resource playing `role` in this run.
    ///
    /// # Example
    /// ```
    /// use pgharness_docker::RunIdentity;
    ///
    /// let identity = RunIdentity::from_run_id("20260301093000-4242");
    /// assert_eq!(identity.resource_name("replica"), "pgh-replica-20260301093000-4242");
    /// ```
    pub fn resource_name(&self, role: &str) -> String {
        format!("{}-{}-{}", NAME_PREFIX, role, self.run_id)
    }

    /// The `key=value` label filter matching this run's resources.
    pub fn label_filter(&self) -> String {
        format!("{}={}", RUN_LABEL, self.run_id)
    }

    /// Labels to attach to resources created by this run.
    pub fn labels(&self) -> Vec<(String, String)> {
        vec![(RUN_LABEL.to_string(), self.run_id.clone())]
    }

    /// Returns true if `name` was generated by this identity.
    pub fn owns(&self, name: &str) -> bool {
        let prefix = format!("{}-", NAME_PREFIX);
        let suffix = format!("-{}", self.run_id);
        name.len() > prefix.len() + suffix.len()
            && name.starts_with(&prefix)
            && name.ends_with(&suffix)
    }
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_shape() {
        let identity = RunIdentity::new();
        let (stamp, pid) = identity.run_id().split_once('-').unwrap();
        assert_eq!(stamp.len(), 14);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(pid, std::process::id().to_string());
    }

    #[test]
    fn test_ownership() {
        let identity = RunIdentity::from_run_id("20260101000000-7");
        assert!(identity.owns(&identity.resource_name("primary")));
        assert!(identity.owns("pgh-net-20260101000000-7"));
        assert!(!identity.owns("pgh-primary-20260101000000-8"));
        assert!(!identity.owns("postgres-20260101000000-7"));
        assert!(!identity.owns("pgh--20260101000000-7"));
    }

    #[test]
    fn test_label_filter() {
        let identity = RunIdentity::from_run_id("r-1");
        assert_eq!(identity.label_filter(), "pgharness.run=r-1");
    }
}
