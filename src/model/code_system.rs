use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A terminology edition rooted at one working branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSystem {
    /// Unique short name, e.g. "SNOMEDCT".
    pub short_name: String,
    pub name: Option<String>,
    /// Working branch holding the edition's unversioned content.
    pub branch_path: String,
}

impl CodeSystem {
    pub fn new(short_name: impl Into<String>, branch_path: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            name: None,
            branch_path: branch_path.into(),
        }
    }
}

/// A released version of a code system. The effective date is unique per
/// short name; the version branch lives under the working branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSystemVersion {
    pub short_name: String,
    /// Release date as an 8-digit yyyymmdd integer.
    pub effective_date: u32,
    /// Hyphenated label derived from the effective date, e.g. "2024-01-01".
    pub version: String,
    /// Branch path of the code system's working branch.
    pub parent_branch_path: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl CodeSystemVersion {
    pub fn new(
        code_system: &CodeSystem,
        effective_date: u32,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            short_name: code_system.short_name.clone(),
            effective_date,
            version: version.into(),
            parent_branch_path: code_system.branch_path.clone(),
            description: description.into(),
            created_at: Utc::now(),
        }
    }

    /// Branch holding this version's frozen content.
    pub fn branch_path(&self) -> String {
        format!("{}/{}", self.parent_branch_path, self.version)
    }
}

/// "20240101" style date to "2024-01-01" style label.
pub fn hyphenated_version_string(effective_date: u32) -> String {
    let digits = format!("{:08}", effective_date);
    format!("{}-{}-{}", &digits[0..4], &digits[4..6], &digits[6..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hyphenated_label_from_effective_date() {
        assert_eq!(hyphenated_version_string(20240101), "2024-01-01");
        assert_eq!(hyphenated_version_string(20170731), "2017-07-31");
    }

    #[test]
    fn version_branch_path_is_under_working_branch() {
        let code_system = CodeSystem::new("SNOMEDCT", "MAIN");
        let version = CodeSystemVersion::new(&code_system, 20240101, "2024-01-01", "Jan release");
        assert_eq!(version.branch_path(), "MAIN/2024-01-01");
    }
}
