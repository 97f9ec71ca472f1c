//! Issues a build absorbed instead of failing on.
//!
//! A data file that could not be used is read as empty and recorded as a
//! [`Origin::Source`] error against its relative path. A stage that finishes
//! with something worth reporting (a class with no rows, an empty network)
//! records a warning under its [`BuildStage`]. Fatal problems never land here;
//! they travel as [`NetworkError`](crate::NetworkError).
//!
//! ```
//! use hyrenet_core::{BuildStage, Diagnostics, Origin};
//!
//! let mut diag = Diagnostics::new();
//! diag.source_error("components/loads.csv", "file not found");
//! diag.stage_warning(BuildStage::Assembly, "loads", "No loads were added to the network");
//!
//! assert!(diag.has_errors());
//! assert_eq!(diag.issues_from(Origin::Stage(BuildStage::Assembly)).count(), 1);
//! assert_eq!(diag.summary(), "1 warning, 1 error");
//! ```

use std::fmt;

use serde::Serialize;

use crate::error::BuildStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// A file below the data root that was read as empty
    Source,
    Stage(BuildStage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub origin: Origin,
    /// Relative path for sources, list or component name for stages
    pub entity: String,
    pub message: String,
}

impl Issue {
    /// Unusable sources are errors; stage notes are warnings.
    pub fn severity(&self) -> Severity {
        match self.origin {
            Origin::Source => Severity::Error,
            Origin::Stage(_) => Severity::Warning,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            Origin::Source => write!(f, "[source] {}: {}", self.entity, self.message),
            Origin::Stage(stage) => write!(f, "[{}] {}: {}", stage, self.entity, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    issues: Vec<Issue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source_error(&mut self, path: &str, reason: &str) {
        self.issues.push(Issue {
            origin: Origin::Source,
            entity: path.to_string(),
            message: reason.to_string(),
        });
    }

    pub fn stage_warning(&mut self, stage: BuildStage, entity: &str, message: &str) {
        self.issues.push(Issue {
            origin: Origin::Stage(stage),
            entity: entity.to_string(),
            message: message.to_string(),
        });
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn issues_from(&self, origin: Origin) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |issue| issue.origin == origin)
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity() == Severity::Error)
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    /// Hand the recorded issues over, leaving this collection empty.
    pub fn take(&mut self) -> Diagnostics {
        std::mem::take(self)
    }

    pub fn clear(&mut self) {
        self.issues.clear();
    }

    pub fn summary(&self) -> String {
        let errors = self
            .issues
            .iter()
            .filter(|issue| issue.severity() == Severity::Error)
            .count();
        let warnings = self.issues.len() - errors;
        let plural = |n: usize| if n == 1 { "" } else { "s" };
        match (warnings, errors) {
            (0, 0) => "no issues".to_string(),
            (w, 0) => format!("{} warning{}", w, plural(w)),
            (0, e) => format!("{} error{}", e, plural(e)),
            (w, e) => format!("{} warning{}, {} error{}", w, plural(w), e, plural(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_decides_severity() {
        let mut diag = Diagnostics::new();
        diag.stage_warning(BuildStage::Assembly, "links", "No links were added to the network");
        assert!(!diag.has_errors());

        diag.source_error("components/buses.csv", "empty file");
        assert!(diag.has_errors());
        assert_eq!(diag.issues()[0].severity(), Severity::Warning);
        assert_eq!(diag.issues()[1].severity(), Severity::Error);
        assert_eq!(diag.issues_from(Origin::Source).count(), 1);
        assert_eq!(diag.issues_from(Origin::Stage(BuildStage::Validation)).count(), 0);
    }

    #[test]
    fn test_issue_display() {
        let mut diag = Diagnostics::new();
        diag.source_error("profiles/load_profiles/L1.csv", "file not found");
        diag.stage_warning(BuildStage::Assembly, "network", "network has no components");
        assert_eq!(
            diag.issues()[0].to_string(),
            "[source] profiles/load_profiles/L1.csv: file not found"
        );
        assert_eq!(
            diag.issues()[1].to_string(),
            "[assembly] network: network has no components"
        );
    }

    #[test]
    fn test_summary_and_take() {
        let mut diag = Diagnostics::new();
        assert_eq!(diag.summary(), "no issues");
        diag.stage_warning(BuildStage::Assembly, "links", "none");
        diag.stage_warning(BuildStage::Assembly, "loads", "none");
        diag.source_error("metadata/carriers.csv", "file not found");
        assert_eq!(diag.summary(), "2 warnings, 1 error");

        let mut merged = Diagnostics::new();
        merged.merge(diag.take());
        assert!(diag.is_empty());
        assert_eq!(merged.issues().len(), 3);
    }

    #[test]
    fn test_serialization_names_origin() {
        let mut diag = Diagnostics::new();
        diag.source_error("metadata/carriers.csv", "empty file");
        diag.stage_warning(BuildStage::TechnologyLibraries, "storage", "unused");

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"origin\":\"source\""));
        assert!(json.contains("\"stage\":\"technology_libraries\""));
        assert!(json.contains("\"entity\":\"metadata/carriers.csv\""));
    }
}
