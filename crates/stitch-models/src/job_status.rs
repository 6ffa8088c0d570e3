//! Job status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a clip job.
///
/// Normal flow is Queued -> Downloading -> Processing -> Uploading ->
/// Complete, with Downloading skipped when every source asset is already in
/// storage. Any state can move to Failed. Failed is terminal unless the job
/// is explicitly resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum JobStatus {
    #[default]
    Queued,
    Downloading,
    Processing,
    Uploading,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued",
            JobStatus::Downloading => "Downloading",
            JobStatus::Processing => "Processing",
            JobStatus::Uploading => "Uploading",
            JobStatus::Complete => "Complete",
            JobStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Queued" => Some(JobStatus::Queued),
            "Downloading" => Some(JobStatus::Downloading),
            "Processing" => Some(JobStatus::Processing),
            "Uploading" => Some(JobStatus::Uploading),
            "Complete" => Some(JobStatus::Complete),
            "Failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// Whether `next` is a legal successor state.
    ///
    /// Failed -> Downloading and Failed -> Queued are the resume paths.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (_, Failed) => !self.is_terminal(),
            (Queued, Downloading) | (Queued, Processing) => true,
            (Downloading, Queued) | (Downloading, Processing) => true,
            (Processing, Uploading) => true,
            (Uploading, Complete) => true,
            // Partial success skips Uploading bookkeeping entirely when the
            // upload itself already happened under Processing progress.
            (Processing, Complete) => true,
            (Failed, Queued) | (Failed, Downloading) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Downloading));
        assert!(JobStatus::Downloading.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Uploading));
        assert!(JobStatus::Uploading.can_transition_to(JobStatus::Complete));
    }

    #[test]
    fn test_skip_download_when_assets_present() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
    }

    #[test]
    fn test_failed_from_any_nonterminal() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Uploading.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Complete.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn test_resume_paths() {
        assert!(JobStatus::Failed.can_transition_to(JobStatus::Queued));
        assert!(JobStatus::Failed.can_transition_to(JobStatus::Downloading));
        assert!(!JobStatus::Complete.can_transition_to(JobStatus::Queued));
    }

    #[test]
    fn test_roundtrip_strings() {
        for status in [
            JobStatus::Queued,
            JobStatus::Downloading,
            JobStatus::Processing,
            JobStatus::Uploading,
            JobStatus::Complete,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("Bogus"), None);
    }
}
