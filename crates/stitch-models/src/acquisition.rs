//! Classification of acquisition provider failures.
//!
//! Provider error text is noisy and occasionally includes internals that
//! must not reach end users. Every failure is bucketed into one of a few
//! categories, each with a stable user-facing message and remediation
//! hints. The raw provider text only goes to the logs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionFailureKind {
    /// The source platform blocked the download (bot detection, captcha,
    /// rate limiting).
    BotDetection,
    /// The asset is private, deleted, or region locked.
    PrivateOrUnavailable,
    /// The asset requires age verification.
    AgeRestricted,
    /// Anything we cannot attribute.
    Unknown,
}

impl AcquisitionFailureKind {
    /// Classify raw provider error text.
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_lowercase();

        // Age phrasing overlaps the bot-detection phrasing ("sign in to
        // confirm your age"), so it is checked first.
        if lower.contains("age") && (lower.contains("restrict") || lower.contains("verif")) {
            return AcquisitionFailureKind::AgeRestricted;
        }

        if lower.contains("sign in to confirm")
            || lower.contains("bot")
            || lower.contains("captcha")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("rate limit")
        {
            AcquisitionFailureKind::BotDetection
        } else if lower.contains("private")
            || lower.contains("unavailable")
            || lower.contains("removed")
            || lower.contains("not available")
            || lower.contains("404")
        {
            AcquisitionFailureKind::PrivateOrUnavailable
        } else {
            AcquisitionFailureKind::Unknown
        }
    }

    /// Stable user-facing error message for this category.
    pub fn user_message(&self) -> &'static str {
        match self {
            AcquisitionFailureKind::BotDetection => {
                "The video platform temporarily blocked the download"
            }
            AcquisitionFailureKind::PrivateOrUnavailable => {
                "One or more source videos are private or no longer available"
            }
            AcquisitionFailureKind::AgeRestricted => {
                "One or more source videos are age-restricted and cannot be downloaded"
            }
            AcquisitionFailureKind::Unknown => {
                "Downloading the source videos failed due to a technical error"
            }
        }
    }

    /// Remediation hints to surface alongside the error.
    pub fn suggestions(&self) -> Vec<String> {
        let hints: &[&str] = match self {
            AcquisitionFailureKind::BotDetection => &[
                "Wait a few minutes and retry the job",
                "Avoid submitting many jobs for the same video in a short window",
            ],
            AcquisitionFailureKind::PrivateOrUnavailable => &[
                "Check that the video is public and still online",
                "Remove the unavailable video from the request and resubmit",
            ],
            AcquisitionFailureKind::AgeRestricted => &[
                "Age-restricted videos cannot be processed",
                "Remove the restricted video from the request and resubmit",
            ],
            AcquisitionFailureKind::Unknown => &[
                "Retry the job; transient download errors usually clear quickly",
                "If the problem persists, contact support with the job ID",
            ],
        };
        hints.iter().map(|s| s.to_string()).collect()
    }

    /// Whether retrying the same request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AcquisitionFailureKind::BotDetection | AcquisitionFailureKind::Unknown
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_detection_phrases() {
        for raw in [
            "ERROR: Sign in to confirm you're not a bot",
            "HTTP Error 429: Too Many Requests",
            "captcha required",
        ] {
            assert_eq!(
                AcquisitionFailureKind::classify(raw),
                AcquisitionFailureKind::BotDetection
            );
        }
    }

    #[test]
    fn test_private_or_unavailable() {
        for raw in ["Video unavailable", "This video is private", "removed by uploader"] {
            assert_eq!(
                AcquisitionFailureKind::classify(raw),
                AcquisitionFailureKind::PrivateOrUnavailable
            );
        }
    }

    #[test]
    fn test_age_restricted() {
        assert_eq!(
            AcquisitionFailureKind::classify("Sign in to confirm your age: video is age-restricted"),
            AcquisitionFailureKind::AgeRestricted
        );
    }

    #[test]
    fn test_age_phrase_without_restriction_is_not_age_bucket() {
        // "age" alone (e.g. "page not found") must not trigger the bucket
        assert_eq!(
            AcquisitionFailureKind::classify("page load failed"),
            AcquisitionFailureKind::Unknown
        );
    }

    #[test]
    fn test_unknown_fallback() {
        assert_eq!(
            AcquisitionFailureKind::classify("ffmpeg exited with code 1"),
            AcquisitionFailureKind::Unknown
        );
    }

    #[test]
    fn test_every_kind_has_suggestions() {
        for kind in [
            AcquisitionFailureKind::BotDetection,
            AcquisitionFailureKind::PrivateOrUnavailable,
            AcquisitionFailureKind::AgeRestricted,
            AcquisitionFailureKind::Unknown,
        ] {
            assert!(!kind.suggestions().is_empty());
            assert!(!kind.user_message().is_empty());
        }
    }
}
