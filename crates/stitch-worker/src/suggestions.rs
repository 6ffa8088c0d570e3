//! Classify processing error text into remediation hints.
//!
//! The raw error still goes into the job record; the suggestions give the
//! user something actionable next to it.

/// Suggestions for a processing-stage failure.
pub fn processing_suggestions(error_text: &str) -> Vec<String> {
    let msg = error_text.to_lowercase();

    if msg.contains("ffmpeg") || msg.contains("encod") {
        vec![
            "Video encoding failed".to_string(),
            "Try selecting shorter segments or check video format compatibility".to_string(),
        ]
    } else if msg.contains("timed out") || msg.contains("timeout") {
        vec![
            "Processing took too long for one of the videos".to_string(),
            "Try fewer or shorter segments".to_string(),
        ]
    } else if msg.contains("invalid") || msg.contains("timestamp") {
        vec!["Invalid segment timestamps detected".to_string()]
    } else if msg.contains("duration") {
        vec!["Segment times exceed video duration - check timestamps".to_string()]
    } else if msg.contains("not found") || msg.contains("download") {
        vec![
            "A source video could not be retrieved from storage".to_string(),
            "Resume the job to re-acquire missing videos".to_string(),
        ]
    } else if msg.contains("memory") || msg.contains("no space") || msg.contains("disk") {
        vec!["Resource limit hit - try processing fewer or shorter segments".to_string()]
    } else {
        vec!["Video processing encountered an unexpected error".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_errors() {
        let s = processing_suggestions("ffmpeg exited with status 1");
        assert!(s[0].contains("encoding failed"));
    }

    #[test]
    fn test_timeout_errors() {
        let s = processing_suggestions("asset abc timed out after 60 minutes");
        assert!(s.iter().any(|x| x.contains("too long")));
    }

    #[test]
    fn test_storage_errors() {
        let s = processing_suggestions("source object not found in bucket");
        assert!(s.iter().any(|x| x.contains("Resume the job")));
    }

    #[test]
    fn test_unknown_errors_get_generic_hint() {
        let s = processing_suggestions("something exotic");
        assert_eq!(s.len(), 1);
        assert!(s[0].contains("unexpected"));
    }
}
