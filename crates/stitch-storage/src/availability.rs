//! Asset availability index.
//!
//! Answers "which of these assets already sit in the source bucket" with a
//! single bucket listing, however many assets are asked about. Acquired
//! assets are stored under a few filename shapes that accumulated over
//! time, so each asset is matched against an ordered pattern set.

use std::collections::HashMap;

use regex::Regex;
use tracing::warn;

use crate::client::StorageClient;
use crate::error::StorageResult;

/// Availability of one asset in the source bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetAvailability {
    /// Present; `key` is the object to download.
    Available { key: String },
    /// Not present; needs acquisition.
    Missing,
    /// The check itself failed. Callers treat this as missing but the
    /// reason is kept for logging.
    CheckFailed { reason: String },
}

impl AssetAvailability {
    pub fn is_available(&self) -> bool {
        matches!(self, AssetAvailability::Available { .. })
    }
}

/// Match one asset ID against the listed object keys.
///
/// Patterns are tried in order, first hit wins:
/// 1. exact `{id}.mp4`
/// 2. `{id}_<title>.mp4`
/// 3. legacy double extension `{id}_<title>.mp4.mp4`
///
/// Only the final path component participates in the match.
pub fn match_asset_key<'a>(asset_id: &str, keys: &'a [String]) -> Option<&'a str> {
    let id = regex::escape(asset_id);

    // Unwrap is safe: the pattern is built from an escaped literal.
    let exact = format!("{}.mp4", asset_id);
    let titled = Regex::new(&format!(r"^{id}_.+\.mp4$")).ok()?;
    let legacy = Regex::new(&format!(r"^{id}_.+\.mp4\.mp4$")).ok()?;

    let basename = |key: &'a String| -> &'a str { key.rsplit('/').next().unwrap_or(key) };

    if let Some(key) = keys.iter().find(|k| basename(k) == exact) {
        return Some(key);
    }
    if let Some(key) = keys
        .iter()
        .find(|k| titled.is_match(basename(k)) && !legacy.is_match(basename(k)))
    {
        return Some(key);
    }
    keys.iter()
        .find(|k| legacy.is_match(basename(k)))
        .map(|k| k.as_str())
}

/// Availability index over the source bucket.
#[derive(Clone)]
pub struct AvailabilityIndex {
    client: StorageClient,
}

impl AvailabilityIndex {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }

    /// Check a batch of assets with one listing.
    ///
    /// A listing failure never propagates: every asset comes back as
    /// `CheckFailed` and the caller decides what that means (at submission
    /// it means re-acquire).
    pub async fn check(&self, asset_ids: &[String]) -> HashMap<String, AssetAvailability> {
        let keys = match self.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "source bucket listing failed, degrading to check-failed");
                return asset_ids
                    .iter()
                    .map(|id| {
                        (
                            id.clone(),
                            AssetAvailability::CheckFailed {
                                reason: e.to_string(),
                            },
                        )
                    })
                    .collect();
            }
        };

        asset_ids
            .iter()
            .map(|id| {
                let availability = match match_asset_key(id, &keys) {
                    Some(key) => AssetAvailability::Available {
                        key: key.to_string(),
                    },
                    None => AssetAvailability::Missing,
                };
                (id.clone(), availability)
            })
            .collect()
    }

    async fn list_keys(&self) -> StorageResult<Vec<String>> {
        Ok(self
            .client
            .list_source_objects()
            .await?
            .into_iter()
            .map(|o| o.key)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_match_means_missing() {
        let listed = keys(&["other_video.mp4", "xyz.mp4"]);
        assert_eq!(match_asset_key("abc", &listed), None);
    }

    #[test]
    fn test_exact_match() {
        let listed = keys(&["abc.mp4", "abc_Title.mp4"]);
        assert_eq!(match_asset_key("abc", &listed), Some("abc.mp4"));
    }

    #[test]
    fn test_titled_match() {
        let listed = keys(&["abc_Some Episode Title.mp4"]);
        assert_eq!(
            match_asset_key("abc", &listed),
            Some("abc_Some Episode Title.mp4")
        );
    }

    #[test]
    fn test_legacy_double_extension() {
        let listed = keys(&["abc_Some Title.mp4.mp4"]);
        assert_eq!(match_asset_key("abc", &listed), Some("abc_Some Title.mp4.mp4"));
    }

    #[test]
    fn test_pattern_priority() {
        let listed = keys(&["abc_T.mp4.mp4", "abc_T.mp4", "abc.mp4"]);
        assert_eq!(match_asset_key("abc", &listed), Some("abc.mp4"));

        let listed = keys(&["abc_T.mp4.mp4", "abc_T.mp4"]);
        assert_eq!(match_asset_key("abc", &listed), Some("abc_T.mp4"));
    }

    #[test]
    fn test_id_with_regex_metacharacters() {
        let listed = keys(&["a.c_Title.mp4", "abc_Title.mp4"]);
        // "a.c" must not match "abc" via the dot.
        assert_eq!(match_asset_key("a.c", &listed), Some("a.c_Title.mp4"));
    }

    #[test]
    fn test_prefix_ids_do_not_cross_match() {
        let listed = keys(&["abcdef_Title.mp4"]);
        assert_eq!(match_asset_key("abc", &listed), None);
    }

    #[test]
    fn test_match_uses_basename() {
        let listed = keys(&["nested/prefix/abc.mp4"]);
        assert_eq!(match_asset_key("abc", &listed), Some("nested/prefix/abc.mp4"));
    }
}
