use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level entries included in a description prompt.
pub const LISTING_LIMIT: usize = 30;

/// Failure of an optional collaborator (description generator, search index).
///
/// Never converted into [`crate::BridgeError`]: callers record it as a
/// degradation and carry on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator is not configured")]
    NotConfigured,
    #[error("collaborator timed out")]
    Timeout,
    #[error("collaborator failed: {0}")]
    Failed(String),
}

/// Prompt material handed to a [`DescriptionGenerator`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionRequest {
    pub name: String,
    /// Chosen executable for software, the directory itself for workspaces.
    pub target_path: String,
    pub listing: Vec<String>,
}

impl DescriptionRequest {
    /// Build a request, listing up to [`LISTING_LIMIT`] sorted entry names of `dir`.
    /// An unreadable directory yields an empty listing.
    pub fn new(name: impl Into<String>, target_path: impl Into<String>, dir: &Path) -> Self {
        Self {
            name: name.into(),
            target_path: target_path.into(),
            listing: top_level_listing(dir),
        }
    }
}

fn top_level_listing(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names.truncate(LISTING_LIMIT);
    names
}

/// External text-completion service producing a short description.
///
/// Implementations own their timeouts; a timeout is reported as
/// [`CollaboratorError::Timeout`].
pub trait DescriptionGenerator: Send + Sync {
    fn describe(&self, request: &DescriptionRequest) -> Result<String, CollaboratorError>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Generator used when no completion service is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledDescriber;

impl DescriptionGenerator for DisabledDescriber {
    fn describe(&self, _request: &DescriptionRequest) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::NotConfigured)
    }

    fn is_configured(&self) -> bool {
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn listing_is_sorted_and_capped() {
        let dir = tempfile::tempdir().unwrap();
        for idx in (0..40).rev() {
            fs::write(dir.path().join(format!("f{idx:02}.txt")), b"").unwrap();
        }
        let request = DescriptionRequest::new("Foo", "/x/foo.exe", dir.path());
        assert_eq!(request.listing.len(), LISTING_LIMIT);
        assert_eq!(request.listing.first().map(String::as_str), Some("f00.txt"));
    }

    #[test]
    fn missing_directory_gives_empty_listing() {
        let request = DescriptionRequest::new("Foo", "", Path::new("/definitely/not/here"));
        assert!(request.listing.is_empty());
    }
}
