//! Main-executable detection for an installation directory.
//!
//! [`enumerate`] walks a directory for files with an allowed executable
//! suffix, and [`pick`] ranks those candidates against the program name.
//! Ranking is a pure function of the candidate list, so it is tested apart
//! from the filesystem walk.

use crate::policy::has_executable_suffix;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Stem fragments of binaries that are never the program itself.
pub const EXCLUDED_MARKERS: &[&str] = &["uninstall", "uninst", "update", "updater", "crash", "helper"];

/// Stem fragments that suggest a launcher or primary entry point.
pub const LAUNCHER_KEYWORDS: &[&str] = &["launcher", "main", "start", "run", "app", "setup"];

/// An executable found under an installation directory. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    /// Zero when the size could not be read.
    pub size_bytes: u64,
    pub stem: String,
}

impl Candidate {
    #[must_use]
    pub fn with_size(path: PathBuf, size_bytes: u64) -> Self {
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            size_bytes,
            stem,
        }
    }
}

/// Result of walking an installation directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Enumeration {
    pub candidates: Vec<Candidate>,
    /// True when the walk stopped at the candidate limit.
    pub truncated: bool,
}

/// Recursively collect executables under `dir`, in file-name order, stopping
/// after `limit` candidates. Symlinks are not followed and unreadable
/// subtrees are skipped.
#[must_use]
pub fn enumerate(dir: &Path, limit: usize) -> Enumeration {
    let mut found = Enumeration::default();
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok);
    for entry in walker {
        if !entry.file_type().is_file() || !has_executable_suffix(entry.path()) {
            continue;
        }
        if found.candidates.len() >= limit {
            found.truncated = true;
            tracing::warn!(dir = %dir.display(), limit, "executable enumeration capped");
            break;
        }
        let size_bytes = entry.metadata().map(|meta| meta.len()).unwrap_or(0);
        found
            .candidates
            .push(Candidate::with_size(entry.into_path(), size_bytes));
    }
    found
}

/// Comparison key: lowercase with spaces, hyphens and underscores removed.
#[must_use]
pub fn normalize_key(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Ranking key of one candidate. Fields compare in declaration order:
/// name match, then launcher keyword, then file size. Larger is better.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Score {
    /// 2 for an exact normalized match, 1 when either contains the other.
    pub name: u8,
    /// 1 when the stem contains a launcher keyword.
    pub keyword: u8,
    pub size: u64,
}

#[must_use]
pub fn score(candidate: &Candidate, normalized_name: &str) -> Score {
    let stem = normalize_key(&candidate.stem);
    let name = if stem == normalized_name {
        2
    } else if !stem.is_empty()
        && !normalized_name.is_empty()
        && (stem.contains(normalized_name) || normalized_name.contains(stem.as_str()))
    {
        1
    } else {
        0
    };
    let keyword = u8::from(LAUNCHER_KEYWORDS.iter().any(|kw| stem.contains(kw)));
    Score {
        name,
        keyword,
        size: candidate.size_bytes,
    }
}

#[must_use]
pub fn is_excluded(candidate: &Candidate) -> bool {
    let stem = normalize_key(&candidate.stem);
    EXCLUDED_MARKERS.iter().any(|marker| stem.contains(marker))
}

/// A candidate with its score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ranked<'a> {
    pub candidate: &'a Candidate,
    pub score: Score,
}

/// Score every eligible candidate, best first.
///
/// Excluded candidates are dropped unless that would drop all of them, in
/// which case the full list is ranked. The sort is stable, so equal scores
/// keep input order.
#[must_use]
pub fn rank<'a>(candidates: &'a [Candidate], program_name: &str) -> Vec<Ranked<'a>> {
    let normalized = normalize_key(program_name);
    let kept: Vec<&Candidate> = candidates.iter().filter(|c| !is_excluded(c)).collect();
    let pool: Vec<&Candidate> = if kept.is_empty() {
        candidates.iter().collect()
    } else {
        kept
    };
    let mut ranked: Vec<Ranked<'a>> = pool
        .into_iter()
        .map(|candidate| Ranked {
            candidate,
            score: score(candidate, &normalized),
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    for entry in &ranked {
        tracing::debug!(
            path = %entry.candidate.path.display(),
            name_score = entry.score.name,
            keyword_score = entry.score.keyword,
            size = entry.score.size,
            "candidate scored"
        );
    }
    ranked
}

/// The most likely main executable, or `None` for an empty list.
#[must_use]
pub fn pick<'a>(candidates: &'a [Candidate], program_name: &str) -> Option<&'a Candidate> {
    rank(candidates, program_name)
        .first()
        .map(|ranked| ranked.candidate)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn cand(name: &str, size: u64) -> Candidate {
        Candidate::with_size(PathBuf::from(format!("/apps/x/{name}")), size)
    }

    #[test]
    fn normalization_strips_separators() {
        assert_eq!(normalize_key("My Cool-App_2"), "mycoolapp2");
        assert_eq!(normalize_key("ÄBC"), "äbc");
    }

    #[test]
    fn score_fields_order_lexicographically() {
        let exact_small = Score { name: 2, keyword: 0, size: 1 };
        let keyword_huge = Score { name: 1, keyword: 1, size: u64::MAX };
        assert!(exact_small > keyword_huge);
        let keyword_small = Score { name: 0, keyword: 1, size: 1 };
        let plain_huge = Score { name: 0, keyword: 0, size: u64::MAX };
        assert!(keyword_small > plain_huge);
    }

    #[test]
    fn exact_name_beats_size_and_helpers_are_excluded() {
        let candidates = vec![
            cand("uninstall.exe", 1024),
            cand("Foo.exe", 2048),
            cand("FooHelper.exe", 500),
        ];
        assert_eq!(pick(&candidates, "Foo").unwrap().stem, "Foo");
        let ranked = rank(&candidates, "Foo");
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn substring_match_scores_one() {
        let normalized = normalize_key("Foo Bar");
        assert_eq!(score(&cand("foobar64.exe", 1), &normalized).name, 1);
        assert_eq!(score(&cand("foo.exe", 1), &normalized).name, 1);
        assert_eq!(score(&cand("baz.exe", 1), &normalized).name, 0);
    }

    #[test]
    fn keyword_breaks_name_ties() {
        let candidates = vec![cand("tool.exe", 9000), cand("launcher.exe", 10)];
        assert_eq!(pick(&candidates, "Something").unwrap().stem, "launcher");
    }

    #[test]
    fn size_breaks_remaining_ties() {
        let candidates = vec![cand("a.exe", 10), cand("b.exe", 30), cand("c.exe", 20)];
        assert_eq!(pick(&candidates, "zzz").unwrap().stem, "b");
    }

    #[test]
    fn equal_scores_keep_input_order() {
        let candidates = vec![cand("one.exe", 5), cand("two.exe", 5)];
        for _ in 0..5 {
            assert_eq!(pick(&candidates, "zzz").unwrap().stem, "one");
        }
    }

    #[test]
    fn all_excluded_falls_back_to_full_list() {
        let candidates = vec![cand("uninstall.exe", 10), cand("Updater.exe", 99)];
        assert_eq!(pick(&candidates, "Foo").unwrap().stem, "Updater");
    }

    #[test]
    fn empty_list_picks_nothing() {
        assert!(pick(&[], "Foo").is_none());
    }

    #[test]
    fn enumeration_is_recursive_filtered_and_capped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("bin")).unwrap();
        std::fs::write(dir.path().join("a.exe"), b"1").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"1").unwrap();
        std::fs::write(dir.path().join("bin").join("b.BAT"), b"12").unwrap();
        std::fs::write(dir.path().join("c.cmd"), b"123").unwrap();

        let all = enumerate(dir.path(), 10);
        assert!(!all.truncated);
        let stems: Vec<&str> = all.candidates.iter().map(|c| c.stem.as_str()).collect();
        assert_eq!(stems, vec!["a", "b", "c"]);
        assert_eq!(all.candidates[1].size_bytes, 2);

        let capped = enumerate(dir.path(), 2);
        assert!(capped.truncated);
        assert_eq!(capped.candidates.len(), 2);
    }
}
