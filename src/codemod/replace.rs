//! Binary-safe find/replace over a working copy.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::Result;

/// Path segments never edited: VCS metadata and Terraform's provider cache.
const EXCLUDED_DIRS: [&str; 2] = [".git", ".terraform"];

/// Counters from one pass over a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaceStats {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub occurrences: usize,
}

/// Replace every non-overlapping occurrence of `needle`, scanning left to right.
///
/// Returns the new content and the number of replacements. An empty needle matches nothing.
pub fn replace_bytes(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> (Vec<u8>, usize) {
    if needle.is_empty() || haystack.len() < needle.len() {
        return (haystack.to_vec(), 0);
    }

    let mut out = Vec::with_capacity(haystack.len());
    let mut count = 0;
    let mut i = 0;

    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
            count += 1;
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }

    (out, count)
}

fn exclusions() -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for dir in EXCLUDED_DIRS {
        builder.add(Glob::new(&format!("**/{dir}"))?);
        builder.add(Glob::new(&format!("**/{dir}/**"))?);
    }
    Ok(builder.build()?)
}

/// Apply [`replace_bytes`] to every regular file under `root`.
///
/// Directories named `.git` or `.terraform` are not descended into. Files are rewritten only
/// when at least one occurrence was replaced.
pub fn replace_in_tree(root: &Path, needle: &[u8], replacement: &[u8]) -> Result<ReplaceStats> {
    let excluded = exclusions()?;
    let mut stats = ReplaceStats::default();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        entry
            .path()
            .strip_prefix(root)
            .map(|rel| rel.as_os_str().is_empty() || !excluded.is_match(rel))
            .unwrap_or(false)
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        stats.files_scanned += 1;
        let content = fs::read(entry.path())?;
        let (updated, count) = replace_bytes(&content, needle, replacement);
        if count > 0 {
            fs::write(entry.path(), updated)?;
            stats.files_changed += 1;
            stats.occurrences += count;
            tracing::debug!(path = %entry.path().display(), count, "replaced occurrences");
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_bytes_counts_occurrences() {
        let (out, count) = replace_bytes(b"ref=v1.0 ref=v1.0", b"v1.0", b"v2.0");
        assert_eq!(out, b"ref=v2.0 ref=v2.0");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_replace_bytes_non_overlapping() {
        let (out, count) = replace_bytes(b"aaaa", b"aa", b"b");
        assert_eq!(out, b"bb");
        assert_eq!(count, 2);

        let (out, count) = replace_bytes(b"aaa", b"aa", b"b");
        assert_eq!(out, b"ba");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_replace_bytes_in_binary_content() {
        let haystack = [0x00, 0xff, b'o', b'l', b'd', 0x00, b'o', b'l', 0xfe];
        let (out, count) = replace_bytes(&haystack, b"old", b"new!");
        assert_eq!(count, 1);
        assert_eq!(out, [0x00, 0xff, b'n', b'e', b'w', b'!', 0x00, b'o', b'l', 0xfe]);
    }

    #[test]
    fn test_replace_bytes_no_match_or_empty_needle() {
        assert_eq!(replace_bytes(b"abc", b"x", b"y"), (b"abc".to_vec(), 0));
        assert_eq!(replace_bytes(b"abc", b"", b"y"), (b"abc".to_vec(), 0));
        assert_eq!(replace_bytes(b"ab", b"abc", b"y"), (b"ab".to_vec(), 0));
    }

    #[test]
    fn test_replace_in_tree_skips_excluded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("modules/network")).unwrap();
        fs::create_dir_all(root.join(".terraform/modules")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();

        fs::write(root.join("main.tf"), "source = \"old-module\"\n").unwrap();
        fs::write(root.join("modules/network/main.tf"), "old-module old-module").unwrap();
        fs::write(root.join("README.md"), "nothing here").unwrap();
        fs::write(root.join(".terraform/modules/cache.tf"), "old-module").unwrap();
        fs::write(root.join(".git/config"), "old-module").unwrap();

        let stats = replace_in_tree(root, b"old-module", b"new-module").unwrap();

        assert_eq!(stats.files_scanned, 3);
        assert_eq!(stats.files_changed, 2);
        assert_eq!(stats.occurrences, 3);
        assert_eq!(
            fs::read_to_string(root.join("modules/network/main.tf")).unwrap(),
            "new-module new-module"
        );
        assert_eq!(
            fs::read_to_string(root.join(".terraform/modules/cache.tf")).unwrap(),
            "old-module"
        );
        assert_eq!(fs::read_to_string(root.join(".git/config")).unwrap(), "old-module");
    }

    #[test]
    fn test_similar_names_are_not_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("docs.git-notes")).unwrap();
        fs::write(root.join("docs.git-notes/a.txt"), "old").unwrap();

        let stats = replace_in_tree(root, b"old", b"new").unwrap();
        assert_eq!(stats.files_changed, 1);
    }
}
