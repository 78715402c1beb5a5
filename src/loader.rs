//! Filesystem document loader.
//!
//! Walks a directory and turns matching UTF-8 files into [`Document`]s whose
//! `source` is the path relative to the root (with `/` separators). The
//! relative path is the document's identity, so ingesting the same tree
//! from a different working directory yields the same chunk ids.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use ragpipe_core::models::Document;

use crate::config::IngestConfig;

pub fn load_documents(root: &Path, config: &IngestConfig) -> Result<Vec<Document>> {
    if !root.is_dir() {
        bail!("Ingest root is not a directory: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut documents = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        match std::fs::read_to_string(path) {
            Ok(text) => documents.push(Document::new(rel_str, text)),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::warn!(path = %rel_str, "skipping non-UTF-8 file");
            }
            Err(e) => return Err(e.into()),
        }
    }

    // Sort for deterministic ordering
    documents.sort_by(|a, b| a.source.cmp(&b.source));

    Ok(documents)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_loads_matching_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("b.md"), "bee").unwrap();
        fs::write(dir.path().join("sub/a.txt"), "ay").unwrap();
        fs::write(dir.path().join("skip.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join(".git/notes.md"), "internal").unwrap();

        let docs = load_documents(dir.path(), &IngestConfig::default()).unwrap();
        let sources: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, vec!["b.md", "sub/a.txt"]);
        assert_eq!(docs[0].text, "bee");
    }

    #[test]
    fn test_exclude_globs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.md"), "k").unwrap();
        fs::write(dir.path().join("draft.md"), "d").unwrap();
        let config = IngestConfig {
            exclude_globs: vec!["draft.md".to_string()],
            ..IngestConfig::default()
        };
        let docs = load_documents(dir.path(), &config).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, "keep.md");
    }

    #[test]
    fn test_skips_non_utf8() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bin.txt"), [0xff, 0xfe, 0x00]).unwrap();
        fs::write(dir.path().join("ok.txt"), "fine").unwrap();
        let docs = load_documents(dir.path(), &IngestConfig::default()).unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_documents(&dir.path().join("nope"), &IngestConfig::default()).is_err());
    }
}
