//! Media set resolution: include/exclude patterns → concrete files.
//!
//! A media set is the list of files one album shows for one kind of media.
//! It is declared in the album descriptor as glob patterns relative to the
//! descriptor's folder:
//!
//! ```toml
//! [images]
//! include = ["*.jpg", "picked/**/*.jpg"]
//! exclude = ["IMG_0002.jpg"]
//! ```
//!
//! ## Semantics
//!
//! - The result is a set: a file matched by several include patterns appears once.
//! - Exclude patterns only subtract; excluding a file that was never included is fine.
//! - Files whose name starts with `.` are never part of a set, whatever the patterns say.
//! - `*` stays within one directory level, `**` crosses levels.
//! - `.` segments are dropped, so `./*.jpg` is the same as `*.jpg`.
//! - Only files are returned. Symlinks are followed.
//!
//! The optional thumbnail is resolved separately by [`MediaSet::thumbnail`]
//! and is only added by [`MediaSet::resolve_with_thumbnail`], which the build
//! uses so the cover image gets rendered even when no pattern lists it. A
//! declared thumbnail that does not exist is an error.

use crate::descriptor::MediaSpec;
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum MediaSetError {
    #[error("invalid pattern {pattern:?} for {}: {source}", .root.display())]
    Pattern {
        root: PathBuf,
        pattern: String,
        source: globset::Error,
    },
    #[error("cannot list {}: {source}", .root.display())]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("thumbnail {} is declared but does not exist", .0.display())]
    MissingThumbnail(PathBuf),
}

/// Compiled patterns for one media set.
#[derive(Debug, Clone)]
pub struct MediaSet {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    max_depth: usize,
    thumbnail: Option<String>,
}

fn compile(root: &Path, patterns: &[String]) -> Result<(GlobSet, usize), MediaSetError> {
    let pattern_err = |pattern: &str, source| MediaSetError::Pattern {
        root: root.to_path_buf(),
        pattern: pattern.to_string(),
        source,
    };
    let mut builder = GlobSetBuilder::new();
    let mut depth = 0;
    for pattern in patterns {
        let normalized = normalize(pattern);
        let glob: Glob = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .build()
            .map_err(|e| pattern_err(pattern, e))?;
        builder.add(glob);
        depth = depth.max(pattern_depth(&normalized));
    }
    let set = builder
        .build()
        .map_err(|e| pattern_err(&patterns.join(", "), e))?;
    Ok((set, depth))
}

/// Drop `.` segments: matching runs against root-relative paths, which
/// never contain them.
fn normalize(pattern: &str) -> String {
    pattern
        .split('/')
        .filter(|segment| *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// How many directory levels a pattern can reach; `usize::MAX` for `**`.
fn pattern_depth(pattern: &str) -> usize {
    if pattern.contains("**") {
        usize::MAX
    } else {
        pattern.split('/').filter(|s| !s.is_empty()).count()
    }
}

impl MediaSet {
    /// Compile the patterns of `spec`, anchored at `root`.
    pub fn new(root: &Path, spec: &MediaSpec) -> Result<Self, MediaSetError> {
        let root = std::path::absolute(root)?;
        let (include, include_depth) = compile(&root, &spec.include)?;
        let (exclude, _) = compile(&root, &spec.exclude)?;
        Ok(Self {
            root,
            include,
            exclude,
            max_depth: include_depth,
            thumbnail: spec.thumbnail.clone(),
        })
    }

    /// Absolute folder the patterns are relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files matched by the include patterns, minus excludes and hidden files.
    pub fn resolve(&self) -> Result<BTreeSet<PathBuf>, MediaSetError> {
        let mut found = BTreeSet::new();
        if self.include.is_empty() {
            return Ok(found);
        }
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(self.max_depth)
            .follow_links(true);
        for entry in walker {
            let entry = entry.map_err(|source| MediaSetError::Walk {
                root: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() || is_hidden(entry.path()) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            if self.include.is_match(relative) && !self.exclude.is_match(relative) {
                found.insert(entry.path().to_path_buf());
            }
        }
        Ok(found)
    }

    /// The declared thumbnail as an absolute path, checked for existence.
    pub fn thumbnail(&self) -> Result<Option<PathBuf>, MediaSetError> {
        let Some(name) = &self.thumbnail else {
            return Ok(None);
        };
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(MediaSetError::MissingThumbnail(path));
        }
        Ok(Some(path))
    }

    /// [`resolve`](Self::resolve) plus the thumbnail, if one is declared.
    pub fn resolve_with_thumbnail(&self) -> Result<BTreeSet<PathBuf>, MediaSetError> {
        let mut found = self.resolve()?;
        if let Some(thumbnail) = self.thumbnail()? {
            found.insert(thumbnail);
        }
        Ok(found)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with('.'))
}

/// Resolve `include` minus `exclude` under `root` in one call.
pub fn resolve(
    root: &Path,
    include: &[String],
    exclude: &[String],
) -> Result<BTreeSet<PathBuf>, MediaSetError> {
    let spec = MediaSpec {
        include: include.to_vec(),
        exclude: exclude.to_vec(),
        ..MediaSpec::default()
    };
    MediaSet::new(root, &spec)?.resolve()
}
