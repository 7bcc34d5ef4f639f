//! # behappy
//!
//! An incremental media build for static photo galleries. Album folders
//! carry a small descriptor file; `behappy` turns them into a tree of
//! resized images, copied videos and a JSON description a page renderer can
//! consume.
//!
//! # Pipeline
//!
//! ```text
//! descriptors ──► gallery ──► media sets ──► items (cached) ──► resize tasks ──► target/
//!                 (index)     (globs)        (stamp, hash)      (rayon pool)
//! ```
//!
//! Each step only depends on the ones before it.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | Gallery `behappy.toml`: sources, timezone, size variants, workers |
//! | [`descriptor`] | Per-album descriptor record, scaffolding of new descriptors |
//! | [`naming`] | `YYYY-MM-DD - Title` folder-name convention |
//! | [`gallery`] | Album index: discovery, id uniqueness, tag filter, parent/child tree |
//! | [`media_set`] | Include/exclude glob resolution for one album's media |
//! | [`identity`] | Stat-only stamps and SHA-256 content hashes |
//! | [`metadata`] | Capture date, orientation and camera summary extraction |
//! | [`media`] | Image and video items, content-addressed artifact names |
//! | [`cache`] | Per-album side-car cache of extracted items |
//! | [`imaging`] | Resize geometry, the `image` crate backend, idempotent writes |
//! | [`process`] | Parallel build of every album |
//! | [`view`] | `gallery.json` for page rendering |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Content-Addressed Artifacts
//!
//! An output file's name is a hash of everything that determines its bytes:
//! the source content hash and the variant's size, crop and quality (plus the
//! rotation when there is one). If the file exists it is correct, so a
//! rebuild only has to check for existence. Nothing is ever overwritten and
//! the output tree can be synced to remote storage by listing it.
//!
//! ## Two Fingerprints
//!
//! Hashing file contents is the dominant cost for large collections. Each
//! file therefore also gets a *stamp* computed from `stat` alone. When every
//! stamp of an album's media set matches what the side-car recorded, the
//! recorded items (content hash included) are trusted and no file is read.
//!
//! ## All-or-Nothing Cache
//!
//! Any difference in an album's stamp set discards the whole cached list.
//! Adding one photo to a large album re-extracts all of them. This keeps the
//! side-car a plain list with no per-file bookkeeping.
//!
//! ## Failures Stay Local
//!
//! Configuration problems (bad quality, duplicate album ids) stop the build
//! before any work starts. An album whose media cannot be loaded (missing
//! thumbnail, extraction failure) is skipped, and a broken image only fails
//! its own tasks. Everything else completes and the exit status reports
//! the failure.

pub mod cache;
pub mod config;
pub mod descriptor;
pub mod gallery;
pub mod identity;
pub mod imaging;
pub mod media;
pub mod media_set;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod process;
pub mod view;

#[cfg(test)]
pub(crate) mod test_helpers;
