//! Finding sample dump descriptors on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{ReaderError, Result};

/// Directory walker collecting files whose names match glob patterns.
///
/// Matching is case-insensitive and supports `*` and `?`.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    recursive: bool,
    patterns: Vec<String>,
    max_depth: Option<usize>,
    follow_symlinks: bool,
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl FileDiscovery {
    /// Match `*.toml` in the top directory only.
    pub fn new() -> Self {
        Self {
            recursive: false,
            patterns: vec!["*.toml".to_string()],
            max_depth: None,
            follow_symlinks: false,
        }
    }

    /// Enable recursive scanning.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Limit recursion; depth 0 is the starting directory.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Replace the patterns.
    pub fn patterns(mut self, patterns: Vec<String>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Descend into symlinked directories.
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Matching files under `dir`, sorted by path.
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(ReaderError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Not a directory: {}", dir.display()),
            )));
        }

        let mut files = Vec::new();
        let mut pending = vec![(dir.to_path_buf(), 0usize)];

        while let Some((current, depth)) = pending.pop() {
            let entries = fs::read_dir(&current).map_err(|e| {
                ReaderError::Io(io::Error::new(
                    e.kind(),
                    format!("Failed to read directory {}: {}", current.display(), e),
                ))
            })?;

            for entry in entries {
                let path = entry?.path();
                let metadata = if self.follow_symlinks {
                    fs::metadata(&path)
                } else {
                    fs::symlink_metadata(&path)
                };
                let Ok(metadata) = metadata else { continue };

                if metadata.is_dir() {
                    if self.recursive && self.max_depth.map_or(true, |max| depth < max) {
                        pending.push((path, depth + 1));
                    }
                } else if metadata.is_file() && self.matches(&path) {
                    files.push(path);
                }
            }
        }

        files.sort();
        debug!("Found {} files under {}", files.len(), dir.display());
        Ok(files)
    }

    fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        self.patterns
            .iter()
            .any(|pattern| glob_match(name.as_bytes(), pattern.to_lowercase().as_bytes()))
    }
}

/// Glob match with single-star backtracking.
fn glob_match(text: &[u8], pattern: &[u8]) -> bool {
    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                star = Some((p, t));
                p += 1;
            }
            Some(&c) if c == b'?' || c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

/// Descriptors matching `pattern` under `dir`.
pub fn discover_files(dir: &Path, pattern: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    FileDiscovery::new()
        .patterns(vec![pattern.to_string()])
        .recursive(recursive)
        .discover(dir)
}
