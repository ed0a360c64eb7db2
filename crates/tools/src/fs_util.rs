//! Filesystem helpers shared by the file and search tools.

use std::path::{Path, PathBuf};

/// Directories never descended into while searching.
pub const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "__pycache__",
    ".git",
    ".venv",
    "venv",
    "target",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "pdf", "zip", "gz", "tar", "tgz", "bz2",
    "xz", "7z", "rar", "exe", "dll", "so", "dylib", "a", "o", "obj", "class", "jar", "pyc",
    "wasm", "mp3", "mp4", "mov", "avi", "wav", "flac", "ttf", "otf", "woff", "woff2", "sqlite",
    "db", "bin",
];

/// Whether a file looks binary by its extension.
pub fn has_binary_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| BINARY_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Whether a byte buffer looks binary (contains NUL in its first 8 KiB).
pub fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(8192).any(|b| *b == 0)
}

/// Render `path` relative to `cwd` when it lives underneath it.
pub fn display_path(cwd: &Path, path: &Path) -> String {
    path.strip_prefix(cwd)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}

/// Options for [`walk_files`].
#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    /// Skip files and directories whose name starts with '.'
    pub skip_hidden: bool,
    /// Skip files with a binary extension
    pub skip_binary: bool,
    /// Stop after this many files
    pub max_files: Option<usize>,
}

/// Recursively list regular files under `root`, depth-first in name order.
///
/// Directories in [`SKIPPED_DIRS`] are not descended into. Unreadable
/// directories are skipped silently.
pub fn walk_files(root: &Path, options: WalkOptions) -> Vec<PathBuf> {
    let mut files = Vec::new();
    walk_into(root, options, &mut files);
    files
}

fn walk_into(dir: &Path, options: WalkOptions, out: &mut Vec<PathBuf>) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return true;
    };
    let mut entries: Vec<_> = entries.filter_map(Result::ok).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let hidden = name.starts_with('.');
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();

        if file_type.is_dir() {
            if SKIPPED_DIRS.contains(&name.as_ref()) || (options.skip_hidden && hidden) {
                continue;
            }
            if !walk_into(&path, options, out) {
                return false;
            }
        } else if file_type.is_file() {
            if options.skip_hidden && hidden {
                continue;
            }
            if options.skip_binary && has_binary_extension(&path) {
                continue;
            }
            out.push(path);
            if options.max_files.is_some_and(|max| out.len() >= max) {
                return false;
            }
        }
    }
    true
}

/// Cut `text` to at most `max_bytes`, respecting char boundaries.
pub fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
